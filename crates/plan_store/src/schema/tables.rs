//! Current shape of every Plan table, listed in foreign-key dependency order.

use plan_core::{ColumnDescriptor, TableDescriptor};

pub const SERVERS: &str = "plan_servers";
pub const USERS: &str = "plan_users";
pub const USER_INFO: &str = "plan_user_info";
pub const NICKNAMES: &str = "plan_nicknames";
pub const GEOLOCATIONS: &str = "plan_geolocations";
pub const WORLDS: &str = "plan_worlds";
pub const SESSIONS: &str = "plan_sessions";
pub const WORLD_TIMES: &str = "plan_world_times";
pub const KILLS: &str = "plan_kills";
pub const PING: &str = "plan_ping";
pub const TPS: &str = "plan_tps";
pub const SECURITY: &str = "plan_security";
pub const SETTINGS: &str = "plan_settings";

const UUID_LEN: u32 = 36;
const NAME_LEN: u32 = 100;

fn id() -> ColumnDescriptor {
    ColumnDescriptor::int("id").primary_key().auto_increment()
}

fn reference(name: &str) -> ColumnDescriptor {
    ColumnDescriptor::int(name).not_null()
}

pub fn servers() -> TableDescriptor {
    TableDescriptor::new(SERVERS)
        .column(id())
        .column(ColumnDescriptor::varchar("uuid", UUID_LEN).not_null().unique())
        .column(ColumnDescriptor::varchar("name", NAME_LEN))
        .column(ColumnDescriptor::varchar("web_address", 100))
        .column(
            ColumnDescriptor::boolean("is_installed")
                .not_null()
                .default_value(true),
        )
        .column(
            ColumnDescriptor::boolean("is_proxy")
                .not_null()
                .default_value(false),
        )
        .column(ColumnDescriptor::int("max_players").not_null().default_value(-1))
}

pub fn users() -> TableDescriptor {
    TableDescriptor::new(USERS)
        .column(id())
        .column(ColumnDescriptor::varchar("uuid", UUID_LEN).not_null().unique())
        .column(ColumnDescriptor::long("registered").not_null())
        .column(ColumnDescriptor::varchar("name", 16).not_null())
        .column(
            ColumnDescriptor::int("times_kicked")
                .not_null()
                .default_value(0),
        )
}

pub fn user_info() -> TableDescriptor {
    TableDescriptor::new(USER_INFO)
        .column(id())
        .column(reference("user_id"))
        .column(reference("server_id"))
        .column(ColumnDescriptor::long("registered").not_null())
        .column(ColumnDescriptor::boolean("opped").not_null().default_value(false))
        .column(ColumnDescriptor::boolean("banned").not_null().default_value(false))
        .column(ColumnDescriptor::varchar("hostname", 255))
        .foreign_key("user_id", USERS, "id")
        .foreign_key("server_id", SERVERS, "id")
}

pub fn nicknames() -> TableDescriptor {
    TableDescriptor::new(NICKNAMES)
        .column(id())
        .column(reference("user_id"))
        .column(ColumnDescriptor::varchar("nickname", 75).not_null())
        .column(reference("server_id"))
        .column(ColumnDescriptor::long("last_used").not_null().default_value(0i64))
        .foreign_key("user_id", USERS, "id")
        .foreign_key("server_id", SERVERS, "id")
}

pub fn geolocations() -> TableDescriptor {
    TableDescriptor::new(GEOLOCATIONS)
        .column(id())
        .column(reference("user_id"))
        .column(ColumnDescriptor::varchar("geolocation", 50).not_null())
        .column(ColumnDescriptor::long("last_used").not_null().default_value(0i64))
        .foreign_key("user_id", USERS, "id")
}

pub fn worlds() -> TableDescriptor {
    TableDescriptor::new(WORLDS)
        .column(id())
        .column(ColumnDescriptor::varchar("world_name", NAME_LEN).not_null())
        .column(reference("server_id"))
        .foreign_key("server_id", SERVERS, "id")
}

pub fn sessions() -> TableDescriptor {
    TableDescriptor::new(SESSIONS)
        .column(id())
        .column(reference("user_id"))
        .column(reference("server_id"))
        .column(ColumnDescriptor::long("session_start").not_null())
        .column(ColumnDescriptor::long("session_end").not_null())
        .column(ColumnDescriptor::int("mob_kills").not_null().default_value(0))
        .column(ColumnDescriptor::int("deaths").not_null().default_value(0))
        .column(ColumnDescriptor::long("afk_time").not_null().default_value(0i64))
        .foreign_key("user_id", USERS, "id")
        .foreign_key("server_id", SERVERS, "id")
}

pub fn world_times() -> TableDescriptor {
    TableDescriptor::new(WORLD_TIMES)
        .column(id())
        .column(reference("user_id"))
        .column(reference("world_id"))
        .column(reference("server_id"))
        .column(reference("session_id"))
        .column(ColumnDescriptor::long("survival_time").not_null().default_value(0i64))
        .column(ColumnDescriptor::long("creative_time").not_null().default_value(0i64))
        .column(ColumnDescriptor::long("adventure_time").not_null().default_value(0i64))
        .column(ColumnDescriptor::long("spectator_time").not_null().default_value(0i64))
        .foreign_key("user_id", USERS, "id")
        .foreign_key("world_id", WORLDS, "id")
        .foreign_key("server_id", SERVERS, "id")
        .foreign_key("session_id", SESSIONS, "id")
}

pub fn kills() -> TableDescriptor {
    TableDescriptor::new(KILLS)
        .column(id())
        .column(reference("killer_id"))
        .column(reference("victim_id"))
        .column(reference("server_id"))
        .column(reference("session_id"))
        .column(ColumnDescriptor::varchar("weapon", 30).not_null())
        .column(ColumnDescriptor::long("date").not_null())
        .foreign_key("killer_id", USERS, "id")
        .foreign_key("victim_id", USERS, "id")
        .foreign_key("server_id", SERVERS, "id")
        .foreign_key("session_id", SESSIONS, "id")
}

pub fn ping() -> TableDescriptor {
    TableDescriptor::new(PING)
        .column(id())
        .column(reference("user_id"))
        .column(reference("server_id"))
        .column(ColumnDescriptor::long("date").not_null())
        .column(ColumnDescriptor::int("max_ping").not_null())
        .column(ColumnDescriptor::int("min_ping").not_null())
        .column(ColumnDescriptor::double("avg_ping").not_null())
        .foreign_key("user_id", USERS, "id")
        .foreign_key("server_id", SERVERS, "id")
}

/// Time series without a key; rows are ordered by every column when read.
pub fn tps() -> TableDescriptor {
    TableDescriptor::new(TPS)
        .column(reference("server_id"))
        .column(ColumnDescriptor::long("date").not_null())
        .column(ColumnDescriptor::double("tps").not_null())
        .column(ColumnDescriptor::int("players_online").not_null())
        .column(ColumnDescriptor::double("cpu_usage").not_null())
        .column(ColumnDescriptor::long("ram_usage").not_null())
        .column(ColumnDescriptor::int("entities").not_null())
        .column(ColumnDescriptor::int("chunks_loaded").not_null())
        .column(ColumnDescriptor::long("free_disk_space").not_null())
        .foreign_key("server_id", SERVERS, "id")
}

pub fn security() -> TableDescriptor {
    TableDescriptor::new(SECURITY)
        .column(ColumnDescriptor::varchar("username", NAME_LEN).primary_key())
        .column(ColumnDescriptor::varchar("linked_to_uuid", UUID_LEN))
        .column(ColumnDescriptor::varchar("salted_pass_hash", 100).not_null())
        .column(ColumnDescriptor::int("permission_level").not_null())
}

pub fn settings() -> TableDescriptor {
    TableDescriptor::new(SETTINGS)
        .column(id())
        .column(ColumnDescriptor::varchar("server_uuid", UUID_LEN).not_null().unique())
        .column(ColumnDescriptor::long("updated").not_null())
        .column(ColumnDescriptor::varchar("content", 4096).not_null())
}

pub fn all_tables() -> Vec<TableDescriptor> {
    vec![
        servers(),
        users(),
        user_info(),
        nicknames(),
        geolocations(),
        worlds(),
        sessions(),
        world_times(),
        kills(),
        ping(),
        tps(),
        security(),
        settings(),
    ]
}
