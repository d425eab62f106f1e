#![allow(dead_code)]

use std::path::Path;

use plan_store::schema::tables;
use plan_store::{
    BatchInsert, CellValue, Database, DatabaseConfig, PlanResult, StorageConfig, TableDescriptor,
    Transaction,
};
use uuid::Uuid;

pub const REGISTERED: i64 = 1_600_000_000_000;

pub fn sqlite_database(base: &Path, file: &str) -> Database {
    Database::new(
        StorageConfig::default_sqlite(base.join(file).to_string_lossy()),
        base,
    )
}

pub async fn open_sqlite(base: &Path, file: &str) -> PlanResult<Database> {
    let database = sqlite_database(base, file);
    database.init().await?;
    Ok(database)
}

/// Remote engines are only exercised when their URL is exported.
pub fn remote_database(var: &str, base: &Path) -> Option<Database> {
    let url = std::env::var(var).ok().filter(|url| !url.is_empty())?;
    let database = if url.starts_with("mysql") {
        DatabaseConfig::Mysql { url }
    } else {
        DatabaseConfig::Postgres { url }
    };
    Some(Database::new(StorageConfig::remote(database), base))
}

fn insert(table: TableDescriptor, rows: Vec<Vec<CellValue>>) -> BatchInsert {
    BatchInsert::new(table, rows)
}

/// One server with `players` users, each with a session, nickname, ping and
/// world time, plus kills between neighbours.
pub async fn seed(database: &Database, players: i32) -> PlanResult<()> {
    let server_uuid = Uuid::new_v4().to_string();
    let servers = vec![vec![
        CellValue::Int(1),
        CellValue::from(server_uuid.as_str()),
        "Lobby".into(),
        CellValue::Null,
        true.into(),
        false.into(),
        CellValue::Int(50),
    ]];
    let worlds = vec![
        vec![CellValue::Int(1), "world".into(), CellValue::Int(1)],
        vec![CellValue::Int(2), "world_nether".into(), CellValue::Int(1)],
    ];
    let mut users = Vec::new();
    let mut user_info = Vec::new();
    let mut nicknames = Vec::new();
    let mut geolocations = Vec::new();
    let mut sessions = Vec::new();
    let mut world_times = Vec::new();
    let mut kills = Vec::new();
    let mut ping = Vec::new();
    let mut tps = Vec::new();
    for id in 1..=players {
        let at = REGISTERED + i64::from(id) * 60_000;
        users.push(vec![
            CellValue::Int(id),
            Uuid::new_v4().to_string().into(),
            CellValue::Long(at),
            format!("player{id}").into(),
            CellValue::Int(id % 3),
        ]);
        user_info.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            CellValue::Int(1),
            CellValue::Long(at),
            (id % 5 == 0).into(),
            false.into(),
            CellValue::from((id % 2 == 0).then(|| format!("play{id}.example.net"))),
        ]);
        nicknames.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            format!("Nick{id}").into(),
            CellValue::Int(1),
            CellValue::Long(at),
        ]);
        geolocations.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            "Finland".into(),
            CellValue::Long(at),
        ]);
        sessions.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            CellValue::Int(1),
            CellValue::Long(at),
            CellValue::Long(at + 3_600_000),
            CellValue::Int(id * 2),
            CellValue::Int(id % 4),
            CellValue::Long(i64::from(id) * 1_000),
        ]);
        world_times.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            CellValue::Int(1 + id % 2),
            CellValue::Int(1),
            CellValue::Int(id),
            CellValue::Long(3_000_000),
            CellValue::Long(600_000),
            CellValue::Long(0),
            CellValue::Long(0),
        ]);
        if id > 1 {
            kills.push(vec![
                CellValue::Int(id - 1),
                CellValue::Int(id),
                CellValue::Int(id - 1),
                CellValue::Int(1),
                CellValue::Int(id),
                "Diamond Sword".into(),
                CellValue::Long(at + 1_000),
            ]);
        }
        ping.push(vec![
            CellValue::Int(id),
            CellValue::Int(id),
            CellValue::Int(1),
            CellValue::Long(at),
            CellValue::Int(5),
            CellValue::Int(120),
            CellValue::Double(32.5 + f64::from(id)),
        ]);
        tps.push(vec![
            CellValue::Int(1),
            CellValue::Long(at),
            CellValue::Double(19.75),
            CellValue::Int(id),
            CellValue::Double(0.25),
            CellValue::Long(2_048),
            CellValue::Int(150 + id),
            CellValue::Int(400),
            CellValue::Long(50_000),
        ]);
    }
    let security = vec![vec![
        "admin".into(),
        CellValue::Null,
        "salted$hash".into(),
        CellValue::Int(0),
    ]];
    let settings = vec![vec![
        CellValue::Int(1),
        server_uuid.into(),
        CellValue::Long(REGISTERED),
        r#"{"webserver":{"port":8804}}"#.into(),
    ]];

    let seed = Transaction::new("seed fixtures")
        .execute(insert(tables::servers(), servers))
        .execute(insert(tables::users(), users))
        .execute(insert(tables::user_info(), user_info))
        .execute(insert(tables::nicknames(), nicknames))
        .execute(insert(tables::geolocations(), geolocations))
        .execute(insert(tables::worlds(), worlds))
        .execute(insert(tables::sessions(), sessions))
        .execute(insert(tables::world_times(), world_times))
        .execute(insert(tables::kills(), kills))
        .execute(insert(tables::ping(), ping))
        .execute(insert(tables::tps(), tps))
        .execute(insert(tables::security(), security))
        .execute(insert(tables::settings(), settings));
    database.execute_transaction(seed).await
}
