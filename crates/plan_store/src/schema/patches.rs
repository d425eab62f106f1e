//! Patches that bring databases created by older releases up to the current
//! table shapes. Append only: never reorder or remove an entry.

use plan_core::{ColumnDescriptor, PlanResult};

use crate::patch::{BoxFuture, Patch, PatchContext, PatchRegistry};
use crate::schema::tables::{GEOLOCATIONS, NICKNAMES, SECURITY, SERVERS, SESSIONS, USER_INFO};

/// Dropped once transfers moved off the database.
pub const RETIRED_TRANSFER_TABLE: &str = "plan_transfer";

pub fn registry() -> PatchRegistry {
    PatchRegistry::new(vec![
        Patch::new("session_afk_time", session_afk_time_applied, session_afk_time),
        Patch::new(
            "geo_info_last_used",
            geo_info_last_used_applied,
            geo_info_last_used,
        ),
        Patch::new(
            "nickname_last_seen",
            nickname_last_seen_applied,
            nickname_last_seen,
        ),
        Patch::new("server_is_proxy", server_is_proxy_applied, server_is_proxy),
        Patch::new(
            "user_info_hostname",
            user_info_hostname_applied,
            user_info_hostname,
        ),
        Patch::new(
            "security_linked_uuid",
            security_linked_uuid_applied,
            security_linked_uuid,
        ),
        Patch::new(
            "transfer_table_removal",
            transfer_table_removed,
            remove_transfer_table,
        ),
        Patch::new(
            "session_afk_non_negative",
            session_afk_non_negative_applied,
            session_afk_non_negative,
        ),
    ])
}

fn session_afk_time_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(SESSIONS, "afk_time").await })
}

fn session_afk_time(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        let column = ColumnDescriptor::long("afk_time")
            .not_null()
            .default_value(0i64);
        ctx.add_column(SESSIONS, &column).await
    })
}

fn geo_info_last_used_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(GEOLOCATIONS, "last_used").await })
}

fn geo_info_last_used(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        let column = ColumnDescriptor::long("last_used")
            .not_null()
            .default_value(0i64);
        ctx.add_column(GEOLOCATIONS, &column).await
    })
}

fn nickname_last_seen_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(NICKNAMES, "last_used").await })
}

fn nickname_last_seen(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        let column = ColumnDescriptor::long("last_used")
            .not_null()
            .default_value(0i64);
        ctx.add_column(NICKNAMES, &column).await
    })
}

fn server_is_proxy_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(SERVERS, "is_proxy").await })
}

fn server_is_proxy(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        let column = ColumnDescriptor::boolean("is_proxy")
            .not_null()
            .default_value(false);
        ctx.add_column(SERVERS, &column).await
    })
}

fn user_info_hostname_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(USER_INFO, "hostname").await })
}

fn user_info_hostname(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        ctx.add_column(USER_INFO, &ColumnDescriptor::varchar("hostname", 255))
            .await
    })
}

fn security_linked_uuid_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { ctx.has_column(SECURITY, "linked_to_uuid").await })
}

fn security_linked_uuid(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        ctx.add_column(SECURITY, &ColumnDescriptor::varchar("linked_to_uuid", 36))
            .await
    })
}

fn transfer_table_removed(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move { Ok(!ctx.has_table(RETIRED_TRANSFER_TABLE).await?) })
}

fn remove_transfer_table(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move { ctx.drop_table(RETIRED_TRANSFER_TABLE).await })
}

// Older releases could store a negative AFK time when a session ended while
// the player was flagged AFK.
fn session_afk_non_negative_applied(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async move {
        let negative = ctx
            .any_row(
                "SELECT 1 FROM plan_sessions WHERE afk_time < 0 LIMIT 1",
                Vec::new(),
            )
            .await?;
        Ok(!negative)
    })
}

fn session_afk_non_negative(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        ctx.execute(
            "UPDATE plan_sessions SET afk_time = 0 WHERE afk_time < 0",
            Vec::new(),
        )
        .await?;
        Ok(())
    })
}
