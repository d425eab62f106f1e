mod common;

use std::path::Path;

use plan_store::patch::BoxFuture;
use plan_store::schema::{all_tables, tables};
use plan_store::{
    CellValue, ColumnDescriptor, Database, DatabaseState, ExecStatement, FetchAllRows, Patch,
    PatchContext, PatchRegistry, PlanError, PlanResult, QueryStatement, StorageConfig,
    TableDescriptor, Transaction,
};
use sea_orm::Value;
use tempfile::tempdir;

use common::{open_sqlite, sqlite_database};

const COLUMN_PATCHES: [&str; 6] = [
    "session_afk_time",
    "geo_info_last_used",
    "nickname_last_seen",
    "server_is_proxy",
    "user_info_hostname",
    "security_linked_uuid",
];

fn without(mut table: TableDescriptor, column: &str) -> TableDescriptor {
    table.columns.retain(|c| c.name != column);
    table
}

/// Table shapes as an older release created them.
fn legacy_tables() -> Vec<TableDescriptor> {
    let mut legacy: Vec<TableDescriptor> = all_tables()
        .into_iter()
        .map(|table| match table.name.as_str() {
            tables::SESSIONS => without(table, "afk_time"),
            tables::GEOLOCATIONS => without(table, "last_used"),
            tables::NICKNAMES => without(table, "last_used"),
            tables::SERVERS => without(table, "is_proxy"),
            tables::USER_INFO => without(table, "hostname"),
            tables::SECURITY => without(table, "linked_to_uuid"),
            _ => table,
        })
        .collect();
    legacy.push(
        TableDescriptor::new("plan_transfer")
            .column(ColumnDescriptor::long("expiry_date").not_null())
            .column(ColumnDescriptor::varchar("content_64", 4096)),
    );
    legacy
}

async fn create_legacy_database(base: &Path) -> PlanResult<()> {
    let legacy = Database::with_schema(
        StorageConfig::default_sqlite(base.join("plan.db").to_string_lossy()),
        base,
        legacy_tables(),
        PatchRegistry::empty(),
    );
    legacy.init().await?;
    legacy
        .execute_transaction(
            Transaction::new("legacy fixtures")
                .execute(ExecStatement::new(
                    "INSERT INTO plan_servers (id, uuid, name, is_installed, max_players) VALUES (?, ?, ?, ?, ?)",
                    vec![
                        Value::from(1),
                        Value::from(uuid::Uuid::new_v4().to_string()),
                        Value::from("Lobby"),
                        Value::from(true),
                        Value::from(20),
                    ],
                ))
                .execute(ExecStatement::new(
                    "INSERT INTO plan_users (id, uuid, registered, name) VALUES (?, ?, ?, ?)",
                    vec![
                        Value::from(1),
                        Value::from(uuid::Uuid::new_v4().to_string()),
                        Value::from(common::REGISTERED),
                        Value::from("Notch"),
                    ],
                ))
                .execute(ExecStatement::new(
                    "INSERT INTO plan_sessions (id, user_id, server_id, session_start, session_end, mob_kills, deaths) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        Value::from(1),
                        Value::from(1),
                        Value::from(1),
                        Value::from(common::REGISTERED),
                        Value::from(common::REGISTERED + 60_000),
                        Value::from(3),
                        Value::from(1),
                    ],
                )),
        )
        .await?;
    legacy.close().await
}

async fn table_exists(database: &Database, name: &str) -> PlanResult<bool> {
    database
        .query(QueryStatement::new(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            vec![Value::from(name.to_string())],
            |rows: &[sea_orm::QueryResult]| Ok(!rows.is_empty()),
        ))
        .await
}

fn never_applied(_ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<bool>> {
    Box::pin(async { Ok(false) })
}

fn does_nothing(_ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async { Ok(()) })
}

fn alter_missing_table(ctx: PatchContext<'_>) -> BoxFuture<'_, PlanResult<()>> {
    Box::pin(async move {
        ctx.execute("ALTER TABLE plan_missing ADD COLUMN broken INTEGER", Vec::new())
            .await?;
        Ok(())
    })
}

#[tokio::test]
async fn fresh_schema_needs_no_patches() -> PlanResult<()> {
    let dir = tempdir().expect("tempdir");
    let database = open_sqlite(dir.path(), "plan.db").await?;
    let report = database.last_patch_report().expect("report");
    assert!(report.applied.is_empty(), "{report:?}");
    assert_eq!(report.skipped.len(), PatchRegistry::plan_patches().len());
    assert!(database.unapplied_patches().await?.is_empty());
    database.close().await?;
    Ok(())
}

#[tokio::test]
async fn legacy_schema_is_upgraded_in_place() -> PlanResult<()> {
    let dir = tempdir().expect("tempdir");
    create_legacy_database(dir.path()).await?;

    let database = open_sqlite(dir.path(), "plan.db").await?;
    let report = database.last_patch_report().expect("report");
    let mut expected: Vec<&str> = COLUMN_PATCHES.to_vec();
    expected.push("transfer_table_removal");
    assert_eq!(report.applied, expected);
    assert_eq!(report.skipped, vec!["session_afk_non_negative"]);
    assert!(database.unapplied_patches().await?.is_empty());
    assert!(!table_exists(&database, "plan_transfer").await?);

    let sessions = database.query(FetchAllRows::new(tables::sessions())).await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].last(), Some(&CellValue::Long(0)));
    let servers = database.query(FetchAllRows::new(tables::servers())).await?;
    let is_proxy = tables::servers()
        .columns
        .iter()
        .position(|c| c.name == "is_proxy")
        .expect("column");
    assert_eq!(servers[0][is_proxy], CellValue::Bool(false));
    database.close().await?;
    Ok(())
}

#[tokio::test]
async fn second_run_is_a_no_op_and_data_fixes_apply_once() -> PlanResult<()> {
    let dir = tempdir().expect("tempdir");
    create_legacy_database(dir.path()).await?;
    let database = open_sqlite(dir.path(), "plan.db").await?;
    database
        .execute_transaction(Transaction::new("corrupt afk").execute(ExecStatement::new(
            "UPDATE plan_sessions SET afk_time = ? WHERE id = ?",
            vec![Value::from(-500i64), Value::from(1)],
        )))
        .await?;
    database.close().await?;

    database.init().await?;
    let report = database.last_patch_report().expect("report");
    assert_eq!(report.applied, vec!["session_afk_non_negative"]);
    let sessions = database.query(FetchAllRows::new(tables::sessions())).await?;
    assert_eq!(sessions[0].last(), Some(&CellValue::Long(0)));
    database.close().await?;

    database.init().await?;
    let report = database.last_patch_report().expect("report");
    assert!(report.applied.is_empty(), "{report:?}");
    database.close().await?;
    Ok(())
}

#[tokio::test]
async fn patch_that_does_not_stick_aborts_init() -> PlanResult<()> {
    let dir = tempdir().expect("tempdir");
    create_legacy_database(dir.path()).await?;
    let database = Database::with_schema(
        StorageConfig::default_sqlite(dir.path().join("plan.db").to_string_lossy()),
        dir.path(),
        all_tables(),
        PatchRegistry::plan_patches().with(Patch::new("never_sticks", never_applied, does_nothing)),
    );
    let err = database.init().await.expect_err("patch never applies");
    assert!(err.is_fatal());
    match &err {
        PlanError::PatchFailed { patch, .. } => assert_eq!(patch, "never_sticks"),
        other => panic!("expected PatchFailed, got {other}"),
    }
    assert_eq!(database.state(), DatabaseState::Closed);

    // earlier patches committed on their own and the file is released
    let reopened = open_sqlite(dir.path(), "plan.db").await?;
    let report = reopened.last_patch_report().expect("report");
    assert!(report.applied.is_empty(), "{report:?}");
    reopened.close().await?;
    Ok(())
}

#[tokio::test]
async fn failing_apply_names_the_patch() {
    let dir = tempdir().expect("tempdir");
    let database = Database::with_schema(
        StorageConfig::default_sqlite(dir.path().join("plan.db").to_string_lossy()),
        dir.path(),
        all_tables(),
        PatchRegistry::empty().with(Patch::new("broken_alter", never_applied, alter_missing_table)),
    );
    let err = database.init().await.expect_err("alter fails");
    assert!(err.to_string().contains("broken_alter"), "{err}");
    assert_eq!(database.state(), DatabaseState::Closed);
    let fallback = sqlite_database(dir.path(), "plan.db");
    fallback.init().await.expect("healthy registry opens");
    fallback.close().await.expect("close");
}
