//! Full-dataset copy between two open databases, possibly of different
//! dialects, using only the ordinary query and transaction primitives.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, info, warn};
use sea_orm::{DatabaseTransaction, Value as SeaValue};

use plan_core::{CellValue, Dialect, PlanError, PlanResult, TableDescriptor, dependency_order};

use crate::config::StorageConfig;
use crate::database::Database;
use crate::operation::{BatchInsert, ClearTable, Executable, FetchAllRows, exec_sql};
use crate::transaction::Transaction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableCopy {
    pub table: String,
    pub rows: u64,
    /// blake3 over the rows in key order, hex encoded.
    pub digest: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Source and destination were the same database; nothing was touched.
    pub skipped: bool,
    pub tables: Vec<TableCopy>,
}

impl CopyReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableCopy> {
        self.tables.iter().find(|table| table.table == name)
    }
}

pub fn rows_digest(rows: &[Vec<CellValue>]) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut buf = Vec::new();
    for row in rows {
        buf.clear();
        buf.extend_from_slice(&(row.len() as u32).to_le_bytes());
        for cell in row {
            cell.encode_into(&mut buf);
        }
        hasher.update(&buf);
    }
    hasher.finalize().to_hex().to_string()
}

/// Moves a Postgres serial sequence past the ids copied in explicitly.
struct ResetSequence {
    table: String,
    column: String,
}

#[async_trait]
impl Executable for ResetSequence {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool> {
        let table = Dialect::Postgres.quote_ident(&self.table);
        let column = Dialect::Postgres.quote_ident(&self.column);
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence(?, ?), COALESCE((SELECT MAX({column}) FROM {table}), 0) + 1, false)"
        );
        let params = vec![
            SeaValue::from(table.as_str()),
            SeaValue::from(self.column.as_str()),
        ];
        exec_sql(conn, &sql, params).await?;
        Ok(true)
    }
}

/// Replaces everything in `destination` with the contents of `source`.
///
/// Both instances must be open. Copying a database onto itself is refused
/// and reported as skipped. The source is read in full first and the
/// destination is rewritten in a single transaction, so a failed copy leaves
/// the destination as it was.
pub async fn copy_all(source: &Database, destination: &Database) -> PlanResult<CopyReport> {
    if source.same_target(destination) {
        warn!(
            "refusing to copy {} onto itself",
            source.target_description()
        );
        return Ok(CopyReport {
            skipped: true,
            tables: Vec::new(),
        });
    }
    let ordered = dependency_order(source.tables())?;

    let mut write = Transaction::new(format!(
        "copy from {}",
        source.target_description()
    ))
    .critical();
    for table in ordered.iter().rev() {
        write = write.execute(ClearTable::new(table.name.clone()));
    }

    let mut report = CopyReport::default();
    for table in ordered {
        let rows = source.query(FetchAllRows::new(table.clone())).await?;
        report.tables.push(TableCopy {
            table: table.name.clone(),
            rows: rows.len() as u64,
            digest: rows_digest(&rows),
        });
        let target: TableDescriptor = destination
            .table(&table.name)
            .cloned()
            .unwrap_or_else(|| table.clone());
        write = write.execute(BatchInsert::new(target.clone(), rows));
        if destination.dialect() == Dialect::Postgres
            && let Some(column) = target.auto_increment_column()
        {
            write = write.execute(ResetSequence {
                table: target.name.clone(),
                column: column.name.clone(),
            });
        }
    }
    destination.execute_transaction(write).await?;
    for copied in &report.tables {
        debug!("copied {} rows of {}", copied.rows, copied.table);
    }
    info!(
        "copied {} rows from {} to {}",
        report.total_rows(),
        source.target_description(),
        destination.target_description()
    );
    Ok(report)
}

/// Row count and digest of every table in `database`, in dependency order.
pub async fn fingerprint(database: &Database) -> PlanResult<Vec<TableCopy>> {
    let mut tables = Vec::new();
    for table in dependency_order(database.tables())? {
        let rows = database.query(FetchAllRows::new(table.clone())).await?;
        tables.push(TableCopy {
            table: table.name.clone(),
            rows: rows.len() as u64,
            digest: rows_digest(&rows),
        });
    }
    Ok(tables)
}

/// Whether `destination` now holds exactly what `report` says was copied.
pub async fn verify_copy(destination: &Database, report: &CopyReport) -> PlanResult<bool> {
    let current = fingerprint(destination).await?;
    Ok(report.tables.iter().all(|copied| current.contains(copied)))
}

/// Copies `source` into a new timestamped SQLite file under `dir`.
pub async fn backup_to_sqlite(source: &Database, dir: &Path) -> PlanResult<(PathBuf, CopyReport)> {
    fs::create_dir_all(dir).map_err(|err| PlanError::storage(format!("create {dir:?}: {err}")))?;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| PlanError::storage(format!("system clock: {err}")))?
        .as_millis();
    let path = dir.join(format!("plan-backup-{millis}.sqlite"));
    let backup = sqlite_peer(source, &path);
    let copied = match backup.init().await {
        Ok(()) => {
            let copied = copy_all(source, &backup).await;
            backup.close().await.and(copied)
        }
        Err(err) => Err(err),
    };
    match copied {
        Ok(report) => Ok((path, report)),
        Err(err) => {
            discard_backup(&path);
            Err(err)
        }
    }
}

/// Removes a backup file that never received a complete copy.
fn discard_backup(path: &Path) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        let candidate = PathBuf::from(name);
        if candidate.exists()
            && let Err(err) = fs::remove_file(&candidate)
        {
            warn!("could not remove incomplete backup {}: {err}", candidate.display());
        }
    }
}

/// Replaces the contents of `destination` with a backup file.
pub async fn restore_from_sqlite(path: &Path, destination: &Database) -> PlanResult<CopyReport> {
    if !path.is_file() {
        return Err(PlanError::invalid(format!(
            "backup file {} does not exist",
            path.display()
        )));
    }
    let backup = sqlite_peer(destination, path);
    backup.init().await?;
    let copied = copy_all(&backup, destination).await;
    backup.close().await?;
    copied
}

fn sqlite_peer(like: &Database, path: &Path) -> Database {
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Database::with_schema(
        StorageConfig::default_sqlite(path.to_string_lossy()),
        base_dir,
        like.tables().to_vec(),
        like.patches().clone(),
    )
}
