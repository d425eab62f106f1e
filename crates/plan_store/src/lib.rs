pub mod config;
pub mod copy;
pub mod database;
pub mod datastore;
mod executor;
pub mod operation;
pub mod patch;
pub mod schema;
pub mod transaction;

pub use plan_core::{
    CellValue, ColumnDescriptor, ColumnKind, DatabaseState, Dialect, ForeignKeyRef, PlanError,
    PlanResult, TableDescriptor, dependency_order,
};

pub use config::{DatabaseConfig, ExecutorConfig, PoolConfig, StorageConfig};
pub use copy::{
    CopyReport, TableCopy, backup_to_sqlite, copy_all, fingerprint, restore_from_sqlite,
    verify_copy,
};
pub use database::Database;
pub use datastore::{default_sqlite_path, load_or_init_config, open_database};
pub use operation::{
    BatchInsert, ClearTable, CountRows, ExecBatchStatement, ExecStatement, Executable,
    FetchAllRows, Query, QueryStatement,
};
pub use patch::{Patch, PatchContext, PatchRegistry, PatchReport};
pub use transaction::{Criticality, Transaction};
