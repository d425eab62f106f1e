use std::path::{Path, PathBuf};

use plan_core::PlanResult;

use crate::config::{DEFAULT_SQLITE_NAME, StorageConfig};
use crate::database::Database;

pub fn load_or_init_config(base: &Path) -> PlanResult<StorageConfig> {
    StorageConfig::load_or_init(base, &default_sqlite_path(base))
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_SQLITE_NAME)
}

/// Loads (or writes) the data directory's config and opens that database.
pub async fn open_database(base: &Path) -> PlanResult<Database> {
    let config = load_or_init_config(base)?;
    let database = Database::new(config, base);
    database.init().await?;
    Ok(database)
}
