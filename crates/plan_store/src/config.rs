use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use plan_core::{Dialect, PlanError, PlanResult};

const DEFAULT_CONFIG_NAME: &str = "plan-db.json";
pub const DEFAULT_SQLITE_NAME: &str = "database.db";
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;
pub(crate) const DEFAULT_BATCH_CHUNK_ROWS: usize = 2_048;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Mysql { url: String },
    Postgres { url: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// How long queued non-critical work may still run after `close()`.
    pub shutdown_grace_ms: Option<u64>,
    /// Rows per round trip for batched statements.
    pub batch_chunk_rows: Option<usize>,
}

impl ExecutorConfig {
    pub fn with_defaults() -> Self {
        Self {
            shutdown_grace_ms: Some(DEFAULT_SHUTDOWN_GRACE_MS),
            batch_chunk_rows: Some(DEFAULT_BATCH_CHUNK_ROWS),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub executor: Option<ExecutorConfig>,
}

impl StorageConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            executor: Some(ExecutorConfig::with_defaults()),
        }
    }

    pub fn remote(database: DatabaseConfig) -> Self {
        Self {
            database,
            pool: None,
            executor: Some(ExecutorConfig::with_defaults()),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> PlanResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| PlanError::config(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| PlanError::config(format!("read config: {err}")))?;
            let config: StorageConfig = serde_json::from_str(&raw)
                .map_err(|err| PlanError::config(format!("parse config: {err}")))?;
            return Ok(config);
        }
        let default = StorageConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| PlanError::config(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| PlanError::config(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn dialect(&self) -> Dialect {
        match self.database {
            DatabaseConfig::Sqlite { .. } => Dialect::Sqlite,
            DatabaseConfig::Mysql { .. } => Dialect::Mysql,
            DatabaseConfig::Postgres { .. } => Dialect::Postgres,
        }
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> PlanResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SQLITE_NAME.to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(PlanError::config("config is not sqlite backend")),
        }
    }

    pub fn connection_url(&self, base_dir: &Path) -> PlanResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Mysql { url } | DatabaseConfig::Postgres { url } => Ok(url.clone()),
        }
    }

    /// Connection target safe to print: passwords in URLs are masked.
    pub fn target_description(&self, base_dir: &Path) -> String {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => match self.sqlite_path(base_dir) {
                Ok(path) => format!("sqlite:{}", path.display()),
                Err(_) => "sqlite".to_string(),
            },
            DatabaseConfig::Mysql { url } | DatabaseConfig::Postgres { url } => mask_password(url),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        let millis = self
            .executor
            .as_ref()
            .and_then(|executor| executor.shutdown_grace_ms)
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS);
        Duration::from_millis(millis)
    }

    pub fn batch_chunk_rows(&self) -> usize {
        self.executor
            .as_ref()
            .and_then(|executor| executor.batch_chunk_rows)
            .unwrap_or(DEFAULT_BATCH_CHUNK_ROWS)
            .max(1)
    }
}

fn mask_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
