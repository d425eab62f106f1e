//! The handle callers hold: lifecycle, schema bootstrap and work submission.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{LevelFilter, error, info, warn};
use sea_orm::{
    ConnectOptions, Database as SeaDatabase, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};

use plan_core::{DatabaseState, Dialect, PlanError, PlanResult, TableDescriptor, dependency_order};

use crate::config::{DatabaseConfig, StorageConfig};
use crate::executor::{Executor, ExecutorClient};
use crate::operation::{ExecStatement, Query};
use crate::patch::{PatchRegistry, PatchReport};
use crate::schema;
use crate::transaction::{Criticality, Transaction};

struct Running {
    conn: DatabaseConnection,
    executor: Executor,
}

struct DatabaseInner {
    config: StorageConfig,
    base_dir: PathBuf,
    dialect: Dialect,
    tables: Vec<TableDescriptor>,
    patches: PatchRegistry,
    state: AtomicU8,
    running: Mutex<Option<Running>>,
    last_patch_report: Mutex<Option<PatchReport>>,
}

/// One configured database. Cloning shares the same instance.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(config: StorageConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_schema(
            config,
            base_dir,
            schema::all_tables(),
            PatchRegistry::plan_patches(),
        )
    }

    /// A database whose bootstrap uses the given tables and patches.
    pub fn with_schema(
        config: StorageConfig,
        base_dir: impl Into<PathBuf>,
        tables: Vec<TableDescriptor>,
        patches: PatchRegistry,
    ) -> Self {
        let dialect = config.dialect();
        Self {
            inner: Arc::new(DatabaseInner {
                config,
                base_dir: base_dir.into(),
                dialect,
                tables,
                patches,
                state: AtomicU8::new(DatabaseState::Closed.as_u8()),
                running: Mutex::new(None),
                last_patch_report: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> DatabaseState {
        DatabaseState::from_u8(self.inner.state.load(Ordering::SeqCst))
            .unwrap_or(DatabaseState::Closed)
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.inner.base_dir
    }

    pub fn tables(&self) -> &[TableDescriptor] {
        &self.inner.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.inner.tables.iter().find(|table| table.name == name)
    }

    pub fn patches(&self) -> &PatchRegistry {
        &self.inner.patches
    }

    /// What the last successful `init()` did with each patch.
    pub fn last_patch_report(&self) -> Option<PatchReport> {
        lock(&self.inner.last_patch_report).clone()
    }

    /// Work queued on the executor and not yet started.
    pub fn pending(&self) -> usize {
        lock(&self.inner.running)
            .as_ref()
            .map_or(0, |running| running.executor.client().pending())
    }

    /// Where this instance connects, with any password masked.
    pub fn target_description(&self) -> String {
        self.inner.config.target_description(&self.inner.base_dir)
    }

    /// Whether both handles would read and write the same physical database.
    pub fn same_target(&self, other: &Database) -> bool {
        self.dialect() == other.dialect() && self.target_key() == other.target_key()
    }

    fn target_key(&self) -> String {
        match &self.inner.config.database {
            DatabaseConfig::Sqlite { .. } => match self.inner.config.sqlite_path(&self.inner.base_dir) {
                Ok(path) => fs::canonicalize(&path)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .into_owned(),
                Err(_) => String::new(),
            },
            DatabaseConfig::Mysql { url } | DatabaseConfig::Postgres { url } => {
                url.trim_end_matches('/').to_string()
            }
        }
    }

    /// Connects, creates missing tables and applies outstanding patches.
    ///
    /// Any failure releases what was opened and leaves the instance `Closed`.
    pub async fn init(&self) -> PlanResult<()> {
        self.transition(DatabaseState::Closed, DatabaseState::Opening)?;
        match self.open().await {
            Ok((running, report)) => {
                *lock(&self.inner.running) = Some(running);
                *lock(&self.inner.last_patch_report) = Some(report);
                self.set_state(DatabaseState::Open);
                info!("{} database open at {}", self.dialect().name(), self.target_description());
                Ok(())
            }
            Err(err) => {
                self.set_state(DatabaseState::Closed);
                error!(
                    "{} database at {} failed to open: {err}",
                    self.dialect().name(),
                    self.target_description()
                );
                Err(err)
            }
        }
    }

    async fn open(&self) -> PlanResult<(Running, PatchReport)> {
        let target = self.target_description();
        let options = self.connect_options(&target)?;
        let conn = SeaDatabase::connect(options)
            .await
            .map_err(|err| PlanError::fatal_init(&target, err.to_string()))?;
        let executor = Executor::start(target.clone(), conn.clone());
        let client = executor.client();
        match self.bootstrap(&client, &target).await {
            Ok(report) => Ok((Running { conn, executor }, report)),
            Err(err) => {
                drop(client);
                executor.shutdown(Duration::ZERO).await;
                if let Err(close_err) = conn.close().await {
                    warn!("closing {target} after a failed init: {close_err}");
                }
                Err(err)
            }
        }
    }

    fn connect_options(&self, target: &str) -> PlanResult<ConnectOptions> {
        let config = &self.inner.config;
        if let DatabaseConfig::Sqlite { .. } = config.database {
            let path = config.sqlite_path(&self.inner.base_dir)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| PlanError::fatal_init(target, format!("create {parent:?}: {err}")))?;
            }
        }
        let url = config.connection_url(&self.inner.base_dir)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging_level(LevelFilter::Debug);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        Ok(options)
    }

    async fn bootstrap(&self, client: &ExecutorClient, target: &str) -> PlanResult<PatchReport> {
        let mut create = Transaction::new("create base schema").critical();
        for table in dependency_order(&self.inner.tables)? {
            create = create.execute(ExecStatement::ddl(table.create_statement(self.dialect())?));
        }
        client
            .submit(create.label().to_string(), Criticality::Critical, move |conn| async move {
                create.run(&conn).await
            })
            .await
            .map_err(|err| PlanError::fatal_init(target, err.to_string()))?;
        self.inner.patches.run(client).await
    }

    /// Runs a read. SQLite reads queue behind writes; engines with
    /// concurrent readers use a pooled connection directly.
    pub async fn query<Q>(&self, query: Q) -> PlanResult<Q::Output>
    where
        Q: Query + 'static,
    {
        let (conn, client) = self.handles()?;
        let result = if self.dialect().supports_concurrent_readers() {
            run_query(&query, &conn).await
        } else {
            client
                .submit(
                    std::any::type_name::<Q>(),
                    Criticality::NonCritical,
                    move |conn| async move { run_query(&query, &conn).await },
                )
                .await
        };
        if let Err(err) = &result {
            warn!("query {} failed: {err}", std::any::type_name::<Q>());
        }
        result
    }

    /// Queues `transaction` and waits for its commit or rollback.
    pub async fn execute_transaction(&self, mut transaction: Transaction) -> PlanResult<()> {
        let (_, client) = self.handles()?;
        transaction.use_chunk_rows(self.config().batch_chunk_rows());
        let label = transaction.label().to_string();
        let result = client
            .submit(label.clone(), transaction.criticality(), move |conn| async move {
                transaction.run(&conn).await
            })
            .await;
        if let Err(err) = &result {
            warn!("transaction '{label}' failed: {err}");
        }
        result
    }

    /// Names of registered patches whose check currently fails.
    pub async fn unapplied_patches(&self) -> PlanResult<Vec<&'static str>> {
        let (_, client) = self.handles()?;
        self.inner.patches.unapplied(&client).await
    }

    /// Drains the executor and closes the pool. A closed instance is left alone.
    pub async fn close(&self) -> PlanResult<()> {
        if self.state() == DatabaseState::Closed {
            return Ok(());
        }
        self.transition(DatabaseState::Open, DatabaseState::Closing)?;
        let running = lock(&self.inner.running).take();
        if let Some(Running { conn, executor }) = running {
            executor.shutdown(self.inner.config.shutdown_grace()).await;
            if let Err(err) = conn.close().await {
                warn!("closing {}: {err}", self.target_description());
            }
        }
        self.set_state(DatabaseState::Closed);
        info!("{} database at {} closed", self.dialect().name(), self.target_description());
        Ok(())
    }

    fn handles(&self) -> PlanResult<(DatabaseConnection, ExecutorClient)> {
        let state = self.state();
        if !state.is_open() {
            return Err(PlanError::not_open(state));
        }
        lock(&self.inner.running)
            .as_ref()
            .map(|running| (running.conn.clone(), running.executor.client()))
            .ok_or_else(|| PlanError::not_open(self.state()))
    }

    fn transition(&self, from: DatabaseState, to: DatabaseState) -> PlanResult<()> {
        self.inner
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|current| {
                let current = DatabaseState::from_u8(current).unwrap_or(DatabaseState::Closed);
                PlanError::invalid(format!("cannot move from {current} to {to}"))
            })
    }

    fn set_state(&self, state: DatabaseState) {
        self.inner.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect())
            .field("target", &self.target_description())
            .field("state", &self.state())
            .finish()
    }
}

async fn run_query<Q: Query>(query: &Q, conn: &DatabaseConnection) -> PlanResult<Q::Output> {
    let txn: DatabaseTransaction = conn.begin().await?;
    let output = query.run(&txn).await;
    match output {
        Ok(output) => {
            txn.commit().await?;
            Ok(output)
        }
        Err(err) => {
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
