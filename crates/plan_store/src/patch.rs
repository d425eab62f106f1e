//! Ordered, append-only schema patches run on every startup.
//!
//! A patch is a plain descriptor: a name, a cheap side-effect free check that
//! reports whether the schema already has the change, and the change itself.
//! Each patch runs in its own transaction on the instance's executor.

use std::future::Future;
use std::pin::Pin;

use log::{debug, info};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait, Value as SeaValue};
use sea_orm_migration::SchemaManager;

use plan_core::builder::{add_column_sql, drop_table_sql};
use plan_core::{ColumnDescriptor, Dialect, PlanError, PlanResult};

use crate::executor::ExecutorClient;
use crate::operation::{dialect_of, exec_sql, query_one_sql};
use crate::transaction::Criticality;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type AppliedFn = for<'a> fn(PatchContext<'a>) -> BoxFuture<'a, PlanResult<bool>>;
pub type ApplyFn = for<'a> fn(PatchContext<'a>) -> BoxFuture<'a, PlanResult<()>>;

#[derive(Clone, Copy)]
pub struct Patch {
    name: &'static str,
    applied: AppliedFn,
    apply: ApplyFn,
}

impl Patch {
    pub const fn new(name: &'static str, applied: AppliedFn, apply: ApplyFn) -> Self {
        Self {
            name,
            applied,
            apply,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch").field("name", &self.name).finish()
    }
}

/// What a patch may look at and change: the transaction it runs in.
#[derive(Clone, Copy)]
pub struct PatchContext<'a> {
    conn: &'a DatabaseTransaction,
    dialect: Dialect,
}

impl<'a> PatchContext<'a> {
    pub fn new(conn: &'a DatabaseTransaction, dialect: Dialect) -> Self {
        Self { conn, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn connection(&self) -> &'a DatabaseTransaction {
        self.conn
    }

    pub async fn has_table(&self, table: &str) -> PlanResult<bool> {
        Ok(SchemaManager::new(self.conn).has_table(table).await?)
    }

    pub async fn has_column(&self, table: &str, column: &str) -> PlanResult<bool> {
        Ok(SchemaManager::new(self.conn)
            .has_column(table, column)
            .await?)
    }

    /// Whether `sql` (a select) yields at least one row.
    pub async fn any_row(&self, sql: &str, params: Vec<SeaValue>) -> PlanResult<bool> {
        Ok(query_one_sql(self.conn, sql, params).await?.is_some())
    }

    pub async fn add_column(&self, table: &str, column: &ColumnDescriptor) -> PlanResult<()> {
        let sql = add_column_sql(table, column, self.dialect)?;
        exec_sql(self.conn, &sql, Vec::new()).await?;
        Ok(())
    }

    pub async fn drop_table(&self, table: &str) -> PlanResult<()> {
        exec_sql(self.conn, &drop_table_sql(table, self.dialect), Vec::new()).await?;
        Ok(())
    }

    pub async fn execute(&self, sql: &str, params: Vec<SeaValue>) -> PlanResult<u64> {
        exec_sql(self.conn, sql, params).await
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatchOutcome {
    Applied,
    AlreadyApplied,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PatchReport {
    pub applied: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

#[derive(Clone, Debug, Default)]
pub struct PatchRegistry {
    patches: Vec<Patch>,
}

impl PatchRegistry {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The production list, oldest patch first.
    pub fn plan_patches() -> Self {
        crate::schema::patches::registry()
    }

    pub fn with(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Applies every outstanding patch in declared order.
    ///
    /// The first failure stops the run with [`PlanError::PatchFailed`].
    pub(crate) async fn run(&self, executor: &ExecutorClient) -> PlanResult<PatchReport> {
        let mut report = PatchReport::default();
        for patch in self.patches.iter().copied() {
            let outcome = executor
                .submit(
                    format!("patch {}", patch.name),
                    Criticality::Critical,
                    move |conn| async move { run_patch(patch, conn).await },
                )
                .await
                .map_err(|err| match err {
                    PlanError::PatchFailed { .. } => err,
                    other => PlanError::patch_failed(patch.name, other.to_string()),
                })?;
            match outcome {
                PatchOutcome::Applied => {
                    info!("applied database patch {}", patch.name);
                    report.applied.push(patch.name);
                }
                PatchOutcome::AlreadyApplied => {
                    debug!("database patch {} already applied", patch.name);
                    report.skipped.push(patch.name);
                }
            }
        }
        Ok(report)
    }

    /// Names of patches whose check currently reports them unapplied.
    pub(crate) async fn unapplied(&self, executor: &ExecutorClient) -> PlanResult<Vec<&'static str>> {
        let patches = self.patches.clone();
        executor
            .submit(
                "check patches",
                Criticality::NonCritical,
                move |conn| async move {
                    let txn = conn.begin().await?;
                    let ctx = PatchContext::new(&txn, dialect_of(&txn)?);
                    let mut unapplied = Vec::new();
                    for patch in &patches {
                        if !(patch.applied)(ctx).await? {
                            unapplied.push(patch.name);
                        }
                    }
                    txn.rollback().await?;
                    Ok::<_, PlanError>(unapplied)
                },
            )
            .await
    }
}

async fn run_patch(patch: Patch, conn: DatabaseConnection) -> PlanResult<PatchOutcome> {
    let txn = conn.begin().await?;
    let ctx = PatchContext::new(&txn, dialect_of(&txn)?);
    let outcome: PlanResult<PatchOutcome> = async {
        if (patch.applied)(ctx).await? {
            return Ok(PatchOutcome::AlreadyApplied);
        }
        (patch.apply)(ctx)
            .await
            .map_err(|err| PlanError::patch_failed(patch.name, err.to_string()))?;
        if !(patch.applied)(ctx).await? {
            return Err(PlanError::patch_failed(
                patch.name,
                "still reports unapplied after apply",
            ));
        }
        Ok(PatchOutcome::Applied)
    }
    .await;
    match outcome {
        Ok(outcome) => {
            txn.commit().await?;
            Ok(outcome)
        }
        Err(err) => {
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}
