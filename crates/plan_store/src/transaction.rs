use log::{debug, warn};
use sea_orm::{DatabaseConnection, TransactionTrait};

use plan_core::{PlanError, PlanResult};

use crate::operation::Executable;

/// Whether work must finish before shutdown completes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Criticality {
    Critical,
    NonCritical,
}

/// Ordered executables committed or rolled back as one unit.
pub struct Transaction {
    label: String,
    criticality: Criticality,
    operations: Vec<Box<dyn Executable>>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            criticality: Criticality::NonCritical,
            operations: Vec::new(),
        }
    }

    pub fn critical(mut self) -> Self {
        self.criticality = Criticality::Critical;
        self
    }

    pub fn execute(mut self, operation: impl Executable + 'static) -> Self {
        self.operations.push(Box::new(operation));
        self
    }

    pub fn push(&mut self, operation: Box<dyn Executable>) {
        self.operations.push(operation);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn is_critical(&self) -> bool {
        self.criticality == Criticality::Critical
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Hands the instance's batch size to every operation that has none.
    pub(crate) fn use_chunk_rows(&mut self, chunk_rows: usize) {
        for operation in &mut self.operations {
            operation.use_chunk_rows(chunk_rows);
        }
    }

    /// Runs every operation inside one connection-level transaction.
    ///
    /// The first failing operation rolls back everything before it.
    pub(crate) async fn run(&self, conn: &DatabaseConnection) -> PlanResult<()> {
        let txn = conn
            .begin()
            .await
            .map_err(|err| PlanError::transaction(&self.label, format!("begin: {err}")))?;
        for (index, operation) in self.operations.iter().enumerate() {
            match operation.execute(&txn).await {
                Ok(true) => {}
                Ok(false) => debug!(
                    "transaction '{}': step {index} did not affect the expected rows",
                    self.label
                ),
                Err(err) => {
                    warn!(
                        "transaction '{}' rolling back at step {index}: {err}",
                        self.label
                    );
                    if let Err(rollback) = txn.rollback().await {
                        warn!("transaction '{}': rollback failed: {rollback}", self.label);
                    }
                    return Err(PlanError::transaction(
                        &self.label,
                        format!("step {index}: {err}"),
                    ));
                }
            }
        }
        txn.commit()
            .await
            .map_err(|err| PlanError::transaction(&self.label, format!("commit: {err}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("criticality", &self.criticality)
            .field("operations", &self.operations.len())
            .finish()
    }
}
