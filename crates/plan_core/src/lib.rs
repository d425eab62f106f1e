pub mod builder;
pub mod dialect;
pub mod error;
pub mod lifecycle;
pub mod schema;
pub mod value;

pub use dialect::Dialect;
pub use error::{PlanError, PlanResult};
pub use lifecycle::DatabaseState;
pub use schema::{ColumnDescriptor, ColumnKind, ForeignKeyRef, TableDescriptor, dependency_order};
pub use value::CellValue;
