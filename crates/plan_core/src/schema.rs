use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::CellValue;
use crate::{Dialect, PlanError, PlanResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Int,
    Long,
    Double,
    Boolean,
    Varchar(u32),
}

impl ColumnKind {
    pub fn is_integer(self) -> bool {
        matches!(self, ColumnKind::Int | ColumnKind::Long)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<CellValue>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            not_null: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Long)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Double)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub fn varchar(name: impl Into<String>, length: u32) -> Self {
        Self::new(name, ColumnKind::Varchar(length))
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Primary keys are implicitly not null.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<CellValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// Abstract table shape rendered into each dialect by [`crate::builder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyRef {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        });
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|column| column.primary_key).collect()
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.auto_increment)
    }

    /// Tables this one must be populated after.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.foreign_keys
            .iter()
            .map(|fk| fk.references_table.as_str())
            .filter(|table| *table != self.name && seen.insert(*table))
            .collect()
    }

    pub fn validate(&self) -> PlanResult<()> {
        if self.name.is_empty() {
            return Err(PlanError::invalid("table name is empty"));
        }
        if self.columns.is_empty() {
            return Err(PlanError::invalid(format!(
                "table {} has no columns",
                self.name
            )));
        }
        let mut names = HashSet::new();
        for column in &self.columns {
            if !names.insert(column.name.as_str()) {
                return Err(PlanError::invalid(format!(
                    "table {} declares column {} twice",
                    self.name, column.name
                )));
            }
            if column.auto_increment && !(column.primary_key && column.kind.is_integer()) {
                return Err(PlanError::invalid(format!(
                    "{}.{}: auto increment requires an integer primary key",
                    self.name, column.name
                )));
            }
            if let ColumnKind::Varchar(0) = column.kind {
                return Err(PlanError::invalid(format!(
                    "{}.{}: varchar length must be positive",
                    self.name, column.name
                )));
            }
        }
        if self.columns.iter().filter(|c| c.auto_increment).count() > 1 {
            return Err(PlanError::invalid(format!(
                "table {} has more than one auto increment column",
                self.name
            )));
        }
        for fk in &self.foreign_keys {
            if self.find_column(&fk.column).is_none() {
                return Err(PlanError::invalid(format!(
                    "{}: foreign key column {} is not declared",
                    self.name, fk.column
                )));
            }
        }
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` text for `dialect`.
    pub fn create_statement(&self, dialect: Dialect) -> PlanResult<String> {
        crate::builder::create_table_sql(self, dialect)
    }
}

/// Orders tables so every table follows the tables its foreign keys reference.
///
/// Declaration order is kept among independent tables.
pub fn dependency_order(tables: &[TableDescriptor]) -> PlanResult<Vec<&TableDescriptor>> {
    let mut ordered: Vec<&TableDescriptor> = Vec::with_capacity(tables.len());
    let mut placed: HashSet<&str> = HashSet::new();
    let known: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    while ordered.len() < tables.len() {
        let before = ordered.len();
        for table in tables {
            if placed.contains(table.name.as_str()) {
                continue;
            }
            let ready = table
                .dependencies()
                .iter()
                .all(|dep| placed.contains(dep) || !known.contains(dep));
            if ready {
                placed.insert(table.name.as_str());
                ordered.push(table);
            }
        }
        if ordered.len() == before {
            return Err(PlanError::invalid("foreign keys form a cycle"));
        }
    }
    Ok(ordered)
}
