use sea_orm::Value as SeaValue;
use serde::{Deserialize, Serialize};

use crate::schema::ColumnKind;
use crate::{PlanError, PlanResult};

/// A dialect-independent cell, compared by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Converts into a bind value typed for `kind`, so NULLs carry the column's type.
    pub fn to_value(&self, kind: ColumnKind) -> PlanResult<SeaValue> {
        let value = match (kind, self) {
            (ColumnKind::Int, CellValue::Null) => SeaValue::from(None::<i32>),
            (ColumnKind::Long, CellValue::Null) => SeaValue::from(None::<i64>),
            (ColumnKind::Double, CellValue::Null) => SeaValue::from(None::<f64>),
            (ColumnKind::Boolean, CellValue::Null) => SeaValue::from(None::<bool>),
            (ColumnKind::Varchar(_), CellValue::Null) => SeaValue::from(None::<String>),
            (ColumnKind::Int, CellValue::Int(v)) => SeaValue::from(*v),
            (ColumnKind::Int, CellValue::Long(v)) => {
                let narrowed = i32::try_from(*v)
                    .map_err(|_| PlanError::invalid(format!("{v} does not fit an int column")))?;
                SeaValue::from(narrowed)
            }
            (ColumnKind::Long, CellValue::Long(v)) => SeaValue::from(*v),
            (ColumnKind::Long, CellValue::Int(v)) => SeaValue::from(i64::from(*v)),
            (ColumnKind::Double, CellValue::Double(v)) => SeaValue::from(*v),
            (ColumnKind::Double, CellValue::Int(v)) => SeaValue::from(f64::from(*v)),
            (ColumnKind::Boolean, CellValue::Bool(v)) => SeaValue::from(*v),
            (ColumnKind::Varchar(_), CellValue::Text(v)) => SeaValue::from(v.clone()),
            (kind, value) => {
                return Err(PlanError::invalid(format!(
                    "cannot bind {value:?} to a {kind:?} column"
                )));
            }
        };
        Ok(value)
    }

    /// Stable byte encoding used for copy digests.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            CellValue::Null => out.push(0),
            CellValue::Int(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_le_bytes());
            }
            CellValue::Long(v) => {
                out.push(2);
                out.extend_from_slice(&v.to_le_bytes());
            }
            CellValue::Double(v) => {
                out.push(3);
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            CellValue::Bool(v) => {
                out.push(4);
                out.push(u8::from(*v));
            }
            CellValue::Text(v) => {
                out.push(5);
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                out.extend_from_slice(v.as_bytes());
            }
        }
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Long(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Double(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}
