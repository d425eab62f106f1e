use thiserror::Error;

use crate::lifecycle::DatabaseState;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("config error: {message}")]
    Config { message: String },
    #[error("failed to open database at {target}: {message}")]
    FatalInit { target: String, message: String },
    #[error("patch '{patch}' failed: {message}")]
    PatchFailed { patch: String, message: String },
    #[error("database is not open (state: {state})")]
    NotOpen { state: DatabaseState },
    #[error("transaction '{label}' rolled back: {message}")]
    Transaction { label: String, message: String },
    #[error("transaction '{label}' discarded during shutdown")]
    Discarded { label: String },
}

impl PlanError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn fatal_init(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FatalInit {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn patch_failed(patch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PatchFailed {
            patch: patch.into(),
            message: message.into(),
        }
    }

    pub fn not_open(state: DatabaseState) -> Self {
        Self::NotOpen { state }
    }

    pub fn transaction(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transaction {
            label: label.into(),
            message: message.into(),
        }
    }

    pub fn discarded(label: impl Into<String>) -> Self {
        Self::Discarded {
            label: label.into(),
        }
    }

    /// Errors after which the owning plugin must refuse to finish enabling.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInit { .. } | Self::PatchFailed { .. })
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

impl From<sea_orm::DbErr> for PlanError {
    fn from(value: sea_orm::DbErr) -> Self {
        PlanError::storage(value.to_string())
    }
}
