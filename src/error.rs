//! Error taxonomy shared by the tracker, the batch manager and persistence.
use crate::model::UrlStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TakedownError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: UrlStatus, to: UrlStatus },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl TakedownError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        TakedownError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Caller-correctable errors, as opposed to storage failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TakedownError::Persistence(_) | TakedownError::Migration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TakedownError>;
