use thiserror::Error;

use crate::types::Status;

#[derive(Error, Debug)]
pub enum CivicError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("Similarity scorer unavailable: {0}")]
    ScorerUnavailable(String),

    #[error("Store conflict: {0}")]
    StoreConflict(String),

    #[error("Complaint not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
