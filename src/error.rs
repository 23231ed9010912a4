use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Rejection raised when a field fails its assignment-time rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be present.")]
    Missing(&'static str),
    #[error("{field} must be at least {min} characters long.")]
    TooShort { field: &'static str, min: usize },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Reading the stored credential is a programming error.
    #[error("Password hashes are not viewable.")]
    AccessViolation,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ModelError {
    pub fn status(&self) -> StatusCode {
        match self {
            ModelError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ModelError::AccessViolation | ModelError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl StoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::UsernameTaken(_) => StatusCode::CONFLICT,
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Handler-side mapping for model failures. Internal errors are logged and masked.
pub fn model_rejection(e: ModelError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "model error");
        return (status, "Internal server error".into());
    }
    (status, e.to_string())
}

pub fn store_rejection(e: StoreError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "store error");
        return (status, "Internal server error".into());
    }
    (status, e.to_string())
}

impl From<ValidationError> for (StatusCode, String) {
    fn from(e: ValidationError) -> Self {
        model_rejection(ModelError::Validation(e))
    }
}
