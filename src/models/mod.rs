//! Persisted records and the rules that guard them.
//!
//! Every field mutation goes through a validating setter, and the only way a
//! record leaves the process is through [`serialize`].

pub mod recipe;
pub mod serialize;
pub mod user;

pub use recipe::Recipe;
pub use user::User;

use crate::error::ValidationError;

/// Rejects absent or blank values; anything else is returned as given.
fn require_present<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::Missing(field)),
    }
}
