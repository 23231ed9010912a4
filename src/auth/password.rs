use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::ModelError;

fn hashing_failed(step: &'static str) -> impl FnOnce(password_hash::Error) -> ModelError {
    move |e| {
        error!(error = %e, step, "argon2 failure");
        ModelError::Hashing(format!("{step}: {e}"))
    }
}

/// Argon2id with default parameters and a random salt, encoded as a PHC string.
pub fn hash_password(plain: &str) -> Result<String, ModelError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(hashing_failed("hash"))
}

/// `Ok(false)` on mismatch. A stored value that is not a PHC string is an error.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, ModelError> {
    let parsed = PasswordHash::new(stored).map_err(hashing_failed("parse stored hash"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hashing_failed("verify")(e)),
    }
}
