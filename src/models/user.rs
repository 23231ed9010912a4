use std::fmt;

use sqlx::FromRow;
use tracing::warn;

use super::{require_present, Recipe};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ModelError, ValidationError};

/// Account record. Owns zero or more recipes.
#[derive(Clone, FromRow)]
pub struct User {
    id: Option<i64>,
    username: String,
    password_hash: Option<String>, // Argon2 PHC string, never read back out
    image_url: Option<String>,
    bio: Option<String>,
    #[sqlx(skip)]
    recipes: Vec<Recipe>,
}

/// Username must be present and not blank. Returns the value as given.
pub fn validate_username(username: Option<&str>) -> Result<&str, ValidationError> {
    require_present(username, "Username")
}

impl User {
    pub fn new(username: &str) -> Result<Self, ValidationError> {
        let username = validate_username(Some(username))?;
        Ok(Self {
            id: None,
            username: username.to_string(),
            password_hash: None,
            image_url: None,
            bio: None,
            recipes: Vec::new(),
        })
    }

    /// `None` until the store has assigned an identifier.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn set_username(&mut self, username: &str) -> Result<(), ValidationError> {
        self.username = validate_username(Some(username))?.to_string();
        Ok(())
    }

    pub fn set_image_url(&mut self, image_url: Option<String>) {
        self.image_url = image_url;
    }

    pub fn set_bio(&mut self, bio: Option<String>) {
        self.bio = bio;
    }

    /// Hashes `plain` with a fresh salt and replaces any stored hash.
    pub fn set_password_hash(&mut self, plain: &str) -> Result<(), ModelError> {
        self.password_hash = Some(hash_password(plain)?);
        Ok(())
    }

    /// Always fails: the credential is write-only.
    #[allow(dead_code)] // nothing in the service reads it; the contract is the error
    pub fn password_hash(&self) -> Result<&str, ModelError> {
        Err(ModelError::AccessViolation)
    }

    /// Checks `plain` against the stored hash. No hash means no match.
    pub fn authenticate(&self, plain: &str) -> bool {
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };
        verify_password(plain, hash).unwrap_or_else(|e| {
            warn!(error = %e, username = %self.username, "stored password hash is unreadable");
            false
        })
    }

    /// Takes ownership of `recipe`, pointing its owner at this user.
    pub fn add_recipe(&mut self, mut recipe: Recipe) {
        recipe.set_owner(self.id);
        self.recipes.push(recipe);
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
        for recipe in &mut self.recipes {
            recipe.set_owner(Some(id));
        }
    }

    pub(crate) fn stored_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Detaches the loaded recipes so the store can write them separately.
    pub(crate) fn take_recipes(&mut self) -> Vec<Recipe> {
        std::mem::take(&mut self.recipes)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("image_url", &self.image_url)
            .field("bio", &self.bio)
            .field("recipes", &self.recipes)
            .finish()
    }
}
