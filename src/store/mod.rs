//! Persistence for users and recipes.
//!
//! The store owns id assignment, username uniqueness and the owner foreign key.
//! Deleting a user orphans its recipes (owner becomes null) rather than
//! deleting them.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Recipe, User};

#[async_trait]
pub trait Store: Send + Sync {
    /// Persists a new user, plus any recipes already attached to it, and returns
    /// it with ids assigned.
    async fn insert_user(&self, user: &User) -> Result<User, StoreError>;
    /// Loads a user together with the recipes it owns.
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    async fn insert_recipe(&self, recipe: &Recipe) -> Result<Recipe, StoreError>;
    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError>;
    async fn list_recipes(&self, limit: i64, offset: i64) -> Result<Vec<Recipe>, StoreError>;
    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), StoreError>;
    async fn delete_recipe(&self, id: i64) -> Result<(), StoreError>;
}

/// Id of a record that has been through the store.
pub(crate) fn saved_id(id: Option<i64>) -> Result<i64, StoreError> {
    id.ok_or(StoreError::NotFound)
}
