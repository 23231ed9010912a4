use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{saved_id, Store};
use crate::error::StoreError;
use crate::models::{Recipe, User};

/// In-process store with the same contract as the Postgres one.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    recipes: BTreeMap<i64, Recipe>,
    last_user_id: i64,
    last_recipe_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username() == username && u.id() != except)
    }

    fn with_recipes(&self, user: &User) -> User {
        let mut user = user.clone();
        let owned: Vec<Recipe> = self
            .recipes
            .values()
            .filter(|r| r.user_id().is_some() && r.user_id() == user.id())
            .cloned()
            .collect();
        for recipe in owned {
            user.add_recipe(recipe);
        }
        user
    }

    fn check_owner(&self, recipe: &Recipe) -> Result<(), StoreError> {
        match recipe.user_id() {
            Some(owner) if !self.users.contains_key(&owner) => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        let mut t = self.inner.write().await;
        if t.username_taken(user.username(), None) {
            return Err(StoreError::UsernameTaken(user.username().to_string()));
        }
        t.last_user_id += 1;
        let id = t.last_user_id;
        let mut stored = user.clone();
        let attached = stored.take_recipes();
        stored.assign_id(id);
        t.users.insert(id, stored);

        // Recipes attached before the first save are written under the new id.
        for mut recipe in attached {
            recipe.set_owner(Some(id));
            t.last_recipe_id += 1;
            let recipe_id = t.last_recipe_id;
            recipe.assign_id(recipe_id);
            t.recipes.insert(recipe_id, recipe);
        }
        debug!(user_id = id, "user inserted");
        Ok(t.with_recipes(&t.users[&id]))
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let t = self.inner.read().await;
        Ok(t.users.get(&id).map(|u| t.with_recipes(u)))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.inner.read().await;
        Ok(t
            .users
            .values()
            .find(|u| u.username() == username)
            .map(|u| t.with_recipes(u)))
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let id = saved_id(user.id())?;
        let mut t = self.inner.write().await;
        if !t.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if t.username_taken(user.username(), Some(id)) {
            return Err(StoreError::UsernameTaken(user.username().to_string()));
        }
        // Only the user's own columns; recipes are saved through their own methods.
        let mut stored = user.clone();
        stored.take_recipes();
        t.users.insert(id, stored);
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.inner.write().await;
        t.users.remove(&id).ok_or(StoreError::NotFound)?;
        for recipe in t.recipes.values_mut() {
            if recipe.user_id() == Some(id) {
                recipe.set_owner(None);
            }
        }
        debug!(user_id = id, "user deleted, recipes orphaned");
        Ok(())
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> Result<Recipe, StoreError> {
        let mut t = self.inner.write().await;
        t.check_owner(recipe)?;
        t.last_recipe_id += 1;
        let id = t.last_recipe_id;
        let mut stored = recipe.clone();
        stored.assign_id(id);
        t.recipes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError> {
        Ok(self.inner.read().await.recipes.get(&id).cloned())
    }

    async fn list_recipes(&self, limit: i64, offset: i64) -> Result<Vec<Recipe>, StoreError> {
        let t = self.inner.read().await;
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(t.recipes.values().skip(skip).take(take).cloned().collect())
    }

    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), StoreError> {
        let id = saved_id(recipe.id())?;
        let mut t = self.inner.write().await;
        t.check_owner(recipe)?;
        let slot = t.recipes.get_mut(&id).ok_or(StoreError::NotFound)?;
        *slot = recipe.clone();
        Ok(())
    }

    async fn delete_recipe(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.inner.write().await;
        t.recipes.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soup() -> Recipe {
        Recipe::new("Soup", &"x".repeat(50), 20).unwrap()
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let store = MemoryStore::new();
        let a = store.insert_user(&User::new("a").unwrap()).await.unwrap();
        let b = store.insert_user(&User::new("b").unwrap()).await.unwrap();
        assert_eq!(a.id(), Some(1));
        assert_eq!(b.id(), Some(2));
    }

    #[tokio::test]
    async fn recipes_attached_before_insert_are_saved() {
        let store = MemoryStore::new();
        store.insert_recipe(&soup()).await.unwrap();

        let mut user = User::new("chef1").unwrap();
        user.add_recipe(soup());
        let saved = store.insert_user(&user).await.unwrap();
        assert_eq!(saved.recipes().len(), 1);
        assert_eq!(saved.recipes()[0].id(), Some(2));
        assert_eq!(saved.recipes()[0].user_id(), saved.id());

        let reloaded = store.find_user(saved.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(reloaded.recipes().len(), 1);
        assert_eq!(reloaded.recipes()[0].title(), "Soup");
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryStore::new();
        store.insert_user(&User::new("chef1").unwrap()).await.unwrap();
        let err = store
            .insert_user(&User::new("chef1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(name) if name == "chef1"));
    }

    #[tokio::test]
    async fn rename_onto_existing_username_is_rejected() {
        let store = MemoryStore::new();
        store.insert_user(&User::new("chef1").unwrap()).await.unwrap();
        let mut other = store.insert_user(&User::new("chef2").unwrap()).await.unwrap();
        other.set_username("chef1").unwrap();
        assert!(matches!(
            store.update_user(&other).await,
            Err(StoreError::UsernameTaken(_))
        ));
        // Saving under its own name is fine.
        other.set_username("chef2").unwrap();
        store.update_user(&other).await.unwrap();
    }

    #[tokio::test]
    async fn find_user_loads_owned_recipes() {
        let store = MemoryStore::new();
        let user = store.insert_user(&User::new("chef1").unwrap()).await.unwrap();
        let mut recipe = soup();
        recipe.set_owner(user.id());
        store.insert_recipe(&recipe).await.unwrap();
        store.insert_recipe(&soup()).await.unwrap();

        let loaded = store.find_user(1).await.unwrap().unwrap();
        assert_eq!(loaded.recipes().len(), 1);
        let by_name = store.find_user_by_username("chef1").await.unwrap().unwrap();
        assert_eq!(by_name.recipes().len(), 1);
    }

    #[tokio::test]
    async fn deleting_user_orphans_recipes() {
        let store = MemoryStore::new();
        let user = store.insert_user(&User::new("chef1").unwrap()).await.unwrap();
        let mut recipe = soup();
        recipe.set_owner(user.id());
        let recipe = store.insert_recipe(&recipe).await.unwrap();

        store.delete_user(1).await.unwrap();
        let orphan = store.find_recipe(recipe.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(orphan.user_id(), None);
        assert!(matches!(store.delete_user(1).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn recipe_with_unknown_owner_is_rejected() {
        let store = MemoryStore::new();
        let mut recipe = soup();
        recipe.set_owner(Some(42));
        assert!(matches!(
            store.insert_recipe(&recipe).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_pages_by_id() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store.insert_recipe(&soup()).await.unwrap();
        }
        let page = store.list_recipes(2, 1).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![Some(2), Some(3)]);
        assert!(store.list_recipes(-1, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_missing_recipe() {
        let store = MemoryStore::new();
        let mut stored = store.insert_recipe(&soup()).await.unwrap();
        stored.set_minutes_to_complete(45);
        store.update_recipe(&stored).await.unwrap();
        assert_eq!(
            store.find_recipe(1).await.unwrap().unwrap().minutes_to_complete(),
            45
        );

        store.delete_recipe(1).await.unwrap();
        assert!(matches!(store.delete_recipe(1).await, Err(StoreError::NotFound)));
        assert!(matches!(store.update_recipe(&stored).await, Err(StoreError::NotFound)));
        assert!(matches!(store.update_recipe(&soup()).await, Err(StoreError::NotFound)));
    }
}
