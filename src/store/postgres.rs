use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info, warn};

use super::{saved_id, Store};
use crate::error::StoreError;
use crate::models::{Recipe, User};

const USER_COLUMNS: &str = "id, username, password_hash, image_url, bio";
const RECIPE_COLUMNS: &str = "id, title, instructions, minutes_to_complete, user_id";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            warn!(error = %e, "migration failed; continuing");
        } else {
            info!("migrations applied");
        }
        Ok(Self { db })
    }

    async fn recipes_of(&self, user_id: i64) -> Result<Vec<Recipe>, StoreError> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn load_recipes(&self, user: Option<User>) -> Result<Option<User>, StoreError> {
        let Some(mut user) = user else {
            return Ok(None);
        };
        let id = saved_id(user.id())?;
        for recipe in self.recipes_of(id).await? {
            user.add_recipe(recipe);
        }
        Ok(Some(user))
    }
}

/// Translates constraint failures into the store's own error kinds.
fn classify(e: sqlx::Error, username: Option<&str>) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if let Some(name) = username {
                return StoreError::UsernameTaken(name.to_string());
            }
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }
    StoreError::Database(e)
}

fn expect_one(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> Result<User, StoreError> {
        let mut pending = user.clone();
        let attached = pending.take_recipes();

        let mut tx = self.db.begin().await?;
        let mut stored = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, image_url, bio)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(pending.username())
        .bind(pending.stored_hash())
        .bind(pending.image_url())
        .bind(pending.bio())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, Some(user.username())))?;
        let user_id = saved_id(stored.id())?;

        // Recipes attached before the first save are written under the new id.
        for recipe in &attached {
            let saved = sqlx::query_as::<_, Recipe>(&format!(
                r#"
                INSERT INTO recipes (title, instructions, minutes_to_complete, user_id)
                VALUES ($1, $2, $3, $4)
                RETURNING {RECIPE_COLUMNS}
                "#
            ))
            .bind(recipe.title())
            .bind(recipe.instructions())
            .bind(recipe.minutes_to_complete())
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, None))?;
            stored.add_recipe(saved);
        }
        tx.commit().await?;

        debug!(user_id, recipes = attached.len(), "user inserted");
        Ok(stored)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        self.load_recipes(user).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        self.load_recipes(user).await
    }

    /// Writes the user's own columns only; recipes have their own methods.
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let id = saved_id(user.id())?;
        let res = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, image_url = $4, bio = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(user.username())
        .bind(user.stored_hash())
        .bind(user.image_url())
        .bind(user.bio())
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, Some(user.username())))?;
        expect_one(res.rows_affected())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        // recipes.user_id is ON DELETE SET NULL
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        expect_one(res.rows_affected())
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> Result<Recipe, StoreError> {
        let stored = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (title, instructions, minutes_to_complete, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(recipe.title())
        .bind(recipe.instructions())
        .bind(recipe.minutes_to_complete())
        .bind(recipe.user_id())
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, None))?;
        Ok(stored)
    }

    async fn find_recipe(&self, id: i64) -> Result<Option<Recipe>, StoreError> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn list_recipes(&self, limit: i64, offset: i64) -> Result<Vec<Recipe>, StoreError> {
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update_recipe(&self, recipe: &Recipe) -> Result<(), StoreError> {
        let id = saved_id(recipe.id())?;
        let res = sqlx::query(
            r#"
            UPDATE recipes
            SET title = $2, instructions = $3, minutes_to_complete = $4, user_id = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(recipe.title())
        .bind(recipe.instructions())
        .bind(recipe.minutes_to_complete())
        .bind(recipe.user_id())
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, None))?;
        expect_one(res.rows_affected())
    }

    async fn delete_recipe(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        expect_one(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_pass_through() {
        let err = classify(sqlx::Error::RowNotFound, Some("chef1"));
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn zero_rows_affected_is_not_found() {
        assert!(matches!(expect_one(0), Err(StoreError::NotFound)));
        assert!(expect_one(1).is_ok());
    }
}
