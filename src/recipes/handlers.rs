use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::dto::{CreateRecipeRequest, Pagination, UpdateRecipeRequest};
use crate::{
    auth::extractors::AuthUser,
    error::{store_rejection, ValidationError},
    models::{
        serialize::{self, Origin},
        Recipe, User,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route("/recipes/:id", patch(update_recipe).delete(delete_recipe))
}

async fn owner_of(state: &AppState, recipe: &Recipe) -> Result<Option<User>, (StatusCode, String)> {
    match recipe.user_id() {
        Some(id) => state.store.find_user(id).await.map_err(store_rejection),
        None => Ok(None),
    }
}

async fn load_recipe(state: &AppState, id: i64) -> Result<Recipe, (StatusCode, String)> {
    state
        .store
        .find_recipe(id)
        .await
        .map_err(store_rejection)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))
}

/// Only the owning user may change or remove a recipe.
fn ensure_owner(recipe: &Recipe, user_id: i64) -> Result<(), (StatusCode, String)> {
    if recipe.user_id() != Some(user_id) {
        warn!(user_id, recipe_id = ?recipe.id(), "not the recipe owner");
        return Err((StatusCode::FORBIDDEN, "Not the owner of this recipe".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Map<String, Value>>>, (StatusCode, String)> {
    let recipes = state
        .store
        .list_recipes(p.limit, p.offset)
        .await
        .map_err(store_rejection)?;

    let mut owners: HashMap<i64, Option<User>> = HashMap::new();
    let mut items = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        if let Some(id) = recipe.user_id() {
            if !owners.contains_key(&id) {
                let owner = state.store.find_user(id).await.map_err(store_rejection)?;
                owners.insert(id, owner);
            }
        }
        let owner = recipe
            .user_id()
            .and_then(|id| owners.get(&id))
            .and_then(Option::as_ref);
        items.push(serialize::recipe(recipe, owner, Origin::Root));
    }
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Map<String, Value>>, (StatusCode, String)> {
    let recipe = load_recipe(&state, id).await?;
    let owner = owner_of(&state, &recipe).await?;
    Ok(Json(serialize::recipe(&recipe, owner.as_ref(), Origin::Root)))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Map<String, Value>>), (StatusCode, String)> {
    let minutes = payload
        .minutes_to_complete
        .ok_or(ValidationError::Missing("Minutes to complete"))?;
    let mut recipe = Recipe::new(
        payload.title.as_deref().unwrap_or_default(),
        payload.instructions.as_deref().unwrap_or_default(),
        minutes,
    )?;
    recipe.set_owner(Some(user_id));

    let recipe = state.store.insert_recipe(&recipe).await.map_err(store_rejection)?;
    let owner = owner_of(&state, &recipe).await?;

    info!(user_id, recipe_id = ?recipe.id(), "recipe created");
    Ok((
        StatusCode::CREATED,
        Json(serialize::recipe(&recipe, owner.as_ref(), Origin::Root)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<Map<String, Value>>, (StatusCode, String)> {
    let mut recipe = load_recipe(&state, id).await?;
    ensure_owner(&recipe, user_id)?;

    if let Some(title) = payload.title.as_deref() {
        recipe.set_title(title)?;
    }
    if let Some(instructions) = payload.instructions.as_deref() {
        recipe.set_instructions(instructions)?;
    }
    if let Some(minutes) = payload.minutes_to_complete {
        recipe.set_minutes_to_complete(minutes);
    }

    state.store.update_recipe(&recipe).await.map_err(store_rejection)?;
    let owner = owner_of(&state, &recipe).await?;
    info!(user_id, recipe_id = id, "recipe updated");
    Ok(Json(serialize::recipe(&recipe, owner.as_ref(), Origin::Root)))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let recipe = load_recipe(&state, id).await?;
    ensure_owner(&recipe, user_id)?;
    state.store.delete_recipe(id).await.map_err(store_rejection)?;
    info!(user_id, recipe_id = id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}
