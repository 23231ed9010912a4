use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use super::dto::UpdateProfileRequest;
use crate::{
    auth::extractors::AuthUser,
    error::store_rejection,
    models::{
        serialize::{self, Origin},
        User,
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/users/:id", get(get_user))
}

async fn load_caller(state: &AppState, user_id: i64) -> Result<User, (StatusCode, String)> {
    state
        .store
        .find_user(user_id)
        .await
        .map_err(store_rejection)?
        .ok_or_else(|| {
            error!(user_id, "user not found");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })
}

/// Session check: who does this access token belong to.
#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Map<String, Value>>, (StatusCode, String)> {
    let user = load_caller(&state, user_id).await?;
    Ok(Json(serialize::user(&user, Origin::Root)))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Map<String, Value>>, (StatusCode, String)> {
    let mut user = load_caller(&state, user_id).await?;
    if let Some(username) = payload.username.as_deref() {
        user.set_username(username)?;
    }
    if let Some(image_url) = payload.image_url {
        user.set_image_url(image_url);
    }
    if let Some(bio) = payload.bio {
        user.set_bio(bio);
    }

    state.store.update_user(&user).await.map_err(store_rejection)?;
    info!(user_id, "profile updated");
    Ok(Json(serialize::user(&user, Origin::Root)))
}

/// Removes the caller's account. Their recipes stay, without an owner.
#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    state.store.delete_user(user_id).await.map_err(store_rejection)?;
    info!(user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Map<String, Value>>, (StatusCode, String)> {
    let user = state
        .store
        .find_user(id)
        .await
        .map_err(store_rejection)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;
    Ok(Json(serialize::user(&user, Origin::Root)))
}
