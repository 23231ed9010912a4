use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        services::JwtKeys,
    },
    error::{model_rejection, store_rejection},
    models::{
        serialize::{self, Origin},
        User,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, (StatusCode, String)> {
    let user_id = user.id().ok_or_else(|| {
        error!(username = %user.username(), "issuing tokens for unsaved user");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    })?;
    let keys = JwtKeys::from_ref(state);
    let sign = |r: anyhow::Result<String>| {
        r.map_err(|e| {
            error!(error = %e, user_id, "jwt sign failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        })
    };
    Ok(AuthResponse {
        access_token: sign(keys.sign_access(user_id))?,
        refresh_token: sign(keys.sign_refresh(user_id))?,
        user: serialize::user(user, Origin::Root),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let mut user = User::new(payload.username.as_deref().unwrap_or_default())?;
    user.set_image_url(payload.image_url);
    user.set_bio(payload.bio);

    let Some(password) = payload.password.filter(|p| !p.is_empty()) else {
        warn!(username = %user.username(), "register without password");
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "Password must be present.".into()));
    };
    user.set_password_hash(&password).map_err(model_rejection)?;

    let user = state.store.insert_user(&user).await.map_err(|e| {
        warn!(error = %e, "insert user failed");
        store_rejection(e)
    })?;

    info!(user_id = ?user.id(), username = %user.username(), "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = match state.store.find_user_by_username(&payload.username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(username = %payload.username, "login unknown username");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => return Err(store_rejection(e)),
    };

    if !user.authenticate(&payload.password) {
        warn!(user_id = ?user.id(), "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    info!(user_id = ?user.id(), "user logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    let user = state
        .store
        .find_user(claims.sub)
        .await
        .map_err(store_rejection)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(issue_tokens(&state, &user)?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::{app::build_app, state::AppState, test_support::call};

    #[tokio::test]
    async fn register_returns_tokens_and_public_user() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({"username": "chef1", "password": "hunter2"}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["user"],
            json!({"id": 1, "username": "chef1", "image_url": null, "bio": null, "recipes": []})
        );
        assert!(body["access_token"].is_string());
        assert!(!body.to_string().contains("$argon2"));
    }

    #[tokio::test]
    async fn register_rejects_blank_username_and_duplicates() {
        let app = build_app(AppState::fake());
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({"username": "  ", "password": "pw"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let first = json!({"username": "chef1", "password": "pw"});
        let (status, _) = call(&app, Method::POST, "/api/v1/auth/register", None, first.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(&app, Method::POST, "/api/v1/auth/register", None, first).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_requires_password() {
        let app = build_app(AppState::fake());
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({"username": "chef1"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn login_and_check_session() {
        let app = build_app(AppState::fake());
        call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({"username": "chef1", "password": "hunter2", "bio": "soups"}),
        )
        .await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({"username": "chef1", "password": "wrong"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({"username": "chef1", "password": "hunter2"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, me) = call(&app, Method::GET, "/api/v1/me", Some(&token), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "chef1");
        assert_eq!(me["bio"], "soups");

        let (status, _) = call(&app, Method::GET, "/api/v1/me", None, Value::Null).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_and_refuses_access_tokens() {
        let app = build_app(AppState::fake());
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({"username": "chef1", "password": "hunter2"}),
        )
        .await;
        let refresh = body["refresh_token"].as_str().unwrap();
        let access = body["access_token"].as_str().unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            json!({"refresh_token": refresh}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "chef1");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            json!({"refresh_token": access}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // A refresh token is not accepted where an access token is required.
        let (status, _) = call(&app, Method::GET, "/api/v1/me", Some(refresh), Value::Null).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
