use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{UserInput, UserPayload, UserResponse},
        password::CredentialHasher,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, HeaderMap, Json<UserResponse>), ApiError> {
    let UserInput {
        name,
        email,
        password,
    } = UserPayload::parse(&body)?.validate()?;

    let hash = hash_optional(&state.hasher, password).await?;
    let user = state.users.create(&name, &email, hash.as_deref()).await?;
    info!(user_id = %user.id, "user created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/users/{}", user.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.users.get(id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users.list().await?;
    info!(count = users.len(), "users retrieved");
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<UserResponse>, ApiError> {
    let UserInput {
        name,
        email,
        password,
    } = UserPayload::parse(&body)?.validate()?;
    let id = parse_id(&id)?;

    let hash = hash_optional(&state.hasher, password).await?;
    let user = state.users.update(id, &name, &email, hash.as_deref()).await?;
    info!(user_id = %user.id, "user updated");
    Ok(Json(user.into()))
}

// Ids that are not UUIDs cannot exist in the store.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("User not found".into()))
}

async fn hash_optional(
    hasher: &CredentialHasher,
    password: Option<String>,
) -> Result<Option<String>, ApiError> {
    match password {
        Some(plain) => hasher.hash_blocking(plain).await.map(Some).map_err(|e| {
            error!(error = %e, "password hashing failed");
            ApiError::Hashing
        }),
        None => Ok(None),
    }
}
