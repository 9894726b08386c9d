//! User lookup and email update endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::UserId;
use domain::User;
use saga::UserService;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// GET /user/{userId}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let user = state.orchestrator.users().get_user(user_id).await?;
    Ok(Json(UserResponse { user }))
}

/// PUT /user/{userId}
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let Json(body) = body?;
    let user = state
        .orchestrator
        .users()
        .update_user(user_id, body.email)
        .await?;
    tracing::info!(%user_id, "email updated");
    Ok(Json(UserResponse { user }))
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user id: {raw}")))
}
