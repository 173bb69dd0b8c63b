use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, extractors::AuthUser},
    error::AppResult,
    policy::{self, Action},
    reports::dto::DeletedResponse,
    state::AppState,
    users::{dto::UpdateUserRequest, services},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    policy::require(&principal, Action::ListUsers, None)?;
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    policy::require(&principal, Action::UpdateUser, Some(id))?;
    let patch = services::user_patch(payload)?;
    let user = state.users.update(id, patch).await?;
    info!(user_id = %id, by = %principal.id, role = %user.role(), "user updated");
    Ok(Json(user.into()))
}

/// Removes the account and every report it submitted.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    policy::require(&principal, Action::DeleteUser, Some(id))?;
    state.users.delete(id).await?;
    info!(user_id = %id, by = %principal.id, "user deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}
