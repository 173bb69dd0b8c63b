use axum::{extract::State, routing::get, Json, Router};
use tracing::{debug, instrument};

use crate::{
    analytics::{summarize, Summary},
    auth::{extractors::AuthUser, repo_types::Role},
    error::AppResult,
    policy::{self, Action},
    state::AppState,
};

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/analytics", get(get_analytics))
}

/// Farmers get figures over their own reports only; user counts are left out for them.
#[instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Summary>> {
    policy::require(&principal, Action::ViewAnalytics, None)?;
    let reports = state.reports.list(policy::report_scope(&principal)).await?;
    let users = match principal.role {
        Role::Farmer => None,
        Role::Ngo | Role::Admin => Some(state.users.list().await?),
    };
    debug!(reports = reports.len(), "analytics snapshot loaded");
    Ok(Json(summarize(&reports, users.as_deref())))
}
