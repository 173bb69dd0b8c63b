use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    policy::{self, Action, Decision},
    reports::{
        dto::{CreateReportRequest, DeletedResponse, ReportResponse, UpdateReportRequest},
        repo_types::DroughtReport,
        services,
    },
    state::AppState,
};

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/drought-reports", get(list_reports).post(create_report))
        .route(
            "/drought-reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
}

async fn submitter_name(state: &AppState, report: &DroughtReport) -> AppResult<Option<String>> {
    Ok(state
        .users
        .find_by_id(report.submitter_id)
        .await?
        .map(|u| u.name))
}

#[instrument(skip(state))]
pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<Vec<ReportResponse>>> {
    policy::require(&principal, Action::ListReports, None)?;
    let reports = state.reports.list(policy::report_scope(&principal)).await?;

    let names: HashMap<Uuid, String> = state
        .users
        .list()
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let items = reports
        .into_iter()
        .map(|r| {
            let name = names.get(&r.submitter_id).cloned();
            ReportResponse::new(r, name)
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReportResponse>> {
    let report = state.reports.get(id).await?;
    // someone else's report is indistinguishable from a missing one
    if policy::authorize(&principal, Action::ReadReport, Some(report.submitter_id))
        == Decision::Deny
    {
        return Err(AppError::NotFound);
    }
    let name = submitter_name(&state, &report).await?;
    Ok(Json(ReportResponse::new(report, name)))
}

#[instrument(skip(state, payload))]
pub async fn create_report(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<ReportResponse>)> {
    policy::require(&principal, Action::CreateReport, None)?;
    let new = services::new_report(&principal, payload)?;
    let report = state.reports.create(new).await?;
    info!(report_id = %report.id, submitter_id = %report.submitter_id, severity = %report.severity, "report submitted");

    let name = submitter_name(&state, &report).await?;
    Ok((StatusCode::CREATED, Json(ReportResponse::new(report, name))))
}

#[instrument(skip(state, payload))]
pub async fn update_report(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> AppResult<Json<ReportResponse>> {
    policy::require(&principal, Action::UpdateReport, None)?;
    let patch = services::report_patch(payload)?;
    let report = state.reports.update(id, patch).await?;
    info!(report_id = %id, by = %principal.id, "report updated");

    let name = submitter_name(&state, &report).await?;
    Ok(Json(ReportResponse::new(report, name)))
}

#[instrument(skip(state))]
pub async fn delete_report(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedResponse>> {
    policy::require(&principal, Action::DeleteReport, None)?;
    state.reports.delete(id).await?;
    info!(report_id = %id, by = %principal.id, "report deleted");
    Ok(Json(DeletedResponse { deleted: true }))
}
