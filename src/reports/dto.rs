use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::reports::repo_types::{DroughtReport, Severity};

/// Request body for submitting a drought report.
///
/// `severity` is kept as text so an unknown value is reported as a validation error
/// rather than a generic body rejection.
#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "contactName")]
    pub contact_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub location: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "contactName")]
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub submitter_id: Uuid,
    /// `None` once the submitting account is gone.
    pub submitter_name: Option<String>,
    pub location: String,
    pub severity: Severity,
    pub description: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ReportResponse {
    pub fn new(report: DroughtReport, submitter_name: Option<String>) -> Self {
        Self {
            id: report.id,
            submitter_id: report.submitter_id,
            submitter_name,
            location: report.location,
            severity: report.severity,
            description: report.description,
            contact_name: report.contact_name,
            phone: report.phone,
            email: report.email,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}
