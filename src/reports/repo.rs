use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::bounded,
    error::{AppError, AppResult},
    policy::ReportScope,
    reports::repo_types::{DroughtReport, NewReport, ReportPatch, ReportRow},
};

const REPORT_COLUMNS: &str = "id, submitter_id, location, severity, description, contact_name, \
                              phone, email, created_at, updated_at";

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create(&self, new: NewReport) -> AppResult<DroughtReport>;
    /// Newest first.
    async fn list(&self, scope: ReportScope) -> AppResult<Vec<DroughtReport>>;
    async fn get(&self, id: Uuid) -> AppResult<DroughtReport>;
    /// Applies the whole patch in one step; `NotFound` if the report is gone.
    async fn update(&self, id: Uuid, patch: ReportPatch) -> AppResult<DroughtReport>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct PgReportStore {
    db: PgPool,
    timeout: Duration,
}

impl PgReportStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn create(&self, new: NewReport) -> AppResult<DroughtReport> {
        let now = OffsetDateTime::now_utc();
        let query = format!(
            "INSERT INTO drought_reports
                 (id, submitter_id, location, severity, description, contact_name, phone, email,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {REPORT_COLUMNS}"
        );
        let row = bounded(
            self.timeout,
            "reports.create",
            sqlx::query_as::<_, ReportRow>(&query)
                .bind(Uuid::new_v4())
                .bind(new.submitter_id)
                .bind(&new.location)
                .bind(new.severity.as_str())
                .bind(&new.description)
                .bind(&new.contact_name)
                .bind(&new.phone)
                .bind(&new.email)
                .bind(now)
                .fetch_one(&self.db),
        )
        .await?;
        Ok(DroughtReport::try_from(row)?)
    }

    async fn list(&self, scope: ReportScope) -> AppResult<Vec<DroughtReport>> {
        let owner = match scope {
            ReportScope::All => None,
            ReportScope::OwnedBy(id) => Some(id),
        };
        let query = format!(
            "SELECT {REPORT_COLUMNS}
               FROM drought_reports
              WHERE ($1::uuid IS NULL OR submitter_id = $1)
              ORDER BY created_at DESC, id"
        );
        let rows = bounded(
            self.timeout,
            "reports.list",
            sqlx::query_as::<_, ReportRow>(&query)
                .bind(owner)
                .fetch_all(&self.db),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(DroughtReport::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn get(&self, id: Uuid) -> AppResult<DroughtReport> {
        let query = format!("SELECT {REPORT_COLUMNS} FROM drought_reports WHERE id = $1");
        let row = bounded(
            self.timeout,
            "reports.get",
            sqlx::query_as::<_, ReportRow>(&query).bind(id).fetch_optional(&self.db),
        )
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(DroughtReport::try_from(row)?)
    }

    async fn update(&self, id: Uuid, patch: ReportPatch) -> AppResult<DroughtReport> {
        // single statement: the row lock serializes concurrent writers
        let query = format!(
            "UPDATE drought_reports
                SET location     = COALESCE($2, location),
                    severity     = COALESCE($3, severity),
                    description  = COALESCE($4, description),
                    contact_name = COALESCE($5, contact_name),
                    phone        = COALESCE($6, phone),
                    email        = COALESCE($7, email),
                    updated_at   = $8
              WHERE id = $1
             RETURNING {REPORT_COLUMNS}"
        );
        let row = bounded(
            self.timeout,
            "reports.update",
            sqlx::query_as::<_, ReportRow>(&query)
                .bind(id)
                .bind(&patch.location)
                .bind(patch.severity.map(|s| s.as_str()))
                .bind(&patch.description)
                .bind(&patch.contact_name)
                .bind(&patch.phone)
                .bind(&patch.email)
                .bind(OffsetDateTime::now_utc())
                .fetch_optional(&self.db),
        )
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(DroughtReport::try_from(row)?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let res = bounded(
            self.timeout,
            "reports.delete",
            sqlx::query("DELETE FROM drought_reports WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
