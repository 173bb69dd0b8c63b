use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Drought impact, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Extreme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match only; anything else is rejected rather than coerced.
impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                format!("invalid severity '{s}'; expected one of Mild, Moderate, Severe, Extreme")
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroughtReport {
    pub id: Uuid,
    pub submitter_id: Uuid,
    pub location: String,
    pub severity: Severity,
    pub description: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub submitter_id: Uuid,
    pub location: String,
    pub severity: String,
    pub description: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ReportRow> for DroughtReport {
    type Error = anyhow::Error;

    fn try_from(r: ReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            severity: Severity::from_str(&r.severity).map_err(anyhow::Error::msg)?,
            id: r.id,
            submitter_id: r.submitter_id,
            location: r.location,
            description: r.description,
            contact_name: r.contact_name,
            phone: r.phone,
            email: r.email,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// A validated report ready to be stored.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub submitter_id: Uuid,
    pub location: String,
    pub severity: Severity,
    pub description: String,
    pub contact_name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Fields to replace; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ReportPatch {
    pub location: Option<String>,
    pub severity: Option<Severity>,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ReportPatch {
    pub fn apply(self, report: &mut DroughtReport) {
        if let Some(v) = self.location {
            report.location = v;
        }
        if let Some(v) = self.severity {
            report.severity = v;
        }
        if let Some(v) = self.description {
            report.description = v;
        }
        if let Some(v) = self.contact_name {
            report.contact_name = v;
        }
        if let Some(v) = self.phone {
            report.phone = v;
        }
        if let Some(v) = self.email {
            report.email = Some(v);
        }
    }
}
