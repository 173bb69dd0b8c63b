//! Aggregate counts over drought reports and accounts.
//!
//! Everything here is a pure function of a snapshot: the same reports always give the
//! same summary. Maps are `BTreeMap` so key order is stable in responses.

pub mod handlers;

use std::collections::BTreeMap;

use axum::Router;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    auth::repo_types::{Role, User},
    reports::repo_types::{DroughtReport, Severity},
    state::AppState,
};

/// Number of entries in [`Summary::top_locations`].
pub const TOP_LOCATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_reports: usize,
    pub severity_breakdown: BTreeMap<Severity, usize>,
    /// Keyed `YYYY-MM`.
    pub monthly_reports: BTreeMap<String, usize>,
    pub location_breakdown: BTreeMap<String, usize>,
    pub top_locations: Vec<LocationCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role_breakdown: Option<BTreeMap<Role, usize>>,
}

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::analytics_routes())
}

/// Every severity appears, with zero when unreported.
pub fn severity_breakdown(reports: &[DroughtReport]) -> BTreeMap<Severity, usize> {
    let mut counts: BTreeMap<Severity, usize> = Severity::ALL.into_iter().map(|s| (s, 0)).collect();
    for r in reports {
        *counts.entry(r.severity).or_default() += 1;
    }
    counts
}

fn month_key(at: OffsetDateTime) -> String {
    format!("{:04}-{:02}", at.year(), u8::from(at.month()))
}

pub fn monthly_breakdown(reports: &[DroughtReport]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in reports {
        *counts.entry(month_key(r.created_at)).or_default() += 1;
    }
    counts
}

/// Locations are compared as stored; no case folding.
pub fn location_breakdown(reports: &[DroughtReport]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in reports {
        *counts.entry(r.location.clone()).or_default() += 1;
    }
    counts
}

/// The `n` most reported locations, by count then name.
pub fn top_locations(reports: &[DroughtReport], n: usize) -> Vec<LocationCount> {
    let mut ranked: Vec<LocationCount> = location_breakdown(reports)
        .into_iter()
        .map(|(location, count)| LocationCount { location, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.location.cmp(&b.location)));
    ranked.truncate(n);
    ranked
}

pub fn role_breakdown(users: &[User]) -> BTreeMap<Role, usize> {
    let mut counts: BTreeMap<Role, usize> = Role::ALL.into_iter().map(|r| (r, 0)).collect();
    for u in users {
        *counts.entry(u.role()).or_default() += 1;
    }
    counts
}

/// User figures are included only when a user snapshot is given.
pub fn summarize(reports: &[DroughtReport], users: Option<&[User]>) -> Summary {
    Summary {
        total_reports: reports.len(),
        severity_breakdown: severity_breakdown(reports),
        monthly_reports: monthly_breakdown(reports),
        location_breakdown: location_breakdown(reports),
        top_locations: top_locations(reports, TOP_LOCATIONS),
        total_users: users.map(|u| u.len()),
        user_role_breakdown: users.map(role_breakdown),
    }
}
