//! Role-based access rules.
//!
//! Every report and user operation asks [`authorize`] before touching a store. The
//! decision depends only on the caller's role, the action and, for per-record actions,
//! the record's owner.

use uuid::Uuid;

use crate::{
    auth::repo_types::Role,
    error::{AppError, AppResult},
};

/// The authenticated caller, as established by the session extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListReports,
    ReadReport,
    CreateReport,
    UpdateReport,
    DeleteReport,
    ListUsers,
    UpdateUser,
    DeleteUser,
    ViewAnalytics,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::ListReports,
        Action::ReadReport,
        Action::CreateReport,
        Action::UpdateReport,
        Action::DeleteReport,
        Action::ListUsers,
        Action::UpdateUser,
        Action::DeleteUser,
        Action::ViewAnalytics,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Which reports a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    All,
    OwnedBy(Uuid),
}

impl ReportScope {
    pub fn permits(&self, submitter_id: Uuid) -> bool {
        match self {
            ReportScope::All => true,
            ReportScope::OwnedBy(owner) => *owner == submitter_id,
        }
    }
}

pub fn authorize(principal: &Principal, action: Action, owner: Option<Uuid>) -> Decision {
    use Action::*;
    use Role::*;

    let allowed = match (principal.role, action) {
        (Admin, _) => true,

        (Ngo, ListReports | ReadReport | ListUsers | ViewAnalytics) => true,
        (Ngo, CreateReport | UpdateReport | DeleteReport | UpdateUser | DeleteUser) => false,

        (Farmer, CreateReport | ListReports | ViewAnalytics) => true,
        // farmers only ever see their own submissions
        (Farmer, ReadReport) => owner == Some(principal.id),
        (Farmer, UpdateReport | DeleteReport | ListUsers | UpdateUser | DeleteUser) => false,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// `Forbidden` unless [`authorize`] allows the action.
pub fn require(principal: &Principal, action: Action, owner: Option<Uuid>) -> AppResult<()> {
    match authorize(principal, action, owner) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(AppError::Forbidden),
    }
}

pub fn report_scope(principal: &Principal) -> ReportScope {
    match principal.role {
        Role::Farmer => ReportScope::OwnedBy(principal.id),
        Role::Ngo | Role::Admin => ReportScope::All,
    }
}
