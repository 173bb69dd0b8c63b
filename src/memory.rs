//! In-process stores, used when no database is configured and by the tests.
//!
//! Each store keeps its records behind one `RwLock`. Every mutation runs under a single
//! write guard, so a patch is never half-applied and a code is replaced in one step.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{CodeStore, UserStore},
        repo_types::{CodePurpose, CodeRecord, NewUser, User, UserPatch},
    },
    db::bounded,
    error::{AppError, AppResult},
    policy::ReportScope,
    reports::{
        repo::ReportStore,
        repo_types::{DroughtReport, NewReport, ReportPatch},
    },
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Users, plus a handle on the report store so an account and its reports go together.
pub struct MemoryUserStore {
    // insertion order; lookups are linear, which is fine at in-process scale
    users: RwLock<Vec<User>>,
    reports: Arc<MemoryReportStore>,
    timeout: Duration,
    protected_email: String,
}

impl MemoryUserStore {
    pub fn new(
        timeout: Duration,
        protected_email: impl Into<String>,
        reports: Arc<MemoryReportStore>,
    ) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            reports,
            timeout,
            protected_email: protected_email.into(),
        }
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut users = bounded(self.timeout, "users.create", async {
            Ok::<_, AppError>(self.users.write().await)
        })
        .await?;
        if users.iter().any(|u| same_email(&u.email, &new.email)) {
            return Err(AppError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            confirmed: false,
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let users = bounded(self.timeout, "users.find_by_id", async {
            Ok::<_, AppError>(self.users.read().await)
        })
        .await?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = bounded(self.timeout, "users.find_by_email", async {
            Ok::<_, AppError>(self.users.read().await)
        })
        .await?;
        Ok(users.iter().find(|u| same_email(&u.email, email)).cloned())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let users = bounded(self.timeout, "users.list", async {
            Ok::<_, AppError>(self.users.read().await)
        })
        .await?;
        Ok(users.iter().rev().cloned().collect())
    }

    async fn set_confirmed(&self, id: Uuid) -> AppResult<()> {
        let mut users = bounded(self.timeout, "users.set_confirmed", async {
            Ok::<_, AppError>(self.users.write().await)
        })
        .await?;
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        if !user.confirmed {
            user.confirmed = true;
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut users = bounded(self.timeout, "users.set_password", async {
            Ok::<_, AppError>(self.users.write().await)
        })
        .await?;
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> AppResult<User> {
        let mut users = bounded(self.timeout, "users.update", async {
            Ok::<_, AppError>(self.users.write().await)
        })
        .await?;
        let idx = users.iter().position(|u| u.id == id).ok_or(AppError::NotFound)?;
        if same_email(&users[idx].email, &self.protected_email) {
            return Err(AppError::Forbidden);
        }
        if let Some(email) = &patch.email {
            // the protected address stays reserved even before it is seeded
            if same_email(email, &self.protected_email)
                || users.iter().any(|u| u.id != id && same_email(&u.email, email))
            {
                return Err(AppError::DuplicateEmail);
            }
        }
        let user = &mut users[idx];
        patch.apply(user);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut users = bounded(self.timeout, "users.delete", async {
            Ok::<_, AppError>(self.users.write().await)
        })
        .await?;
        let idx = users.iter().position(|u| u.id == id).ok_or(AppError::NotFound)?;
        if same_email(&users[idx].email, &self.protected_email) {
            return Err(AppError::Forbidden);
        }
        // users lock before reports lock, never the reverse
        let mut reports = bounded(self.timeout, "users.delete.reports", async {
            Ok::<_, AppError>(self.reports.reports.write().await)
        })
        .await?;
        reports.retain(|r| r.submitter_id != id);
        users.remove(idx);
        Ok(())
    }
}

pub struct MemoryReportStore {
    reports: RwLock<Vec<DroughtReport>>,
    timeout: Duration,
}

impl MemoryReportStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            timeout,
        }
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, new: NewReport) -> AppResult<DroughtReport> {
        let mut reports = bounded(self.timeout, "reports.create", async {
            Ok::<_, AppError>(self.reports.write().await)
        })
        .await?;
        let now = OffsetDateTime::now_utc();
        let report = DroughtReport {
            id: Uuid::new_v4(),
            submitter_id: new.submitter_id,
            location: new.location,
            severity: new.severity,
            description: new.description,
            contact_name: new.contact_name,
            phone: new.phone,
            email: new.email,
            created_at: now,
            updated_at: now,
        };
        reports.push(report.clone());
        Ok(report)
    }

    async fn list(&self, scope: ReportScope) -> AppResult<Vec<DroughtReport>> {
        let reports = bounded(self.timeout, "reports.list", async {
            Ok::<_, AppError>(self.reports.read().await)
        })
        .await?;
        Ok(reports
            .iter()
            .rev()
            .filter(|r| scope.permits(r.submitter_id))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<DroughtReport> {
        let reports = bounded(self.timeout, "reports.get", async {
            Ok::<_, AppError>(self.reports.read().await)
        })
        .await?;
        reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn update(&self, id: Uuid, patch: ReportPatch) -> AppResult<DroughtReport> {
        let mut reports = bounded(self.timeout, "reports.update", async {
            Ok::<_, AppError>(self.reports.write().await)
        })
        .await?;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AppError::NotFound)?;
        patch.apply(report);
        report.updated_at = OffsetDateTime::now_utc();
        Ok(report.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut reports = bounded(self.timeout, "reports.delete", async {
            Ok::<_, AppError>(self.reports.write().await)
        })
        .await?;
        let idx = reports
            .iter()
            .position(|r| r.id == id)
            .ok_or(AppError::NotFound)?;
        reports.remove(idx);
        Ok(())
    }
}

pub struct MemoryCodeStore {
    codes: RwLock<HashMap<(String, CodePurpose), CodeRecord>>,
    timeout: Duration,
}

impl MemoryCodeStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            timeout,
        }
    }
}

impl Default for MemoryCodeStore {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn put(&self, record: CodeRecord) -> AppResult<()> {
        let mut codes = bounded(self.timeout, "codes.put", async {
            Ok::<_, AppError>(self.codes.write().await)
        })
        .await?;
        codes.insert((record.email.clone(), record.purpose), record);
        Ok(())
    }

    async fn find(&self, email: &str, purpose: CodePurpose) -> AppResult<Option<CodeRecord>> {
        let codes = bounded(self.timeout, "codes.find", async {
            Ok::<_, AppError>(self.codes.read().await)
        })
        .await?;
        Ok(codes.get(&(email.to_string(), purpose)).cloned())
    }

    async fn consume(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        at: OffsetDateTime,
    ) -> AppResult<bool> {
        let mut codes = bounded(self.timeout, "codes.consume", async {
            Ok::<_, AppError>(self.codes.write().await)
        })
        .await?;
        match codes.get_mut(&(email.to_string(), purpose)) {
            Some(rec) if rec.is_live() && rec.code == code => {
                rec.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn discard(&self, email: &str, purpose: CodePurpose, code: &str) -> AppResult<()> {
        let mut codes = bounded(self.timeout, "codes.discard", async {
            Ok::<_, AppError>(self.codes.write().await)
        })
        .await?;
        let key = (email.to_string(), purpose);
        if codes.get(&key).is_some_and(|r| r.code == code) {
            codes.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::{Profile, Role},
        reports::repo_types::Severity,
    };

    const PROTECTED: &str = "admin@agrisupport.test";

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Someone".into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            profile: Profile::empty(role),
        }
    }

    fn user_store() -> MemoryUserStore {
        MemoryUserStore::new(DEFAULT_TIMEOUT, PROTECTED, Arc::new(MemoryReportStore::default()))
    }

    fn new_report(submitter_id: Uuid, severity: Severity) -> NewReport {
        NewReport {
            submitter_id,
            location: "Riverdale".into(),
            severity,
            description: "Wells are dry".into(),
            contact_name: "Alice".into(),
            phone: "555-0100".into(),
            email: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_case_insensitive() {
        let store = user_store();
        store.create(new_user("a@x.com", Role::Farmer)).await.unwrap();
        let dup = store.create(new_user("A@X.COM", Role::Ngo)).await;
        assert!(matches!(dup, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn new_users_start_unconfirmed_and_confirm_idempotently() {
        let store = user_store();
        let user = store.create(new_user("a@x.com", Role::Farmer)).await.unwrap();
        assert!(!user.confirmed);

        store.set_confirmed(user.id).await.unwrap();
        store.set_confirmed(user.id).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().confirmed);
    }

    #[tokio::test]
    async fn protected_account_cannot_be_changed_or_removed() {
        let store = user_store();
        let admin = store.create(new_user(PROTECTED, Role::Admin)).await.unwrap();

        let demote = UserPatch {
            role: Some(Role::Farmer),
            ..Default::default()
        };
        assert!(matches!(store.update(admin.id, demote).await, Err(AppError::Forbidden)));
        assert!(matches!(store.delete(admin.id).await, Err(AppError::Forbidden)));
        assert_eq!(store.find_by_id(admin.id).await.unwrap().unwrap().role(), Role::Admin);
    }

    #[tokio::test]
    async fn update_rejects_taken_email() {
        let store = user_store();
        store.create(new_user("a@x.com", Role::Farmer)).await.unwrap();
        let b = store.create(new_user("b@x.com", Role::Farmer)).await.unwrap();

        let patch = UserPatch {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(store.update(b.id, patch).await, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped() {
        let store = MemoryReportStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let first = store.create(new_report(alice, Severity::Mild)).await.unwrap();
        let second = store.create(new_report(bob, Severity::Severe)).await.unwrap();

        let all = store.list(ReportScope::All).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let own = store.list(ReportScope::OwnedBy(alice)).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, first.id);
    }

    #[tokio::test]
    async fn unchanged_patch_only_touches_audit_field() {
        let store = MemoryReportStore::default();
        let before = store
            .create(new_report(Uuid::new_v4(), Severity::Moderate))
            .await
            .unwrap();
        let patch = ReportPatch {
            location: Some(before.location.clone()),
            severity: Some(before.severity),
            description: Some(before.description.clone()),
            contact_name: Some(before.contact_name.clone()),
            phone: Some(before.phone.clone()),
            email: None,
        };
        let mut after = store.update(before.id, patch).await.unwrap();
        assert!(after.updated_at >= before.updated_at);
        after.updated_at = before.updated_at;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn missing_reports_are_not_found() {
        let store = MemoryReportStore::default();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(AppError::NotFound)));
        assert!(matches!(
            store.update(id, ReportPatch::default()).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(store.delete(id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn deleting_a_user_removes_only_their_reports() {
        let reports = Arc::new(MemoryReportStore::default());
        let users = MemoryUserStore::new(DEFAULT_TIMEOUT, PROTECTED, reports.clone());
        let alice = users.create(new_user("a@x.com", Role::Farmer)).await.unwrap();
        reports.create(new_report(alice.id, Severity::Mild)).await.unwrap();
        reports.create(new_report(alice.id, Severity::Extreme)).await.unwrap();
        let other = reports.create(new_report(Uuid::new_v4(), Severity::Mild)).await.unwrap();

        users.delete(alice.id).await.unwrap();
        let left = reports.list(ReportScope::All).await.unwrap();
        assert_eq!(left.iter().map(|r| r.id).collect::<Vec<_>>(), vec![other.id]);
    }

    #[tokio::test]
    async fn user_survives_when_reports_cannot_be_removed() {
        let reports = Arc::new(MemoryReportStore::default());
        let users = MemoryUserStore::new(Duration::from_millis(20), PROTECTED, reports.clone());
        let alice = users.create(new_user("a@x.com", Role::Farmer)).await.unwrap();
        reports.create(new_report(alice.id, Severity::Severe)).await.unwrap();

        let held = reports.reports.write().await;
        assert!(matches!(users.delete(alice.id).await, Err(AppError::Timeout)));
        drop(held);

        assert!(users.find_by_id(alice.id).await.unwrap().is_some());
        assert_eq!(reports.list(ReportScope::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn protected_email_cannot_be_taken_by_update() {
        let store = user_store();
        let bob = store.create(new_user("b@x.com", Role::Farmer)).await.unwrap();
        let patch = UserPatch {
            email: Some(PROTECTED.to_uppercase()),
            ..Default::default()
        };
        assert!(matches!(store.update(bob.id, patch).await, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_fields() {
        let store = std::sync::Arc::new(MemoryReportStore::default());
        let report = store
            .create(new_report(Uuid::new_v4(), Severity::Mild))
            .await
            .unwrap();
        let id = report.id;

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(id, ReportPatch { location: Some("North".into()), ..Default::default() })
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(id, ReportPatch { severity: Some(Severity::Extreme), ..Default::default() })
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let stored = store.get(report.id).await.unwrap();
        assert_eq!(stored.location, "North");
        assert_eq!(stored.severity, Severity::Extreme);
    }
}
