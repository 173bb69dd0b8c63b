use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{
        repo::CodeStore,
        repo_types::{CodePurpose, CodeRecord},
    },
    error::{AppError, AppResult},
};

pub const CODE_LEN: usize = 7;
const CODE_SPACE: u32 = 10_000_000;

/// Issues and redeems the 7-digit codes used for email confirmation and password reset.
pub struct CodeService<'a> {
    store: &'a dyn CodeStore,
    ttl: Duration,
}

impl<'a> CodeService<'a> {
    pub fn new(store: &'a dyn CodeStore, ttl_minutes: i64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub async fn issue(&self, email: &str, purpose: CodePurpose) -> AppResult<String> {
        self.issue_at(email, purpose, OffsetDateTime::now_utc()).await
    }

    /// Replaces any outstanding code for `(email, purpose)`.
    pub async fn issue_at(
        &self,
        email: &str,
        purpose: CodePurpose,
        now: OffsetDateTime,
    ) -> AppResult<String> {
        let code = generate_code();
        self.store
            .put(CodeRecord {
                email: email.to_string(),
                purpose,
                code: code.clone(),
                issued_at: now,
                expires_at: now + self.ttl,
                consumed_at: None,
            })
            .await?;
        debug!(%email, %purpose, "code issued");
        Ok(code)
    }

    pub async fn verify(&self, email: &str, purpose: CodePurpose, code: &str) -> AppResult<()> {
        self.verify_at(email, purpose, code, OffsetDateTime::now_utc()).await
    }

    /// Redeems `code`. Succeeds at most once per issued code.
    pub async fn verify_at(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let record = self
            .store
            .find(email, purpose)
            .await?
            .filter(|r| r.is_live() && r.code == code)
            .ok_or(AppError::InvalidCode)?;

        if now > record.expires_at {
            self.store.discard(email, purpose, code).await?;
            return Err(AppError::Expired);
        }

        // lost a race with a concurrent redemption
        if !self.store.consume(email, purpose, code, now).await? {
            return Err(AppError::InvalidCode);
        }
        debug!(%email, %purpose, "code consumed");
        Ok(())
    }
}

pub fn generate_code() -> String {
    format!("{:0width$}", OsRng.gen_range(0..CODE_SPACE), width = CODE_LEN)
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
