use async_trait::async_trait;
use tracing::info;

use crate::auth::repo_types::CodePurpose;

/// Out-of-band delivery of one-time codes.
#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(&self, email: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()>;
}

/// Development mailer: writes the code to the log instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(&self, email: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()> {
        info!(%email, %purpose, %code, "verification code issued");
        Ok(())
    }
}

#[cfg(test)]
pub use capture::CapturingMailer;
