use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::repo::{CodeStore, PgCodeStore, PgUserStore, UserStore},
    config::AppConfig,
    db,
    mailer::{CodeMailer, LogMailer},
    memory::{MemoryCodeStore, MemoryReportStore, MemoryUserStore},
    reports::repo::{PgReportStore, ReportStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub reports: Arc<dyn ReportStore>,
    pub codes: Arc<dyn CodeStore>,
    pub mailer: Arc<dyn CodeMailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let timeout = config.store_timeout();
        let protected = config.admin.email.clone();

        let state = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect(&config, url).await?;
                info!(max_connections = config.max_connections, "using postgres store");
                Self::from_parts(
                    config.clone(),
                    Arc::new(PgUserStore::new(pool.clone(), timeout, protected)),
                    Arc::new(PgReportStore::new(pool.clone(), timeout)),
                    Arc::new(PgCodeStore::new(pool, timeout)),
                    Arc::new(LogMailer),
                )
            }
            None => {
                warn!("DATABASE_URL not set; data is kept in memory and lost on restart");
                Self::in_memory(config.clone(), Arc::new(LogMailer))
            }
        };
        Ok(state)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        reports: Arc<dyn ReportStore>,
        codes: Arc<dyn CodeStore>,
        mailer: Arc<dyn CodeMailer>,
    ) -> Self {
        Self {
            config,
            users,
            reports,
            codes,
            mailer,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, mailer: Arc<dyn CodeMailer>) -> Self {
        let timeout = config.store_timeout();
        let protected = config.admin.email.clone();
        let reports = Arc::new(MemoryReportStore::new(timeout));
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new(timeout, protected, reports.clone())),
            reports,
            Arc::new(MemoryCodeStore::new(timeout)),
            mailer,
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_mailer().0
    }

    /// In-memory state whose mailer keeps sent codes for the test to read.
    #[cfg(test)]
    pub fn fake_with_mailer() -> (Self, Arc<crate::mailer::CapturingMailer>) {
        let mailer = Arc::new(crate::mailer::CapturingMailer::default());
        let state = Self::in_memory(Arc::new(AppConfig::for_tests()), mailer.clone());
        (state, mailer)
    }
}
