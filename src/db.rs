use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

pub async fn connect(config: &AppConfig, database_url: &str) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.store_timeout())
        .connect(database_url)
        .await
        .context("connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;
    Ok(db)
}

/// Runs a store operation under a deadline. Every store call goes through here so no
/// request can hang on a stuck connection or lock.
pub async fn bounded<T, E, F>(limit: Duration, op: &'static str, fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, E>>,
    AppError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(AppError::from),
        Err(_) => {
            warn!(op, timeout_ms = limit.as_millis() as u64, "store operation timed out");
            Err(AppError::Timeout)
        }
    }
}
