use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeConfig {
    /// Lifetime of confirmation and reset codes.
    pub ttl_minutes: i64,
}

/// The protected admin account. It is seeded at startup when a password is configured
/// and can never be edited or deleted through the API.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub store_timeout_ms: u64,
    pub jwt: JwtConfig,
    pub codes: CodeConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "agrisupport".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "agrisupport-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24),
        };
        let codes = CodeConfig {
            ttl_minutes: env_parse("CODE_TTL_MINUTES", 30),
        };
        let admin = AdminConfig {
            email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@agrisupport.local".into())
                .trim()
                .to_lowercase(),
            name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".into()),
            password: std::env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        };
        Ok(Self {
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS", 5_000),
            jwt,
            codes,
            admin,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Configuration used by `AppState::fake()` and unit tests.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            max_connections: 1,
            store_timeout_ms: 1_000,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            codes: CodeConfig { ttl_minutes: 30 },
            admin: AdminConfig {
                email: "admin@agrisupport.test".into(),
                name: "Admin".into(),
                password: Some("admin-password".into()),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
