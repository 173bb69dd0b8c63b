use std::time::Duration;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{CodePurpose, CodeRecord, CodeRow, NewUser, User, UserPatch, UserRow},
    db::bounded,
    error::{AppError, AppResult},
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, confirmed, profile, created_at, updated_at";

/// Credential store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Stores a new, unconfirmed user. Fails with `DuplicateEmail` when the email is taken.
    async fn create(&self, new: NewUser) -> AppResult<User>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Newest first.
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn set_confirmed(&self, id: Uuid) -> AppResult<()>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()>;
    /// `Forbidden` when `id` is the protected account; `DuplicateEmail` when the patch
    /// would move another account onto the protected address.
    async fn update(&self, id: Uuid, patch: UserPatch) -> AppResult<User>;
    /// `Forbidden` when `id` is the protected account. The account's reports go with it.
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Storage for confirmation and reset codes, one record per `(email, purpose)`.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Inserts or overwrites the record for its key in one atomic step.
    async fn put(&self, record: CodeRecord) -> AppResult<()>;
    async fn find(&self, email: &str, purpose: CodePurpose) -> AppResult<Option<CodeRecord>>;
    /// Marks the record consumed if it is still live and holds `code`.
    /// Returns whether this call consumed it.
    async fn consume(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        at: OffsetDateTime,
    ) -> AppResult<bool>;
    /// Removes the record only if it still holds `code`.
    async fn discard(&self, email: &str, purpose: CodePurpose, code: &str) -> AppResult<()>;
}

pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
    protected_email: String,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration, protected_email: impl Into<String>) -> Self {
        Self {
            db,
            timeout,
            protected_email: protected_email.into(),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let now = OffsetDateTime::now_utc();
        let query = format!(
            "INSERT INTO users (id, name, email, password_hash, role, confirmed, profile, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $7)
             RETURNING {USER_COLUMNS}"
        );
        let row = bounded(
            self.timeout,
            "users.create",
            sqlx::query_as::<_, UserRow>(&query)
                .bind(Uuid::new_v4())
                .bind(&new.name)
                .bind(&new.email)
                .bind(&new.password_hash)
                .bind(new.profile.role().as_str())
                .bind(Json(&new.profile))
                .bind(now)
                .fetch_one(&self.db),
        )
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = bounded(
            self.timeout,
            "users.find_by_id",
            sqlx::query_as::<_, UserRow>(&query).bind(id).fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let row = bounded(
            self.timeout,
            "users.find_by_email",
            sqlx::query_as::<_, UserRow>(&query).bind(email).fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id");
        let rows = bounded(
            self.timeout,
            "users.list",
            sqlx::query_as::<_, UserRow>(&query).fetch_all(&self.db),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn set_confirmed(&self, id: Uuid) -> AppResult<()> {
        let res = bounded(
            self.timeout,
            "users.set_confirmed",
            sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let res = bounded(
            self.timeout,
            "users.set_password",
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.db),
        )
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> AppResult<User> {
        let select = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let update = format!(
            "UPDATE users
                SET name = $2, email = $3, password_hash = $4, role = $5, profile = $6,
                    updated_at = $7
              WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        bounded(self.timeout, "users.update", async {
            let mut tx = self.db.begin().await?;
            let row = sqlx::query_as::<_, UserRow>(&select)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound)?;
            let mut user = User::try_from(row)?;
            if user.email == self.protected_email {
                return Err(AppError::Forbidden);
            }
            if patch.email.as_deref() == Some(self.protected_email.as_str()) {
                return Err(AppError::DuplicateEmail);
            }
            patch.apply(&mut user);
            let row = sqlx::query_as::<_, UserRow>(&update)
                .bind(id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role().as_str())
                .bind(Json(&user.profile))
                .bind(OffsetDateTime::now_utc())
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, AppError>(User::try_from(row)?)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        bounded(self.timeout, "users.delete", async {
            let mut tx = self.db.begin().await?;
            let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound)?;
            if email == self.protected_email {
                return Err(AppError::Forbidden);
            }
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, AppError>(())
        })
        .await
    }
}

pub struct PgCodeStore {
    db: PgPool,
    timeout: Duration,
}

impl PgCodeStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn put(&self, record: CodeRecord) -> AppResult<()> {
        bounded(
            self.timeout,
            "codes.put",
            sqlx::query(
                r#"
                INSERT INTO verification_codes (email, purpose, code, issued_at, expires_at, consumed_at)
                VALUES ($1, $2, $3, $4, $5, NULL)
                ON CONFLICT (email, purpose) DO UPDATE
                   SET code = EXCLUDED.code,
                       issued_at = EXCLUDED.issued_at,
                       expires_at = EXCLUDED.expires_at,
                       consumed_at = NULL
                "#,
            )
            .bind(&record.email)
            .bind(record.purpose.as_str())
            .bind(&record.code)
            .bind(record.issued_at)
            .bind(record.expires_at)
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn find(&self, email: &str, purpose: CodePurpose) -> AppResult<Option<CodeRecord>> {
        let row = bounded(
            self.timeout,
            "codes.find",
            sqlx::query_as::<_, CodeRow>(
                r#"
                SELECT email, purpose, code, issued_at, expires_at, consumed_at
                  FROM verification_codes
                 WHERE email = $1 AND purpose = $2
                "#,
            )
            .bind(email)
            .bind(purpose.as_str())
            .fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(CodeRecord::try_from).transpose()?)
    }

    async fn consume(
        &self,
        email: &str,
        purpose: CodePurpose,
        code: &str,
        at: OffsetDateTime,
    ) -> AppResult<bool> {
        let res = bounded(
            self.timeout,
            "codes.consume",
            sqlx::query(
                r#"
                UPDATE verification_codes
                   SET consumed_at = $4
                 WHERE email = $1 AND purpose = $2 AND code = $3 AND consumed_at IS NULL
                "#,
            )
            .bind(email)
            .bind(purpose.as_str())
            .bind(code)
            .bind(at)
            .execute(&self.db),
        )
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn discard(&self, email: &str, purpose: CodePurpose, code: &str) -> AppResult<()> {
        bounded(
            self.timeout,
            "codes.discard",
            sqlx::query(
                "DELETE FROM verification_codes WHERE email = $1 AND purpose = $2 AND code = $3",
            )
            .bind(email)
            .bind(purpose.as_str())
            .bind(code)
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
