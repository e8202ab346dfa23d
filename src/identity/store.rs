//! Persistence for users and sessions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::User;
use super::utils::is_unique_violation;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Outcome when attempting to insert a new user.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// Data needed to persist a session; the raw token never reaches the store.
#[derive(Debug)]
pub struct NewSession {
    pub session_hash: Vec<u8>,
    pub user_id: Uuid,
    pub persistent: bool,
    pub ttl_seconds: i64,
}

/// Storage backend behind the identity manager.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<InsertOutcome>;

    async fn find_by_user_name(&self, normalized_user_name: &str) -> Result<Option<User>>;

    async fn insert_session(&self, session: &NewSession) -> Result<InsertOutcome>;

    /// Return the user owning a live (unexpired) session.
    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<User>>;

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()>;

    /// Remove every expired session and return how many were deleted.
    async fn delete_expired_sessions(&self) -> Result<u64>;
}

/// `PostgreSQL` implementation of [`UserStore`].
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "users.id, users.user_name, users.normalized_user_name, users.email, \
     users.normalized_email, users.password_hash, users.security_stamp, users.name, users.login";

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        user_name: row.get("user_name"),
        normalized_user_name: row.get("normalized_user_name"),
        email: row.get("email"),
        normalized_email: row.get("normalized_email"),
        password_hash: row.get("password_hash"),
        security_stamp: row.get("security_stamp"),
        name: row.get("name"),
        login: row.get("login"),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, user: &User) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users
                (id, user_name, normalized_user_name, email, normalized_email,
                 password_hash, security_stamp, name, login)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.user_name)
            .bind(&user.normalized_user_name)
            .bind(&user.email)
            .bind(&user.normalized_email)
            .bind(&user.password_hash)
            .bind(&user.security_stamp)
            .bind(&user.name)
            .bind(&user.login)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_by_user_name(&self, normalized_user_name: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE normalized_user_name = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(normalized_user_name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_session(&self, session: &NewSession) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO user_sessions (session_hash, user_id, persistent, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&session.session_hash)
            .bind(session.user_id)
            .bind(session.persistent)
            .bind(session.ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert session"),
        }
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM user_sessions \
             JOIN users ON users.id = user_sessions.user_id \
             WHERE user_sessions.session_hash = $1 AND user_sessions.expires_at > NOW()"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;

        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete expired sessions")?;

        Ok(result.rows_affected())
    }
}

/// Apply `sql/schema.sql`. Every statement is idempotent.
///
/// # Errors
/// Returns an error if any statement fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "MIGRATE",
            db.statement = statement.as_str()
        );
        sqlx::query(statement)
            .execute(pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
