//! Database helpers for users and sessions.
//!
//! Lookups return `Ok(None)` for "no row"; only connectivity and SQL
//! failures surface as errors. Timestamp arithmetic happens in SQL so the
//! database clock is the single time authority.

use anyhow::{Context, Result};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::Instrument;

use super::codes::{ConfirmAction, ConfirmStatus, StoredConfirm};

/// A user row, with the confirm trio collapsed into one optional unit.
pub(super) struct UserRecord {
    pub(super) id: i64,
    pub(super) email: String,
    pub(super) password: String,
    pub(super) activation: bool,
    pub(super) name: String,
    pub(super) surname: String,
    pub(super) token_secret_key: String,
    pub(super) confirm: Option<StoredConfirm>,
    pub(super) confirm_status: ConfirmStatus,
}

/// A session row bound to one fingerprint.
pub(super) struct SessionRecord {
    pub(super) id: i64,
    pub(super) user_id: i64,
    pub(super) refresh_token: String,
    pub(super) access_token: String,
    pub(super) ip: String,
    pub(super) device: String,
    pub(super) user_agent: String,
    pub(super) created_at: String,
}

/// Outcome when inserting a new user.
#[derive(Debug)]
pub(super) enum InsertUserOutcome {
    Created(i64),
    Conflict,
}

const USER_COLUMNS: &str = r"
    id, email, password, activation, name, surname, token_secret_key,
    confirm_code, confirm_action,
    EXTRACT(EPOCH FROM (NOW() - confirmed_at))::BIGINT AS confirm_age,
    confirm_status
";

fn map_user(row: &sqlx::postgres::PgRow) -> UserRecord {
    let code: Option<String> = row.get("confirm_code");
    let action: Option<String> = row.get("confirm_action");
    let age: Option<i64> = row.get("confirm_age");

    // The trio moves together; a row with only part of it set is treated as
    // having no outstanding code.
    let confirm = match (code, action, age) {
        (Some(code), Some(action), Some(age_seconds)) => {
            ConfirmAction::parse(&action).map(|action| StoredConfirm {
                action,
                code,
                age_seconds,
            })
        }
        _ => None,
    };

    let status: Option<String> = row.get("confirm_status");

    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password: row.get("password"),
        activation: row.get("activation"),
        name: row.get("name"),
        surname: row.get("surname"),
        token_secret_key: row.get("token_secret_key"),
        confirm,
        confirm_status: ConfirmStatus::parse(status.as_deref()),
    }
}

pub(super) async fn find_user_by_email(
    executor: impl sqlx::PgExecutor<'_>,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(executor)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.as_ref().map(map_user))
}

/// Fields for a freshly registered user.
pub(super) struct NewUser<'a> {
    pub(super) email: &'a str,
    pub(super) password_hash: &'a str,
    pub(super) name: &'a str,
    pub(super) surname: &'a str,
    pub(super) token_secret_key: &'a str,
    pub(super) confirm_code: &'a str,
}

/// Insert a user with an outstanding registration code.
///
/// Runs inside the caller's transaction so the outbox enqueue commits with
/// it. A duplicate email reports `Conflict` instead of an error; the
/// pre-insert existence check is racy on its own.
pub(super) async fn insert_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user: &NewUser<'_>,
) -> Result<InsertUserOutcome> {
    let query = r"
        INSERT INTO users
            (email, password, name, surname, token_secret_key,
             confirm_code, confirm_action, confirmed_at, confirm_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), $8)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.surname)
        .bind(user.token_secret_key)
        .bind(user.confirm_code)
        .bind(ConfirmAction::Registration.as_str())
        .bind(ConfirmStatus::Waiting.as_str())
        .fetch_one(&mut **tx)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertUserOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Replace or clear the confirm trio. The three columns only ever move
/// together.
pub(super) enum ConfirmUpdate {
    Set { code: String, action: ConfirmAction },
    Clear,
}

/// Sparse update: only present fields reach the SQL.
#[derive(Default)]
pub(super) struct UserPatch {
    pub(super) password: Option<String>,
    pub(super) activation: Option<bool>,
    pub(super) confirm_status: Option<ConfirmStatus>,
    pub(super) confirm: Option<ConfirmUpdate>,
}

impl UserPatch {
    fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.activation.is_none()
            && self.confirm_status.is_none()
            && self.confirm.is_none()
    }
}

fn build_user_update<'a>(
    user_id: i64,
    patch: &'a UserPatch,
) -> Option<QueryBuilder<'a, Postgres>> {
    if patch.is_empty() {
        return None;
    }

    let mut builder = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(password) = &patch.password {
        builder.push(", password = ").push_bind(password);
    }

    if let Some(activation) = patch.activation {
        builder.push(", activation = ").push_bind(activation);
    }

    if let Some(status) = patch.confirm_status {
        builder.push(", confirm_status = ").push_bind(status.as_str());
    }

    match &patch.confirm {
        Some(ConfirmUpdate::Set { code, action }) => {
            builder.push(", confirm_code = ").push_bind(code);
            builder.push(", confirm_action = ").push_bind(action.as_str());
            builder.push(", confirmed_at = NOW()");
        }
        Some(ConfirmUpdate::Clear) => {
            builder.push(", confirm_code = NULL, confirm_action = NULL, confirmed_at = NULL");
        }
        None => {}
    }

    builder.push(" WHERE id = ").push_bind(user_id);

    Some(builder)
}

/// Apply a sparse patch. An empty patch is a no-op, not an error.
pub(super) async fn update_user(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    patch: &UserPatch,
) -> Result<()> {
    let Some(mut builder) = build_user_update(user_id, patch) else {
        return Ok(());
    };

    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = builder.sql()
    );
    builder
        .build()
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to update user")?;

    Ok(())
}

const SESSION_COLUMNS: &str = r"
    id, user_id, refresh_token, access_token, ip, device, user_agent,
    to_char(created_at, 'DD-MM-YYYY HH24:MI:SS') AS created_at
";

fn map_session(row: &sqlx::postgres::PgRow) -> SessionRecord {
    SessionRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        refresh_token: row.get("refresh_token"),
        access_token: row.get("access_token"),
        ip: row.get("ip"),
        device: row.get("device"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    }
}

/// Look up the session occupying a (device, ip, user agent) fingerprint.
pub(super) async fn find_session_by_fingerprint(
    executor: impl sqlx::PgExecutor<'_>,
    device: &str,
    ip: &str,
    user_agent: &str,
) -> Result<Option<SessionRecord>> {
    let query = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE device = $1 AND ip = $2 AND user_agent = $3"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(device)
        .bind(ip)
        .bind(user_agent)
        .fetch_optional(executor)
        .instrument(span)
        .await
        .context("failed to lookup session by fingerprint")?;

    Ok(row.as_ref().map(map_session))
}

pub(super) async fn find_session_by_refresh_token(
    executor: impl sqlx::PgExecutor<'_>,
    refresh_token: &str,
) -> Result<Option<SessionRecord>> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(refresh_token)
        .fetch_optional(executor)
        .instrument(span)
        .await
        .context("failed to lookup session by refresh token")?;

    Ok(row.as_ref().map(map_session))
}

/// Fields for a new session row.
pub(super) struct NewSession<'a> {
    pub(super) user_id: i64,
    pub(super) access_token: &'a str,
    pub(super) refresh_token: &'a str,
    pub(super) ip: &'a str,
    pub(super) device: &'a str,
    pub(super) user_agent: &'a str,
}

pub(super) async fn insert_session(
    executor: impl sqlx::PgExecutor<'_>,
    session: &NewSession<'_>,
) -> Result<()> {
    let query = r"
        INSERT INTO sessions
            (user_id, access_token, refresh_token, ip, device, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session.user_id)
        .bind(session.access_token)
        .bind(session.refresh_token)
        .bind(session.ip)
        .bind(session.device)
        .bind(session.user_agent)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to insert session")?;

    Ok(())
}

pub(super) async fn delete_session(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: i64,
) -> Result<()> {
    let query = "DELETE FROM sessions WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete session")?;

    Ok(())
}

/// Delete the session carrying an access token, returning rows removed so
/// the caller can tell a stale token from a live one.
pub(super) async fn delete_session_by_access_token(
    executor: impl sqlx::PgExecutor<'_>,
    access_token: &str,
) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE access_token = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(access_token)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete session by access token")?;

    Ok(result.rows_affected())
}

/// Delete one of a user's sessions by id. The `user_id` guard keeps callers
/// from destroying sessions they do not own.
pub(super) async fn delete_session_for_user(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: i64,
    user_id: i64,
) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(session_id)
        .bind(user_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete user session")?;

    Ok(result.rows_affected())
}

pub(super) async fn count_sessions_by_user(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<i64> {
    let query = "SELECT COUNT(id) AS count FROM sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(executor)
        .instrument(span)
        .await
        .context("failed to count sessions")?;

    Ok(row.get("count"))
}

pub(super) async fn list_sessions(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<Vec<SessionRecord>> {
    let query = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(executor)
        .instrument(span)
        .await
        .context("failed to list sessions")?;

    Ok(rows.iter().map(map_session).collect())
}

/// Database-clock "now" formatted for the login-notice email.
pub(super) async fn formatted_now(executor: impl sqlx::PgExecutor<'_>) -> Result<String> {
    let query = "SELECT to_char(NOW(), 'DD Mon, HH24:MI') AS now";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(executor)
        .instrument(span)
        .await
        .context("failed to read database time")?;

    Ok(row.get("now"))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
