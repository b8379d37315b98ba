//! Email outbox worker, templates, and delivery abstractions.
//!
//! Auth flows enqueue `(to, template key, substitution payload)` rows in
//! `email_outbox` with status `pending`, inside the operation's transaction
//! when one is open, so a rolled-back registration never leaves a stray
//! email behind. A background task polls that table, locks a batch via
//! `FOR UPDATE SKIP LOCKED`, renders subject and body from the template
//! table, and hands each message to an `EmailSender`. The worker then marks
//! the row `sent` or reschedules it with exponential backoff and jitter
//! until a max attempt threshold, after which it is marked `failed`.
//!
//! Callers never wait on delivery; an outbox failure is the worker's problem,
//! not the request's. The default sender is `LogEmailSender`, which logs and
//! returns `Ok(())`; an SMTP or broker-backed sender plugs in behind the
//! same trait.

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use regex::Regex;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// Subject/body templates keyed by the outbox `template` column.
/// `{{ key }}` placeholders are filled from the row's payload.
const TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "login",
        "New sign-in to your account",
        "Hello {{ email }}, a new sign-in from {{ device }} ({{ device_detail }}) at {{ time }}. \
         If this was not you, change your password.",
    ),
    (
        "registration",
        "Confirm your registration",
        "Welcome! Your confirmation code is {{ confirm_code }}.",
    ),
    (
        "activation",
        "Account activated",
        "Hello {{ name }}, your account has been activated. You can sign in now.",
    ),
    (
        "forgot",
        "Password recovery",
        "Your password recovery code is {{ confirm_code }}.",
    ),
    (
        "recovery",
        "Password changed",
        "Hello {{ name }}, your password has been changed. If this was not you, contact support.",
    ),
    (
        "confirm",
        "Your confirmation code",
        "Your confirmation code is {{ confirm_code }}.",
    ),
];

/// A rendered message ready for delivery.
#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to mark it as failed.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email outbox send stub"
        );
        Ok(())
    }
}

/// Render a template's subject and body from a JSON object of string values.
///
/// Placeholders use the `{{ key }}` form with optional inner spaces. Unknown
/// payload keys are ignored; unknown template keys are an error so a typo in
/// an enqueue site fails loudly in the worker log.
pub(crate) fn render(template: &str, payload_json: &str) -> Result<(String, String)> {
    let (_, subject, body) = TEMPLATES
        .iter()
        .find(|(key, _, _)| *key == template)
        .ok_or_else(|| anyhow!("unknown email template: {template}"))?;

    let payload: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(payload_json).context("failed to parse email payload")?;

    let mut subject = (*subject).to_string();
    let mut body = (*body).to_string();

    for (key, value) in &payload {
        let Some(value) = value.as_str() else {
            continue;
        };
        let pattern = format!(r"\{{\{{ *{} *\}}\}}", regex::escape(key));
        let re = Regex::new(&pattern).context("failed to compile placeholder pattern")?;
        subject = re.replace_all(&subject, value).into_owned();
        body = re.replace_all(&body, value).into_owned();
    }

    Ok((subject, body))
}

/// Queue a templated email inside the caller's transaction.
pub(crate) async fn enqueue_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let payload_text = serde_json::to_string(payload).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    /// Default worker config: 5s poll interval, 10 messages per batch,
    /// 5 max attempts, and 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = if self.batch_size == 0 {
            1
        } else {
            self.batch_size
        };
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = if self.backoff_max < backoff_base {
            backoff_base
        } else {
            self.backoff_max
        };
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that polls and processes the email outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            // Poll on a fixed cadence; the sender handles delivery or logging.
            let batch_result = process_outbox_batch(&pool, sender.as_ref(), &config).await;
            if let Err(err) = batch_result {
                error!("email outbox batch failed: {err}");
            }

            sleep(poll_interval).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    // Grab a locked batch so multiple workers can run without double-sending.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(0))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        // Commit even on empty to release locks and keep the poll loop consistent.
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let to_email: String = row.get("to_email");
        let template: String = row.get("template");
        let payload_json: String = row.get("payload_json");

        // Rendering failures count as send failures so the retry bookkeeping
        // applies to them too.
        let send_result = render(&template, &payload_json).and_then(|(subject, body)| {
            sender.send(&EmailMessage {
                to_email,
                subject,
                body,
            })
        });
        update_outbox_status(&mut tx, id, attempts, send_result, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn update_outbox_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &EmailWorkerConfig,
) -> Result<()> {
    // Retry failures with exponential backoff and jitter until max_attempts.
    let next_attempt = attempts.saturating_add(1);
    let next_attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);
    match send_result {
        Ok(()) => {
            let query = r"
                UPDATE email_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox status to sent")?;
        }
        Err(err) => {
            let max_attempts = config.max_attempts();
            if next_attempt >= max_attempts {
                let query = r"
                    UPDATE email_outbox
                    SET status = 'failed',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW()
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update outbox status to failed")?;
            } else {
                let delay =
                    backoff_delay(next_attempt, config.backoff_base(), config.backoff_max());
                let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                let query = r"
                    UPDATE email_outbox
                    SET status = 'pending',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .bind(delay_ms)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update outbox retry schedule")?;
            }
        }
    }

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_substitutes_placeholders() {
        let payload = json!({"confirm_code": "042153"}).to_string();
        let (subject, body) = render("registration", &payload).unwrap();
        assert_eq!(subject, "Confirm your registration");
        assert!(body.contains("042153"));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn render_handles_spaced_placeholders() {
        let payload = json!({
            "email": "a@b.c",
            "device": "Desktop",
            "device_detail": "Windows,Chrome 120,1.2.3.4",
            "time": "01 Jan, 12:00",
        })
        .to_string();
        let (_, body) = render("login", &payload).unwrap();
        assert!(body.contains("Desktop (Windows,Chrome 120,1.2.3.4)"));
        assert!(body.starts_with("Hello a@b.c"));
    }

    #[test]
    fn render_ignores_extra_payload_keys() {
        let payload = json!({"unused": "x"}).to_string();
        let (subject, body) = render("activation", &payload).unwrap();
        assert_eq!(subject, "Account activated");
        assert!(!body.is_empty());
    }

    #[test]
    fn render_rejects_unknown_template() {
        assert!(render("nope", "{}").is_err());
    }

    #[test]
    fn render_rejects_malformed_payload() {
        assert!(render("activation", "not-json").is_err());
    }

    #[test]
    fn normalize_clamps_zero_values() {
        let config = EmailWorkerConfig::new()
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .normalize();

        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert!(config.backoff_max() >= config.backoff_base());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);

        let first = backoff_delay(1, base, max);
        assert!(first >= Duration::from_millis(2_500));
        assert!(first <= Duration::from_secs(5));

        let late = backoff_delay(30, base, max);
        assert!(late <= max);
        assert!(late >= Duration::from_millis(150_000));
    }

    #[test]
    fn jitter_keeps_delay_within_bounds() {
        let delay = Duration::from_secs(10);
        for _ in 0..16 {
            let jittered = jitter_delay(delay);
            assert!(jittered >= Duration::from_secs(5));
            assert!(jittered <= Duration::from_secs(10));
        }
    }

    #[test]
    fn tiny_delay_skips_jitter() {
        assert_eq!(jitter_delay(Duration::from_millis(1)), Duration::from_millis(1));
    }
}
