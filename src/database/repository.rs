//! All SQL lives here. Methods take an `impl PgExecutor` so the same
//! query can run against the pool, a checked-out connection, or the
//! per-event transaction in the webhook unit of work.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use tracing::{debug, warn};

use super::models::{ExerciseHistoryEntry, LogKind, Tenant, User};
use super::DbPool;
use crate::services::progression::Grade;

const USER_COLUMNS: &str = "id, line_user_id, tenant_id, username, foot_check_result, \
     last_program_type, current_week, last_response_days, question_sent, \
     program_sent_at, created_at, updated_at";

pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.pool.get_pool()
    }

    pub async fn tenant_by_bot_id<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        bot_id: &str,
    ) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, bot_id, name, created_at FROM tenants WHERE bot_id = $1",
        )
        .bind(bot_id)
        .fetch_optional(ex)
        .await?;
        Ok(tenant)
    }

    /// Creates the tenant row if missing, corrects the display name if
    /// configuration changed. Idempotent on restart.
    pub async fn upsert_tenant<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        bot_id: &str,
        name: &str,
    ) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"INSERT INTO tenants (bot_id, name) VALUES ($1, $2)
               ON CONFLICT (bot_id) DO UPDATE SET name = EXCLUDED.name
               RETURNING id, bot_id, name, created_at"#,
        )
        .bind(bot_id)
        .bind(name)
        .fetch_one(ex)
        .await?;
        Ok(tenant)
    }

    pub async fn find_user<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
        line_user_id: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND line_user_id = $2"
        ))
        .bind(tenant_id)
        .bind(line_user_id)
        .fetch_optional(ex)
        .await?;
        Ok(user)
    }

    pub async fn create_user<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
        line_user_id: &str,
        username: Option<&str>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (line_user_id, tenant_id, username) VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(line_user_id)
        .bind(tenant_id)
        .bind(username)
        .fetch_one(ex)
        .await?;
        debug!(user_id = user.id, tenant_id, "created user");
        Ok(user)
    }

    pub async fn update_username<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user_id: i32,
        username: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET username = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(username)
            .execute(ex)
            .await?;
        Ok(())
    }

    /// Grade transition: reset to week 0, program kind "initial",
    /// clear the awaiting flag, refresh the eligibility clock.
    pub async fn record_grade<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user_id: i32,
        grade: Grade,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET
                 foot_check_result = $2,
                 last_program_type = 'initial',
                 current_week = 0,
                 question_sent = FALSE,
                 program_sent_at = now(),
                 updated_at = now()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(grade.as_str())
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Day-count transition, minus the week advance which is applied
    /// only after confirmed delivery.
    pub async fn record_response<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user_id: i32,
        days: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET
                 last_response_days = $2,
                 last_program_type = 'continued',
                 question_sent = FALSE,
                 program_sent_at = now(),
                 updated_at = now()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(days)
        .execute(ex)
        .await?;
        Ok(())
    }

    pub async fn set_current_week<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user_id: i32,
        week: i32,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET current_week = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(week)
            .execute(ex)
            .await?;
        Ok(())
    }

    pub async fn mark_question_sent<'e>(&self, ex: impl PgExecutor<'e>, user_id: i32) -> Result<()> {
        sqlx::query("UPDATE users SET question_sent = TRUE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(ex)
            .await?;
        Ok(())
    }

    pub async fn insert_history<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user: &User,
        days: i32,
        response_text: &str,
        week_number: i32,
        grade: Grade,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO exercise_history
                 (user_id, tenant_id, response_days, response_text, week_number, foot_check_result)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(days)
        .bind(response_text)
        .bind(week_number)
        .bind(grade.as_str())
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Reminder eligibility: clock older than the cutoff, not already
    /// awaiting an answer, and graded. The `question_sent` gate is the
    /// sole dedup against the 6-hourly sweep.
    pub async fn eligible_for_reminder<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE tenant_id = $1
               AND program_sent_at IS NOT NULL
               AND program_sent_at <= $2
               AND question_sent = FALSE
               AND foot_check_result IS NOT NULL
             ORDER BY id"
        ))
        .bind(tenant_id)
        .bind(cutoff)
        .fetch_all(ex)
        .await?;
        Ok(users)
    }

    /// Every answer-pending user, with no 7-day gate. Test trigger only.
    pub async fn answer_pending<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
    ) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE tenant_id = $1
               AND program_sent_at IS NOT NULL
               AND question_sent = FALSE
             ORDER BY id"
        ))
        .bind(tenant_id)
        .fetch_all(ex)
        .await?;
        Ok(users)
    }

    pub async fn user_history<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        user_id: i32,
    ) -> Result<Vec<ExerciseHistoryEntry>> {
        let entries = sqlx::query_as::<_, ExerciseHistoryEntry>(
            r#"SELECT id, user_id, tenant_id, response_days, response_text,
                      week_number, foot_check_result, response_date
               FROM exercise_history
               WHERE user_id = $1
               ORDER BY response_date DESC"#,
        )
        .bind(user_id)
        .fetch_all(ex)
        .await?;
        Ok(entries)
    }

    pub async fn count_users<'e>(&self, ex: impl PgExecutor<'e>, tenant_id: i32) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(ex)
            .await?;
        Ok(n)
    }

    pub async fn count_responses<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
    ) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM exercise_history WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(ex)
        .await?;
        Ok(n)
    }

    pub async fn avg_response_days<'e>(
        &self,
        ex: impl PgExecutor<'e>,
        tenant_id: i32,
    ) -> Result<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(response_days)::float8 FROM exercise_history WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(ex)
        .await?;
        Ok(avg)
    }
}

/// Appends one activity-log entry. Standalone so the transport can
/// mirror attempts without holding a `Repository`.
pub async fn log_activity<'e>(
    ex: impl PgExecutor<'e>,
    user_id: i32,
    kind: LogKind,
    content: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO activity_logs (user_id, kind, content) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(kind.as_str())
        .bind(content)
        .execute(ex)
        .await?;
    Ok(())
}

/// Swallowing variant for paths where a failed log write must not
/// abort the surrounding operation (transport mirroring).
pub async fn log_activity_silent<'e>(
    ex: impl PgExecutor<'e>,
    user_id: i32,
    kind: LogKind,
    content: &str,
) {
    if let Err(e) = log_activity(ex, user_id, kind, content).await {
        warn!(user_id, "failed to write activity log: {e:#}");
    }
}
