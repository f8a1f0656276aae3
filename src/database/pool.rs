use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Idempotent startup schema. The original ran its ORM create-all on
/// every boot; CREATE TABLE IF NOT EXISTS keeps that behavior.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS tenants (
        id SERIAL PRIMARY KEY,
        bot_id TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        line_user_id TEXT NOT NULL,
        tenant_id INTEGER NOT NULL REFERENCES tenants(id),
        username TEXT,
        foot_check_result VARCHAR(1),
        last_program_type TEXT,
        current_week INTEGER NOT NULL DEFAULT 0,
        last_response_days INTEGER,
        question_sent BOOLEAN NOT NULL DEFAULT FALSE,
        program_sent_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT users_line_user_tenant_uc UNIQUE (line_user_id, tenant_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS activity_logs (
        id BIGSERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS exercise_history (
        id BIGSERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        tenant_id INTEGER NOT NULL,
        response_days INTEGER NOT NULL,
        response_text TEXT NOT NULL,
        week_number INTEGER NOT NULL,
        foot_check_result VARCHAR(1) NOT NULL,
        response_date TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];

#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("DATABASE_URL is not set")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
            .connect(url)
            .await
            .context("failed to connect to database")?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("database schema ensured ({} tables)", SCHEMA.len());
        Ok(())
    }
}
