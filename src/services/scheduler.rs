//! Reminder sweep: every few hours, find users whose last package is a
//! week old and who are not already awaiting an answer, push the weekly
//! question, and flag them immediately so the next tick cannot re-send.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::database::Repository;
use crate::line::client::{LogTarget, SendKind};
use crate::line::messages::{Message, QuickReply};
use crate::services::replies;
use crate::state::AppState;
use crate::tenant::TenantContext;

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub tenants: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Spawns the recurring sweep. First run happens one full interval
/// after startup, so restarts never trigger an immediate extra sweep.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.settings.scheduler.sweep_interval_hours * 3600);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let report = run_sweep(&state).await;
            info!(
                tenants = report.tenants,
                notified = report.notified,
                failed = report.failed,
                "reminder sweep finished"
            );
        }
    })
}

/// One full sweep over all tenants, with the normal 7-day gate.
pub async fn run_sweep(state: &AppState) -> SweepReport {
    info!("reminder sweep started at {}", Utc::now());
    let mut report = SweepReport::default();
    let Some(repo) = state.repo.as_deref() else {
        warn!("reminder sweep skipped: database unavailable");
        return report;
    };

    for ctx in state.registry.iter() {
        report.tenants += 1;
        match sweep_tenant(ctx, repo, state).await {
            Ok((notified, failed)) => {
                report.notified += notified;
                report.failed += failed;
            }
            Err(e) => {
                report.failed += 1;
                error!(bot_id = %ctx.bot_id, "reminder sweep failed: {e:#}");
            }
        }
    }
    report
}

async fn sweep_tenant(
    ctx: &TenantContext,
    repo: &Repository,
    state: &AppState,
) -> Result<(usize, usize)> {
    let cfg = &state.settings.scheduler;
    let mut conn = repo.pool().acquire().await?;

    // Bound every statement in this sweep so a stuck query cannot block
    // subsequent ticks.
    let timeout = format!("SET statement_timeout = '{}s'", cfg.statement_timeout_secs);
    if let Err(e) = sqlx::query(&timeout).execute(&mut *conn).await {
        warn!(bot_id = %ctx.bot_id, "failed to set statement timeout: {e}");
    }

    let Some(tenant) = repo.tenant_by_bot_id(&mut *conn, &ctx.bot_id).await? else {
        warn!(bot_id = %ctx.bot_id, "tenant record missing, skipping sweep");
        return Ok((0, 0));
    };

    let cutoff = Utc::now() - ChronoDuration::days(cfg.reminder_after_days);
    let users = repo.eligible_for_reminder(&mut *conn, tenant.id, cutoff).await?;
    info!(
        bot_id = %ctx.bot_id,
        eligible = users.len(),
        "found users for weekly reminder"
    );

    let mut notified = 0;
    let mut failed = 0;
    for user in users {
        let message = Message::text_with_quick_reply(
            replies::weekly_reminder(user.display_name(), &tenant.name),
            QuickReply::day_count_options(),
        );
        let delivered = ctx
            .send(
                SendKind::Push,
                &user.line_user_id,
                &[message],
                Some(LogTarget {
                    conn: &mut *conn,
                    user_id: user.id,
                }),
            )
            .await;
        if delivered {
            // Commit per user: a mid-sweep failure must not re-send to
            // already-notified users on the next tick.
            repo.mark_question_sent(&mut *conn, user.id).await?;
            notified += 1;
        } else {
            failed += 1;
        }
    }
    Ok((notified, failed))
}

#[derive(Debug, Serialize)]
pub struct SendNowResult {
    pub bot_id: String,
    pub line_user_id: String,
    pub delivered: bool,
}

/// Pushes the weekly question to every answer-pending user, with no
/// 7-day gate. Test endpoint only.
pub async fn send_now(state: &AppState) -> Result<Vec<SendNowResult>> {
    let Some(repo) = state.repo.as_deref() else {
        warn!("send-now skipped: database unavailable");
        return Ok(Vec::new());
    };

    let mut results = Vec::new();
    for ctx in state.registry.iter() {
        let mut conn = repo.pool().acquire().await?;
        let Some(tenant) = repo.tenant_by_bot_id(&mut *conn, &ctx.bot_id).await? else {
            continue;
        };
        let users = repo.answer_pending(&mut *conn, tenant.id).await?;
        for user in users {
            let message = Message::text_with_quick_reply(
                replies::weekly_reminder(user.display_name(), &tenant.name),
                QuickReply::day_count_options(),
            );
            let delivered = ctx
                .send(
                    SendKind::Push,
                    &user.line_user_id,
                    &[message],
                    Some(LogTarget {
                        conn: &mut *conn,
                        user_id: user.id,
                    }),
                )
                .await;
            if delivered {
                repo.mark_question_sent(&mut *conn, user.id).await?;
            }
            results.push(SendNowResult {
                bot_id: ctx.bot_id.clone(),
                line_user_id: user.line_user_id.clone(),
                delivered,
            });
        }
    }
    Ok(results)
}
