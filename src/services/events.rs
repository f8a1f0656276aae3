//! Webhook event processing. Each inbound event runs as one
//! transactional unit: log the input, resolve or create the user,
//! classify, mutate, reply, log the outcome. Any failure rolls the
//! whole unit back; the webhook still acknowledges upstream.

use anyhow::Result;
use sqlx::PgConnection;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::database::models::{LogKind, User};
use crate::database::{repository, Repository};
use crate::line::client::{LogTarget, SendKind};
use crate::line::events::{MessageContent, WebhookEvent};
use crate::line::messages::Message;
use crate::services::progression::{classify, on_day_count, DayCountOutcome, Inbound, StateSnapshot};
use crate::services::replies;
use crate::tenant::TenantContext;

pub async fn handle_event(
    ctx: &TenantContext,
    repo: &Repository,
    settings: &Settings,
    event: &WebhookEvent,
) -> Result<()> {
    match event {
        WebhookEvent::Follow { reply_token, source } => {
            let Some(user_id) = source.user_id.as_deref() else {
                return Ok(());
            };
            handle_follow(ctx, repo, reply_token, user_id).await
        }
        WebhookEvent::Message {
            reply_token,
            source,
            message: MessageContent::Text { text },
        } => {
            let Some(user_id) = source.user_id.as_deref() else {
                return Ok(());
            };
            handle_message(ctx, repo, settings, reply_token, user_id, text).await
        }
        _ => Ok(()),
    }
}

/// Friend-add event: register or greet, welcome message either way.
async fn handle_follow(
    ctx: &TenantContext,
    repo: &Repository,
    reply_token: &str,
    line_user_id: &str,
) -> Result<()> {
    debug!(bot_id = %ctx.bot_id, line_user_id, "processing follow event");
    let mut tx = repo.pool().begin().await?;

    let Some(tenant) = repo.tenant_by_bot_id(&mut *tx, &ctx.bot_id).await? else {
        warn!(bot_id = %ctx.bot_id, "tenant record missing");
        return Ok(());
    };

    match repo.find_user(&mut *tx, tenant.id, line_user_id).await? {
        None => {
            let profile_name = ctx.client.get_profile(line_user_id).await;
            let user = repo
                .create_user(&mut *tx, tenant.id, line_user_id, profile_name.as_deref())
                .await?;
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::System,
                &format!("新規ユーザー登録: {}", user.display_name()),
            )
            .await?;
            let text = replies::welcome_new(user.display_name(), &tenant.name);
            let delivered = ctx
                .send(
                    SendKind::Reply,
                    reply_token,
                    &[Message::text(text)],
                    Some(LogTarget {
                        conn: &mut *tx,
                        user_id: user.id,
                    }),
                )
                .await;
            if delivered {
                repository::log_activity(
                    &mut *tx,
                    user.id,
                    LogKind::Sent,
                    "ウェルカムメッセージ送信",
                )
                .await?;
            }
        }
        Some(user) => {
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::System,
                &format!("既存ユーザー: {}", user.display_name()),
            )
            .await?;
            let text = replies::welcome_back(user.display_name(), &tenant.name);
            ctx.send(
                SendKind::Reply,
                reply_token,
                &[Message::text(text)],
                Some(LogTarget {
                    conn: &mut *tx,
                    user_id: user.id,
                }),
            )
            .await;
        }
    }

    tx.commit().await?;
    Ok(())
}

async fn handle_message(
    ctx: &TenantContext,
    repo: &Repository,
    settings: &Settings,
    reply_token: &str,
    line_user_id: &str,
    text: &str,
) -> Result<()> {
    debug!(bot_id = %ctx.bot_id, line_user_id, "processing message event");
    let text = text.trim();
    let mut tx = repo.pool().begin().await?;

    let Some(tenant) = repo.tenant_by_bot_id(&mut *tx, &ctx.bot_id).await? else {
        warn!(bot_id = %ctx.bot_id, "tenant record missing");
        return Ok(());
    };

    let mut user = match repo.find_user(&mut *tx, tenant.id, line_user_id).await? {
        Some(user) => user,
        None => {
            let profile_name = ctx.client.get_profile(line_user_id).await;
            let user = repo
                .create_user(&mut *tx, tenant.id, line_user_id, profile_name.as_deref())
                .await?;
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::System,
                "新規ユーザー登録（メッセージ受信時）",
            )
            .await?;
            user
        }
    };

    match classify(text) {
        Inbound::Grade(grade) => {
            let display_name = refresh_display_name(ctx, repo, &mut *tx, &mut user).await?;
            repo.record_grade(&mut *tx, user.id, grade).await?;
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::Received,
                &format!("足健診結果: {}", grade.as_str()),
            )
            .await?;
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::System,
                &format!("足健診結果を{}に更新、0週目に設定", grade.as_str()),
            )
            .await?;

            // No video at grading time; the first package follows the
            // first weekly answer.
            let delivered = ctx
                .send(
                    SendKind::Reply,
                    reply_token,
                    &[Message::text(replies::grade_ack(&display_name))],
                    Some(LogTarget {
                        conn: &mut *tx,
                        user_id: user.id,
                    }),
                )
                .await;
            if delivered {
                repository::log_activity(
                    &mut *tx,
                    user.id,
                    LogKind::Sent,
                    "足健診結果受付メッセージ送信",
                )
                .await?;
            }
        }
        Inbound::DayCount => {
            let display_name = refresh_display_name(ctx, repo, &mut *tx, &mut user).await?;
            let snapshot = StateSnapshot {
                grade: user.grade(),
                current_week: user.current_week,
            };
            match on_day_count(&snapshot, text) {
                DayCountOutcome::NeedGradeFirst => {
                    let delivered = ctx
                        .send(
                            SendKind::Reply,
                            reply_token,
                            &[Message::text(replies::need_grade_first(&display_name))],
                            Some(LogTarget {
                                conn: &mut *tx,
                                user_id: user.id,
                            }),
                        )
                        .await;
                    if delivered {
                        repository::log_activity(
                            &mut *tx,
                            user.id,
                            LogKind::Sent,
                            "足健診結果入力リクエスト",
                        )
                        .await?;
                    }
                }
                DayCountOutcome::Anomalous => {
                    // Reply intentionally suppressed, state untouched.
                    repository::log_activity(
                        &mut *tx,
                        user.id,
                        LogKind::Error,
                        &format!("想定外の運動回数: {text}"),
                    )
                    .await?;
                }
                DayCountOutcome::Advance {
                    grade,
                    bucket,
                    week_sent,
                    next_week,
                } => {
                    let days = bucket.days();
                    repo.record_response(&mut *tx, user.id, days).await?;
                    repository::log_activity(
                        &mut *tx,
                        user.id,
                        LogKind::Received,
                        &format!("運動回数: {text}"),
                    )
                    .await?;
                    repository::log_activity(
                        &mut *tx,
                        user.id,
                        LogKind::System,
                        &format!("運動日数を{days}に更新、{week_sent}週目の動画を送信"),
                    )
                    .await?;

                    let set = settings.media.for_bucket(grade.bucket());
                    let Some(media) = set.week(week_sent) else {
                        repository::log_activity(
                            &mut *tx,
                            user.id,
                            LogKind::Error,
                            &format!("{week_sent}週目のメディア設定がありません"),
                        )
                        .await?;
                        tx.commit().await?;
                        return Ok(());
                    };
                    let messages = [
                        Message::text(replies::day_count_ack(&display_name, bucket)),
                        Message::exercise_video_card(media.video, media.thumbnail),
                        Message::image(media.image),
                    ];
                    let delivered = ctx
                        .send(
                            SendKind::Reply,
                            reply_token,
                            &messages,
                            Some(LogTarget {
                                conn: &mut *tx,
                                user_id: user.id,
                            }),
                        )
                        .await;
                    if delivered {
                        repository::log_activity(
                            &mut *tx,
                            user.id,
                            LogKind::Sent,
                            &format!("運動メニュー動画送信（{week_sent}週目、{text}）"),
                        )
                        .await?;
                        repo.insert_history(&mut *tx, &user, days, text, week_sent, grade)
                            .await?;
                        repo.set_current_week(&mut *tx, user.id, next_week).await?;
                    }
                }
            }
        }
        Inbound::Other => {
            repository::log_activity(
                &mut *tx,
                user.id,
                LogKind::Received,
                &format!("一方的なメッセージ: {text}"),
            )
            .await?;
            let display_name = refresh_display_name(ctx, repo, &mut *tx, &mut user).await?;
            let delivered = ctx
                .send(
                    SendKind::Reply,
                    reply_token,
                    &[Message::text(replies::fallback(&display_name, &tenant.name))],
                    Some(LogTarget {
                        conn: &mut *tx,
                        user_id: user.id,
                    }),
                )
                .await;
            if delivered {
                repository::log_activity(
                    &mut *tx,
                    user.id,
                    LogKind::Sent,
                    "個別対応不可の案内メッセージ送信",
                )
                .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Opportunistic display-name refresh from the platform profile.
/// Lookup failure falls back to the stored name, then to the generic
/// placeholder.
async fn refresh_display_name(
    ctx: &TenantContext,
    repo: &Repository,
    conn: &mut PgConnection,
    user: &mut User,
) -> Result<String> {
    if let Some(name) = ctx.client.get_profile(&user.line_user_id).await {
        if !name.is_empty() && user.username.as_deref() != Some(name.as_str()) {
            repo.update_username(&mut *conn, user.id, &name).await?;
            debug!(user_id = user.id, "username refreshed: {name}");
            user.username = Some(name);
        }
    }
    Ok(user.display_name().to_string())
}
