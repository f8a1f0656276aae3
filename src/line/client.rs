//! Outbound transport for one tenant's LINE channel: reply/push with
//! bounded retry and exponential backoff, plus the best-effort profile
//! lookup. Reply-token dedup lives one level up in `TenantContext` so
//! a reused token never reaches this client.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::models::LogKind;
use crate::database::repository;
use crate::line::messages::Message;

const API_BASE: &str = "https://api.line.me/v2/bot";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 2;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// Single-use reply token.
    Reply,
    /// Durable user id, reuse unrestricted.
    Push,
}

impl SendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SendKind::Reply => "reply",
            SendKind::Push => "push",
        }
    }
}

/// Where to mirror delivery attempts in the activity log. Optional:
/// transport can be used without a resolved user.
pub struct LogTarget<'a> {
    pub conn: &'a mut PgConnection,
    pub user_id: i32,
}

pub struct LineClient {
    http: Client,
    access_token: String,
}

impl LineClient {
    pub fn new(access_token: String) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            access_token,
        }
    }

    /// Sends a message batch. Transient network failures and API-level
    /// errors both get the same bounded retry with exponential backoff;
    /// after the last attempt the delivery is reported as failed, never
    /// raised. Every attempt is mirrored into the activity log when a
    /// target is supplied.
    pub async fn send(
        &self,
        kind: SendKind,
        target: &str,
        messages: &[Message],
        mut log: Option<LogTarget<'_>>,
    ) -> bool {
        let (url, body) = match kind {
            SendKind::Reply => (
                format!("{API_BASE}/message/reply"),
                json!({"replyToken": target, "messages": messages}),
            ),
            SendKind::Push => (
                format!("{API_BASE}/message/push"),
                json!({"to": target, "messages": messages}),
            ),
        };
        let kinds: Vec<&str> = messages.iter().map(Message::kind).collect();

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(kind = kind.as_str(), attempt, ?kinds, "sending LINE message");
            let error_detail = match self
                .http
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    if let Some(t) = log.as_mut() {
                        let content = match kind {
                            SendKind::Reply => format!("Reply送信成功: {kinds:?}"),
                            SendKind::Push => "Push送信成功".to_string(),
                        };
                        repository::log_activity_silent(&mut *t.conn, t.user_id, LogKind::Sent, &content)
                            .await;
                    }
                    return true;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    format!("API error ({status}): {body}")
                }
                Err(e) => format!("Network error: {e}"),
            };

            let wait = BACKOFF_BASE_SECS.pow(attempt);
            warn!(
                kind = kind.as_str(),
                attempt, wait, "{} attempt failed: {}", kind.as_str(), error_detail
            );
            if let Some(t) = log.as_mut() {
                let content =
                    format!("{} attempt {attempt} failed: {error_detail}", kind.as_str());
                repository::log_activity_silent(&mut *t.conn, t.user_id, LogKind::Error, &content)
                    .await;
            }
            if attempt == MAX_ATTEMPTS {
                return false;
            }
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
        false
    }

    /// Best-effort profile display-name lookup. Failures are logged and
    /// swallowed so a degraded profile API never blocks a transition.
    pub async fn get_profile(&self, user_id: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct Profile {
            #[serde(rename = "displayName")]
            display_name: String,
        }

        let url = format!("{API_BASE}/profile/{user_id}");
        let resp = match self.http.get(&url).bearer_auth(&self.access_token).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(status = %resp.status(), "profile lookup rejected");
                return None;
            }
            Err(e) => {
                warn!("profile lookup failed: {e}");
                return None;
            }
        };
        match resp.json::<Profile>().await {
            Ok(p) => Some(p.display_name),
            Err(e) => {
                warn!("profile response parse failed: {e}");
                None
            }
        }
    }
}
