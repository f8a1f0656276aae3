//! Per-tenant context: credentials, the channel client and the
//! reply-token guard, built once at startup and handed by reference to
//! every operation. Replaces any process-global per-tenant dictionaries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::TenantCredentials;
use crate::database::models::LogKind;
use crate::database::{repository, Repository};
use crate::line::client::{LineClient, LogTarget, SendKind};
use crate::line::messages::Message;

/// Upstream expires reply tokens quickly, so the guard only needs a
/// bounded recent window.
const MAX_TRACKED_TOKENS: usize = 500;

/// In-memory record of reply tokens already spent on this channel.
/// Trimmed to the newest half once the cap is exceeded.
#[derive(Default)]
pub struct ReplyTokenGuard {
    window: Mutex<TokenWindow>,
}

#[derive(Default)]
struct TokenWindow {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ReplyTokenGuard {
    /// Registers a token. Returns false when the token was already
    /// used, in which case the caller must not send.
    pub fn register(&self, token: &str) -> bool {
        let mut window = self.window.lock();
        if window.seen.contains(token) {
            return false;
        }
        window.seen.insert(token.to_string());
        window.order.push_back(token.to_string());
        if window.order.len() > MAX_TRACKED_TOKENS {
            while window.order.len() > MAX_TRACKED_TOKENS / 2 {
                if let Some(old) = window.order.pop_front() {
                    window.seen.remove(&old);
                }
            }
        }
        true
    }
}

pub struct TenantContext {
    pub bot_id: String,
    pub name: String,
    pub channel_secret: String,
    pub client: LineClient,
    reply_tokens: ReplyTokenGuard,
}

impl TenantContext {
    pub fn new(credentials: TenantCredentials) -> Self {
        Self {
            bot_id: credentials.bot_id,
            name: credentials.name,
            channel_secret: credentials.channel_secret,
            client: LineClient::new(credentials.access_token),
            reply_tokens: ReplyTokenGuard::default(),
        }
    }

    /// Sends through this tenant's channel. A reused reply token fails
    /// here, before the transport is ever invoked.
    pub async fn send(
        &self,
        kind: SendKind,
        target: &str,
        messages: &[Message],
        mut log: Option<LogTarget<'_>>,
    ) -> bool {
        if kind == SendKind::Reply && !self.reply_tokens.register(target) {
            let preview: String = target.chars().take(10).collect();
            warn!(bot_id = %self.bot_id, "attempt to reuse reply token: {preview}...");
            if let Some(t) = log.as_mut() {
                let content =
                    format!("Reply token reuse detected for bot {}: {preview}...", self.bot_id);
                repository::log_activity_silent(&mut *t.conn, t.user_id, LogKind::Error, &content)
                    .await;
            }
            return false;
        }
        self.client.send(kind, target, messages, log).await
    }
}

/// Maps bot identifiers to their contexts. Read-only after startup.
pub struct TenantRegistry {
    tenants: HashMap<String, Arc<TenantContext>>,
}

impl TenantRegistry {
    pub fn from_credentials(credentials: Vec<TenantCredentials>) -> Self {
        let tenants = credentials
            .into_iter()
            .map(|c| (c.bot_id.clone(), Arc::new(TenantContext::new(c))))
            .collect();
        Self { tenants }
    }

    pub fn resolve(&self, bot_id: &str) -> Option<Arc<TenantContext>> {
        self.tenants.get(bot_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TenantContext>> {
        self.tenants.values()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Upserts tenant rows so the database matches configuration:
    /// missing tenants created, renamed tenants corrected.
    pub async fn sync(&self, repo: &Repository) -> Result<()> {
        for ctx in self.tenants.values() {
            let tenant = repo.upsert_tenant(repo.pool(), &ctx.bot_id, &ctx.name).await?;
            info!(bot_id = %tenant.bot_id, name = %tenant.name, "tenant record ensured");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_reuse_is_refused() {
        let guard = ReplyTokenGuard::default();
        assert!(guard.register("tok-1"));
        assert!(!guard.register("tok-1"));
        assert!(guard.register("tok-2"));
    }

    #[test]
    fn token_window_trims_to_newest_half() {
        let guard = ReplyTokenGuard::default();
        for i in 0..=MAX_TRACKED_TOKENS {
            assert!(guard.register(&format!("tok-{i}")));
        }
        // Oldest tokens were evicted and may be registered again.
        assert!(guard.register("tok-0"));
        // The newest token is still tracked.
        assert!(!guard.register(&format!("tok-{MAX_TRACKED_TOKENS}")));
    }

    #[test]
    fn registry_resolves_by_bot_id() {
        let registry = TenantRegistry::from_credentials(vec![TenantCredentials {
            bot_id: "company1".into(),
            channel_secret: "secret".into(),
            access_token: "token".into(),
            name: "テスト企業".into(),
        }]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("company1").unwrap().name, "テスト企業");
        assert!(registry.resolve("company2").is_none());
    }
}
