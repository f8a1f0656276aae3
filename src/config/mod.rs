use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::services::progression::GradeBucket;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub media: MediaConfig,
    #[serde(skip)]
    pub single_tenant: SingleTenantConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Taken from DATABASE_URL; absence degrades the process instead
    /// of killing it.
    #[serde(default)]
    pub url: Option<String>,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub sweep_interval_hours: u64,
    pub reminder_after_days: i64,
    pub statement_timeout_secs: u32,
}

/// Legacy /callback routing for the pre-multi-tenant deployment.
#[derive(Debug, Clone, Default)]
pub struct SingleTenantConfig {
    pub enabled: bool,
    pub default_bot_id: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        if let Ok(url) = env::var("DATABASE_URL") {
            settings.database.url = Some(url);
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                settings.server.port = port;
            }
        }
        settings.single_tenant = SingleTenantConfig {
            enabled: env::var("SINGLE_TENANT_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            default_bot_id: env::var("DEFAULT_BOT_ID").unwrap_or_default(),
        };

        settings.media.validate()?;
        Ok(settings)
    }
}

/// Per-week media resources, one set per grade pair.
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub ab: WeekMediaSet,
    pub cd: WeekMediaSet,
}

impl MediaConfig {
    pub fn for_bucket(&self, bucket: GradeBucket) -> &WeekMediaSet {
        match bucket {
            GradeBucket::Ab => &self.ab,
            GradeBucket::Cd => &self.cd,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ab.validate("media.ab")?;
        self.cd.validate("media.cd")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeekMediaSet {
    pub videos: Vec<String>,
    pub thumbnails: Vec<String>,
    pub images: Vec<String>,
}

/// Resources for one delivered week.
#[derive(Debug, Clone, Copy)]
pub struct WeekMedia<'a> {
    pub video: &'a str,
    pub thumbnail: &'a str,
    pub image: &'a str,
}

impl WeekMediaSet {
    const WEEKS: usize = 12;

    fn validate(&self, section: &str) -> Result<()> {
        for (name, list) in [
            ("videos", &self.videos),
            ("thumbnails", &self.thumbnails),
            ("images", &self.images),
        ] {
            if list.len() != Self::WEEKS {
                bail!(
                    "{section}.{name} must list exactly {} entries, got {}",
                    Self::WEEKS,
                    list.len()
                );
            }
        }
        Ok(())
    }

    /// Resources for a 1-based week number.
    pub fn week(&self, week: i32) -> Option<WeekMedia<'_>> {
        if !(1..=Self::WEEKS as i32).contains(&week) {
            return None;
        }
        let idx = (week - 1) as usize;
        Some(WeekMedia {
            video: self.videos.get(idx)?,
            thumbnail: self.thumbnails.get(idx)?,
            image: self.images.get(idx)?,
        })
    }
}

/// Credentials for one tenant's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantCredentials {
    pub bot_id: String,
    pub channel_secret: String,
    pub access_token: String,
    pub name: String,
}

/// Builds the tenant list: COMPANY{n}_* variables first, then a
/// BOT_CONFIGS JSON blob merged in without overriding them, then the
/// single-tenant legacy fallback when nothing else is configured.
pub fn load_tenant_credentials() -> Vec<TenantCredentials> {
    let mut tenants = Vec::new();

    for idx in 1..=9 {
        let secret = env::var(format!("COMPANY{idx}_CHANNEL_SECRET"));
        let token = env::var(format!("COMPANY{idx}_ACCESS_TOKEN"));
        if let (Ok(channel_secret), Ok(access_token)) = (secret, token) {
            let name = env::var(format!("COMPANY{idx}_NAME"))
                .unwrap_or_else(|_| format!("Company {idx}"));
            info!("loaded tenant company{idx}: {name}");
            tenants.push(TenantCredentials {
                bot_id: format!("company{idx}"),
                channel_secret,
                access_token,
                name,
            });
        }
    }

    if let Ok(raw) = env::var("BOT_CONFIGS") {
        match parse_bot_configs(&raw) {
            Ok(extra) => merge_tenants(&mut tenants, extra),
            Err(e) => warn!("failed to parse BOT_CONFIGS: {e}"),
        }
    }

    if tenants.is_empty() {
        if let Some(legacy) = legacy_single_tenant() {
            info!("no multi-tenant config, using single-tenant fallback");
            tenants.push(legacy);
        }
    }

    tenants
}

/// Parses the BOT_CONFIGS JSON blob:
/// {"bot_id": {"channel_secret": "...", "access_token": "...", "name": "..."}}
pub fn parse_bot_configs(raw: &str) -> Result<Vec<TenantCredentials>, serde_json::Error> {
    #[derive(Deserialize)]
    struct Entry {
        channel_secret: String,
        access_token: String,
        #[serde(default)]
        name: Option<String>,
    }

    let map: std::collections::BTreeMap<String, Entry> = serde_json::from_str(raw)?;
    Ok(map
        .into_iter()
        .map(|(bot_id, entry)| TenantCredentials {
            name: entry.name.unwrap_or_else(|| format!("企業 {bot_id}")),
            channel_secret: entry.channel_secret,
            access_token: entry.access_token,
            bot_id,
        })
        .collect())
}

/// Individually-sourced tenants win over JSON-sourced duplicates.
pub fn merge_tenants(tenants: &mut Vec<TenantCredentials>, extra: Vec<TenantCredentials>) {
    for tenant in extra {
        if tenants.iter().any(|t| t.bot_id == tenant.bot_id) {
            continue;
        }
        info!("loaded tenant {} from BOT_CONFIGS", tenant.bot_id);
        tenants.push(tenant);
    }
}

fn legacy_single_tenant() -> Option<TenantCredentials> {
    let enabled = env::var("SINGLE_TENANT_MODE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !enabled {
        return None;
    }
    let bot_id = env::var("DEFAULT_BOT_ID").ok().filter(|v| !v.is_empty())?;
    Some(TenantCredentials {
        bot_id,
        channel_secret: env::var("LINE_CHANNEL_SECRET").unwrap_or_default(),
        access_token: env::var("LINE_ACCESS_TOKEN").unwrap_or_default(),
        name: "デフォルト企業".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(bot_id: &str, secret: &str) -> TenantCredentials {
        TenantCredentials {
            bot_id: bot_id.into(),
            channel_secret: secret.into(),
            access_token: "token".into(),
            name: format!("name-{bot_id}"),
        }
    }

    #[test]
    fn bot_configs_json_parses_with_name_default() {
        let raw = r#"{
            "clinic-a": {"channel_secret": "s1", "access_token": "t1", "name": "クリニックA"},
            "clinic-b": {"channel_secret": "s2", "access_token": "t2"}
        }"#;
        let parsed = parse_bot_configs(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].bot_id, "clinic-a");
        assert_eq!(parsed[0].name, "クリニックA");
        assert_eq!(parsed[1].name, "企業 clinic-b");
        assert!(parse_bot_configs("not json").is_err());
    }

    #[test]
    fn env_sourced_tenants_win_over_json_duplicates() {
        let mut tenants = vec![creds("company1", "env-secret")];
        merge_tenants(
            &mut tenants,
            vec![creds("company1", "json-secret"), creds("company2", "s2")],
        );
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].channel_secret, "env-secret");
        assert_eq!(tenants[1].bot_id, "company2");
    }

    fn media_set(n: usize) -> WeekMediaSet {
        let list = |prefix: &str| (1..=n).map(|w| format!("{prefix}{w}")).collect();
        WeekMediaSet {
            videos: list("v"),
            thumbnails: list("t"),
            images: list("i"),
        }
    }

    #[test]
    fn week_media_indexing_is_one_based_and_bounded() {
        let set = media_set(12);
        let w1 = set.week(1).unwrap();
        assert_eq!(w1.video, "v1");
        let w12 = set.week(12).unwrap();
        assert_eq!(w12.image, "i12");
        assert!(set.week(0).is_none());
        assert!(set.week(13).is_none());
    }

    #[test]
    fn media_validation_requires_twelve_entries() {
        assert!(media_set(12).validate("media.ab").is_ok());
        assert!(media_set(11).validate("media.ab").is_err());
    }
}
