// Process configuration, read from the environment (and `.env` via dotenv).
//
// Required:
// - BOT_TOKEN
//
// Optional:
// - DATABASE_PATH (default data/moderation.db)
// - OWNER_ID (0 or unset means no owner)
// - LOG_LEVEL (tracing filter, default info)
// - BIO_CACHE_TTL_SECS, BIO_VIOLATION_THROTTLE_SECS, WARNING_THRESHOLD,
//   TRANSPORT_TIMEOUT_SECS, EDIT_DELETE_DELAY_SECS

use crate::core::moderation::ModerationConfig;
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DATABASE_PATH: &str = "data/moderation.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_path: String,
    pub owner_id: Option<u64>,
    pub log_level: String,
    pub moderation: ModerationConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any name -> value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .context("Missing BOT_TOKEN environment variable")?;

        let database_path = lookup("DATABASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let owner_id = parse_var::<u64, _>(&lookup, "OWNER_ID")?.filter(|id| *id != 0);

        let log_level = lookup("LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let defaults = ModerationConfig::default();
        let warning_threshold =
            parse_var(&lookup, "WARNING_THRESHOLD")?.unwrap_or(defaults.warning_threshold);
        if warning_threshold == 0 {
            bail!("WARNING_THRESHOLD must be at least 1");
        }

        let transport_timeout =
            seconds_var(&lookup, "TRANSPORT_TIMEOUT_SECS")?.unwrap_or(defaults.transport_timeout);
        if transport_timeout.is_zero() {
            bail!("TRANSPORT_TIMEOUT_SECS must be at least 1");
        }

        let moderation = ModerationConfig {
            bio_cache_ttl: seconds_var(&lookup, "BIO_CACHE_TTL_SECS")?
                .unwrap_or(defaults.bio_cache_ttl),
            bio_violation_throttle: seconds_var(&lookup, "BIO_VIOLATION_THROTTLE_SECS")?
                .unwrap_or(defaults.bio_violation_throttle),
            warning_threshold,
            transport_timeout,
            edit_delete_delay: seconds_var(&lookup, "EDIT_DELETE_DELAY_SECS")?
                .unwrap_or(defaults.edit_delete_delay),
            bot_user_id: None,
        };

        Ok(Self {
            bot_token,
            database_path,
            owner_id,
            log_level,
            moderation,
        })
    }

    /// Tracing filter for LOG_LEVEL. An unparsable directive falls back to info.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", name, raw))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

fn seconds_var<F>(lookup: &F, name: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_var::<u64, _>(lookup, name)?.map(Duration::from_secs))
}
