use anyhow::Context;
use serde::Deserialize;
use std::ops::RangeInclusive;

/// One year.
pub const SESSION_TTL_RANGE: RangeInclusive<i64> = 1..=525_600;
/// One week.
pub const LOCKOUT_MINUTES_RANGE: RangeInclusive<i64> = 1..=10_080;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Automatic lockout is off unless a threshold is configured.
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    pub threshold: Option<i32>,
    pub minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub session: SessionConfig,
    pub lockout: LockoutConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("NETLIFY_DATABASE_URL"))
            .context("DATABASE_URL is not set")?;
        let session = SessionConfig {
            secret: lookup("SESSION_SECRET").context("SESSION_SECRET is not set")?,
            issuer: lookup("SESSION_ISSUER").unwrap_or_else(|| "bustickets".into()),
            audience: lookup("SESSION_AUDIENCE").unwrap_or_else(|| "bustickets-web".into()),
            ttl_minutes: parse_in(&lookup, "SESSION_TTL_MINUTES", 60, SESSION_TTL_RANGE)?,
        };
        let lockout = LockoutConfig {
            threshold: parse_opt(&lookup, "LOCKOUT_THRESHOLD")?,
            minutes: parse_in(&lookup, "LOCKOUT_MINUTES", 15, LOCKOUT_MINUTES_RANGE)?,
        };
        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            session,
            lockout,
        })
    }
}

fn parse_opt<F, T>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("invalid {key} value: {v}")))
        .transpose()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_in<F>(
    lookup: &F,
    key: &str,
    default: i64,
    range: RangeInclusive<i64>,
) -> anyhow::Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !range.contains(&value) {
        anyhow::bail!(
            "{key} must be between {} and {} minutes, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(value)
}
