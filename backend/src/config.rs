use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr, ops::RangeInclusive, str::FromStr};

/// One year.
pub const ACCESS_TOKEN_TTL_MINUTES: RangeInclusive<u64> = 1..=525_600;
/// Ten years.
pub const REFRESH_TOKEN_EXPIRATION_DAYS: RangeInclusive<u64> = 1..=3_650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// Symmetric HMAC key. Token issuance fails while this is absent.
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_expiration_days: u64,
    /// Register organizers as already approved instead of waiting for an admin.
    pub organizer_auto_approve: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            jwt_secret: None,
            jwt_issuer: "ticketing-backend".to_string(),
            jwt_audience: "ticketing-client".to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_expiration_days: 7,
            organizer_auto_approve: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, falling back to
    /// [`Config::default`] for unset keys.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            database_url: text("DATABASE_URL"),
            bind_addr: parse_or(&lookup, "APP_ADDR", defaults.bind_addr)?,
            jwt_secret: text("JWT_SECRET"),
            jwt_issuer: text("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: text("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            access_token_ttl_minutes: parse_in_range(
                &lookup,
                "ACCESS_TOKEN_TTL_MINUTES",
                defaults.access_token_ttl_minutes,
                ACCESS_TOKEN_TTL_MINUTES,
            )?,
            refresh_token_expiration_days: parse_in_range(
                &lookup,
                "REFRESH_TOKEN_EXPIRATION_DAYS",
                defaults.refresh_token_expiration_days,
                REFRESH_TOKEN_EXPIRATION_DAYS,
            )?,
            organizer_auto_approve: parse_or(
                &lookup,
                "ORGANIZER_AUTO_APPROVE",
                defaults.organizer_auto_approve,
            )?,
            admin_email: text("ADMIN_EMAIL"),
            admin_password: text("ADMIN_PASSWORD"),
        })
    }

    /// Values outside [`ACCESS_TOKEN_TTL_MINUTES`] are clamped to its bounds.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(clamp(self.access_token_ttl_minutes, &ACCESS_TOKEN_TTL_MINUTES))
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(clamp(
            self.refresh_token_expiration_days,
            &REFRESH_TOKEN_EXPIRATION_DAYS,
        ))
    }
}

fn clamp(value: u64, range: &RangeInclusive<u64>) -> i64 {
    // Both bounds are far below i64::MAX.
    value.clamp(*range.start(), *range.end()) as i64
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", key, raw)),
        _ => Ok(default),
    }
}

fn parse_in_range<F>(
    lookup: &F,
    key: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !range.contains(&value) {
        anyhow::bail!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}
