use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono::TimeDelta;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl: TimeDelta,
    pub lookup_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET missing")?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes"
            ));
        }

        let token_ttl_minutes: i64 = parse_or(&lookup, "TOKEN_TTL_MINUTES", 60 * 24 * 7)?;
        let token_ttl = TimeDelta::try_minutes(token_ttl_minutes)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or_else(|| {
                anyhow!("TOKEN_TTL_MINUTES must be a positive number of minutes, got {token_ttl_minutes}")
            })?;
        let lookup_timeout =
            Duration::from_millis(parse_or(&lookup, "PRINCIPAL_LOOKUP_TIMEOUT_MS", 2_000u64)?);

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            jwt_secret,
            token_ttl,
            lookup_timeout,
            cors_allowed_origins,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
