//! Server configuration read from the environment.
//!
//! Every setting has a default except `DATABASE_URL` and `JWT_SECRET`.

use std::str::FromStr;

use nsccore::token::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, MIN_SECRET_LEN};
use nsccore::withdrawal::WithdrawalPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// SMTP relay settings; absent when `SMTP_HOST` is unset.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Bootstrap administrator created on first start.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_pool_size: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub access_token_ttl: u64,
    pub refresh_token_ttl: u64,
    pub roi_interval_secs: u64,
    pub roi_batch_size: i64,
    pub bot_activation_fee_cents: i64,
    pub withdrawal: WithdrawalPolicy,
    pub password_reset_ttl_minutes: i64,
    pub app_name: String,
    pub app_base_url: String,
    pub secure_cookies: bool,
    pub smtp: Option<SmtpConfig>,
    pub admin: Option<AdminBootstrap>,
    pub use_tls: bool,
    pub tls_cert: String,
    pub tls_key: String,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

/// Reject values below `min`
fn at_least<T>(key: &'static str, value: T, min: T) -> Result<T, ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be at least {min}, got {value}"),
        });
    }
    Ok(value)
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let withdrawal = WithdrawalPolicy {
            min_amount_cents: at_least(
                "WITHDRAWAL_MIN_CENTS",
                parse_or(&lookup, "WITHDRAWAL_MIN_CENTS", 1_000)?,
                0,
            )?,
            fee_bps: parse_or(&lookup, "WITHDRAWAL_FEE_BPS", 500)?,
            cooldown_days: at_least(
                "WITHDRAWAL_COOLDOWN_DAYS",
                parse_or(&lookup, "WITHDRAWAL_COOLDOWN_DAYS", 30)?,
                0,
            )?,
        };
        if !(0..=10_000).contains(&withdrawal.fee_bps) {
            return Err(ConfigError::Invalid {
                key: "WITHDRAWAL_FEE_BPS",
                reason: "must be within 0..=10000".to_string(),
            });
        }

        let smtp = match lookup("SMTP_HOST").filter(|v| !v.trim().is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587)?,
                username: lookup("SMTP_USERNAME").filter(|v| !v.is_empty()),
                password: lookup("SMTP_PASSWORD").filter(|v| !v.is_empty()),
                from: required(&lookup, "SMTP_FROM")?,
            }),
            None => None,
        };

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap { email, password })
            }
            _ => None,
        };

        let roi_interval_secs = at_least(
            "ROI_INTERVAL_SECS",
            parse_or(&lookup, "ROI_INTERVAL_SECS", 300u64)?,
            1,
        )?;

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            db_pool_size: at_least("DB_POOL_SIZE", parse_or(&lookup, "DB_POOL_SIZE", 10)?, 1)?,
            bind_addr: string_or(&lookup, "BIND_ADDR", "0.0.0.0:8080"),
            jwt_secret,
            access_token_ttl: at_least(
                "ACCESS_TOKEN_TTL",
                parse_or(&lookup, "ACCESS_TOKEN_TTL", DEFAULT_ACCESS_TTL_SECS)?,
                1,
            )?,
            refresh_token_ttl: at_least(
                "REFRESH_TOKEN_TTL",
                parse_or(&lookup, "REFRESH_TOKEN_TTL", DEFAULT_REFRESH_TTL_SECS)?,
                1,
            )?,
            roi_interval_secs,
            roi_batch_size: at_least("ROI_BATCH_SIZE", parse_or(&lookup, "ROI_BATCH_SIZE", 500)?, 1)?,
            bot_activation_fee_cents: at_least(
                "BOT_ACTIVATION_FEE_CENTS",
                parse_or(&lookup, "BOT_ACTIVATION_FEE_CENTS", 1_000)?,
                1,
            )?,
            withdrawal,
            password_reset_ttl_minutes: at_least(
                "PASSWORD_RESET_TTL_MINUTES",
                parse_or(&lookup, "PASSWORD_RESET_TTL_MINUTES", 60)?,
                1,
            )?,
            app_name: string_or(&lookup, "APP_NAME", "NSC Bot"),
            app_base_url: string_or(&lookup, "APP_BASE_URL", "http://localhost:3000"),
            secure_cookies: parse_or(&lookup, "SECURE_COOKIES", false)?,
            smtp,
            admin,
            use_tls: parse_or(&lookup, "USE_TLS", false)?,
            tls_cert: string_or(&lookup, "TLS_CERT", "cert.pem"),
            tls_key: string_or(&lookup, "TLS_KEY", "key.pem"),
        })
    }
}
