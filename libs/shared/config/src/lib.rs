use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PASSWORD_TOKEN_TTL_SECS: u64 = 72 * 60 * 60;
pub const DEFAULT_OTP_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_OTP_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_RESET_TOKEN_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_OTP_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";
/// 5 requests per second per client on the credential endpoints.
pub const DEFAULT_RATE_LIMIT_REPLENISH_MS: u64 = 200;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set; refusing to start without a signing secret")]
    MissingSecret,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    /// Lifetime of tokens handed out by email/password login and signup.
    pub password_token_ttl: Duration,
    /// Lifetime of tokens handed out after a successful OTP verification.
    pub otp_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub otp_sweep_interval: Duration,
    /// Time for one request slot to refill in the per-client limiter.
    pub rate_limit_replenish: Duration,
    pub rate_limit_burst: u32,
    pub server_addr: String,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests feed a map through here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let config = Self {
            jwt_secret,
            password_token_ttl: seconds(&lookup, "PASSWORD_TOKEN_TTL_SECS", DEFAULT_PASSWORD_TOKEN_TTL_SECS)?,
            otp_token_ttl: seconds(&lookup, "OTP_TOKEN_TTL_SECS", DEFAULT_OTP_TOKEN_TTL_SECS)?,
            otp_ttl: seconds(&lookup, "OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS)?,
            reset_token_ttl: seconds(&lookup, "RESET_TOKEN_TTL_SECS", DEFAULT_RESET_TOKEN_TTL_SECS)?,
            otp_sweep_interval: seconds(&lookup, "OTP_SWEEP_INTERVAL_SECS", DEFAULT_OTP_SWEEP_INTERVAL_SECS)?,
            rate_limit_replenish: Duration::from_millis(positive(
                &lookup,
                "RATE_LIMIT_REPLENISH_MS",
                DEFAULT_RATE_LIMIT_REPLENISH_MS,
            )?),
            rate_limit_burst: positive(&lookup, "RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?,
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| {
                warn!("SERVER_ADDR not set, using default {}", DEFAULT_SERVER_ADDR);
                DEFAULT_SERVER_ADDR.to_string()
            }),
            admin_emails: lookup("ADMIN_EMAILS")
                .map(|raw| {
                    raw.split(',')
                        .map(|email| email.trim().to_lowercase())
                        .filter(|email| !email.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(config)
    }

    /// Config with every default applied, for callers that only need to
    /// supply the secret (tests, embedded use).
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            password_token_ttl: Duration::from_secs(DEFAULT_PASSWORD_TOKEN_TTL_SECS),
            otp_token_ttl: Duration::from_secs(DEFAULT_OTP_TOKEN_TTL_SECS),
            otp_ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            reset_token_ttl: Duration::from_secs(DEFAULT_RESET_TOKEN_TTL_SECS),
            otp_sweep_interval: Duration::from_secs(DEFAULT_OTP_SWEEP_INTERVAL_SECS),
            rate_limit_replenish: Duration::from_millis(DEFAULT_RATE_LIMIT_REPLENISH_MS),
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            admin_emails: Vec::new(),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    positive(lookup, key, default).map(Duration::from_secs)
}

/// Reads a strictly positive integer, falling back to `default` when unset.
fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .filter(|value| *value > T::default())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => {
            warn!("{} not set, using default of {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingSecret);
    }

    #[test]
    fn test_blank_secret_is_fatal() {
        let result = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "   ")]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingSecret);
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.password_token_ttl, Duration::from_secs(3 * 24 * 3600));
        assert_eq!(config.otp_token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.otp_ttl, Duration::from_secs(300));
        assert_eq!(config.reset_token_ttl, Duration::from_secs(900));
        assert_eq!(config.rate_limit_replenish, Duration::from_millis(200));
        assert_eq!(config.rate_limit_burst, 5);
        assert_eq!(config.server_addr, "0.0.0.0:3000");
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn test_overrides_and_admin_emails() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("OTP_TTL_SECS", "60"),
            ("ADMIN_EMAILS", "Root@Example.com, ops@example.com ,"),
        ]))
        .unwrap();

        assert_eq!(config.otp_ttl, Duration::from_secs(60));
        assert_eq!(config.admin_emails, vec!["root@example.com", "ops@example.com"]);
        assert!(config.is_admin_email("ROOT@example.com"));
        assert!(!config.is_admin_email("user@example.com"));
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("OTP_TOKEN_TTL_SECS", "soon"),
        ]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                key: "OTP_TOKEN_TTL_SECS".to_string(),
                value: "soon".to_string(),
            }
        );
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("OTP_TTL_SECS", "0"),
        ]));

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rate_limit_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("RATE_LIMIT_REPLENISH_MS", "1000"),
            ("RATE_LIMIT_BURST", "10"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limit_replenish, Duration::from_secs(1));
        assert_eq!(config.rate_limit_burst, 10);

        for (key, value) in [("RATE_LIMIT_BURST", "0"), ("RATE_LIMIT_BURST", "-1"), ("RATE_LIMIT_REPLENISH_MS", "fast")] {
            let result = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret"), (key, value)]));
            assert!(matches!(result, Err(ConfigError::InvalidValue { .. })), "{}={}", key, value);
        }
    }
}
