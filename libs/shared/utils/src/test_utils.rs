use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shared_config::AppConfig;
use shared_models::auth::Role;

use crate::clock::Clock;
use crate::jwt::TokenAuthority;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct TestConfig {
    pub jwt_secret: String,
    pub admin_emails: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            admin_emails: vec!["admin@example.com".to_string()],
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::with_secret(self.jwt_secret.clone());
        config.admin_emails = self.admin_emails.clone();
        // Flows under test make more calls per client than production allows.
        config.rate_limit_burst = 1_000;
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub subject: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::user("test@example.com")
    }
}

impl TestUser {
    pub fn new(subject: &str, role: Role) -> Self {
        Self {
            subject: subject.to_string(),
            role,
        }
    }

    pub fn user(subject: &str) -> Self {
        Self::new(subject, Role::User)
    }

    pub fn admin(subject: &str) -> Self {
        Self::new(subject, Role::Admin)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, authority: &TokenAuthority, exp_hours: Option<u64>) -> String {
        let ttl = Duration::from_secs(exp_hours.unwrap_or(24) * 3600);
        authority
            .issue(&user.subject, user.role, ttl)
            .expect("test token should issue")
    }

    /// Signs arbitrary header and claims JSON with `secret`, bypassing every
    /// check `TokenAuthority::issue` applies.
    pub fn forge_token(header: &serde_json::Value, claims: &serde_json::Value, secret: &str) -> String {
        let header_encoded = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = URL_SAFE_NO_PAD.encode(claims.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Replaces the character at `index` with a different base64url character.
    pub fn tamper_at(token: &str, index: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).expect("token is ascii")
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
