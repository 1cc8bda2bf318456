use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::clock::{system_clock, SharedClock};
use shared_utils::jwt::TokenAuthority;
use shared_utils::otp::OtpStore;

use crate::services::{AccountStore, InMemoryAccountStore, LogDelivery, CredentialDelivery};

/// Everything the auth handlers share. Built once at startup and handed to
/// the router behind an `Arc`.
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenAuthority>,
    pub otps: Arc<OtpStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub delivery: Arc<dyn CredentialDelivery>,
}

impl AuthState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_parts(
            config,
            system_clock(),
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(LogDelivery),
        )
    }

    pub fn with_parts(
        config: Arc<AppConfig>,
        clock: SharedClock,
        accounts: Arc<dyn AccountStore>,
        delivery: Arc<dyn CredentialDelivery>,
    ) -> Self {
        let tokens = Arc::new(TokenAuthority::new(config.jwt_secret.as_bytes(), clock.clone()));
        let otps = Arc::new(OtpStore::new(config.otp_ttl, clock));

        Self {
            config,
            tokens,
            otps,
            accounts,
            delivery,
        }
    }
}
