use async_trait::async_trait;
use tracing::debug;

use shared_models::error::AppError;

/// Out-of-band channel (SMS gateway, mailer) for secrets that must reach the
/// account holder and never the HTTP caller.
#[async_trait]
pub trait CredentialDelivery: Send + Sync {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), AppError>;

    async fn send_reset_token(&self, email: &str, token: &str) -> Result<(), AppError>;
}

/// Development sink: writes everything to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

#[async_trait]
impl CredentialDelivery for LogDelivery {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), AppError> {
        debug!("OTP for {}: {}", phone, code);
        Ok(())
    }

    async fn send_reset_token(&self, email: &str, token: &str) -> Result<(), AppError> {
        debug!("Password reset token for {}: {}", email, token);
        Ok(())
    }
}
