use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::Account;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account persistence seen by the auth flows. Email lookups are
/// case-insensitive; phone numbers are matched verbatim after trimming.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, AppError>;

    /// Resolves a token subject, which is either an email or a phone number.
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, AppError> {
        match self.find_by_email(subject).await? {
            Some(account) => Ok(Some(account)),
            None => self.find_by_phone(subject).await,
        }
    }

    /// Fails with `Conflict` when the email or phone is already taken.
    async fn insert(&self, account: Account) -> Result<Account, AppError>;

    async fn update_password(&self, email: &str, password_hash: String) -> Result<(), AppError>;

    async fn mark_phone_verified(&self, phone: &str) -> Result<Option<Account>, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let email = normalize_email(email);
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, AppError> {
        let phone = phone.trim();
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn insert(&self, mut account: Account) -> Result<Account, AppError> {
        account.email = account.email.as_deref().map(normalize_email);
        account.phone = account.phone.as_deref().map(|phone| phone.trim().to_string());

        let mut accounts = self.accounts.write().await;

        let taken = accounts.values().any(|existing| {
            (account.email.is_some() && existing.email == account.email)
                || (account.phone.is_some() && existing.phone == account.phone)
        });
        if taken {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        debug!("Created account {}", account.id);
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_password(&self, email: &str, password_hash: String) -> Result<(), AppError> {
        let email = normalize_email(email);
        let mut accounts = self.accounts.write().await;

        let account = accounts
            .values_mut()
            .find(|account| account.email.as_deref() == Some(email.as_str()))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        account.password_hash = Some(password_hash);
        Ok(())
    }

    async fn mark_phone_verified(&self, phone: &str) -> Result<Option<Account>, AppError> {
        let phone = phone.trim();
        let mut accounts = self.accounts.write().await;

        Ok(accounts
            .values_mut()
            .find(|account| account.phone.as_deref() == Some(phone))
            .map(|account| {
                account.is_verified = true;
                account.clone()
            }))
    }
}
