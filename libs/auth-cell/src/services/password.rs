use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::OnceLock;

use tracing::{error, instrument};

use shared_models::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Hash with the same parameters as real ones, checked against when there is
/// no stored hash so a miss costs as much as a wrong password.
fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| {
        PasswordService::hash_password("no-account-placeholder").unwrap_or_else(|e| {
            error!("Failed to prepare placeholder hash: {}", e);
            String::new()
        })
    })
}

pub struct PasswordService;

impl PasswordService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// `Ok(false)` on a wrong password; `Err` only when the stored hash is unusable.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
        }
    }

    /// Login check. Runs a full argon2 verification whether or not an
    /// account (or its hash) exists; only a verified match returns true.
    pub fn verify_credentials(password: &str, stored: Option<&str>) -> bool {
        let (hash, known) = match stored {
            Some(hash) => (hash, true),
            None => (dummy_hash(), false),
        };

        match Self::verify_password(password, hash) {
            Ok(matched) => known && matched,
            Err(e) => {
                error!("Password check failed: {}", e);
                false
            }
        }
    }

    pub fn validate_new_password(password: &str) -> Result<(), AppError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::ValidationError(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordService::hash_password("kisan-1234").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(PasswordService::verify_password("kisan-1234", &hash).unwrap());
        assert!(!PasswordService::verify_password("kisan-12345", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let a = PasswordService::hash_password("same-password").unwrap();
        let b = PasswordService::hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(PasswordService::verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_placeholder_hash_matches_real_cost() {
        let placeholder = PasswordHash::new(dummy_hash()).unwrap();
        let real_hash = PasswordService::hash_password("kisan-1234").unwrap();
        let real = PasswordHash::new(&real_hash).unwrap();

        assert_eq!(placeholder.algorithm, real.algorithm);
        assert_eq!(placeholder.version, real.version);
        assert_eq!(placeholder.params, real.params);
    }

    #[test]
    fn test_verify_credentials() {
        let hash = PasswordService::hash_password("kisan-1234").unwrap();

        assert!(PasswordService::verify_credentials("kisan-1234", Some(&hash)));
        assert!(!PasswordService::verify_credentials("wrong-pass", Some(&hash)));
        assert!(!PasswordService::verify_credentials("kisan-1234", None));
        assert!(!PasswordService::verify_credentials("no-account-placeholder", None));
        assert!(!PasswordService::verify_credentials("kisan-1234", Some("not-a-phc-string")));
    }

    #[test]
    fn test_minimum_length() {
        assert!(PasswordService::validate_new_password("12345").is_err());
        assert!(PasswordService::validate_new_password("123456").is_ok());
    }
}
