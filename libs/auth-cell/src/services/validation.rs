use std::sync::OnceLock;

use regex::Regex;

use shared_models::error::AppError;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[1-9]\d{6,14}$").expect("phone pattern compiles"))
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.len() > 254 || !email_regex().is_match(email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

/// E.164-ish: optional `+`, no leading zero, 7 to 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    if !phone_regex().is_match(phone.trim()) {
        return Err(AppError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(())
}

pub fn require_field(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails() {
        assert!(validate_email("u@example.com").is_ok());
        assert!(validate_email(" farmer.one+mandi@krishi.co.in ").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_phones() {
        assert!(validate_phone("+911234567890").is_ok());
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("+0123456789").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("98765-43210").is_err());
    }

    #[test]
    fn test_require_field() {
        assert!(require_field("Ramesh", "name").is_ok());
        assert!(require_field("   ", "name").is_err());
    }
}
