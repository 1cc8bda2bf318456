use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_models::auth::{AuthUser, Role, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::{extract_bearer_token, AppJson};

use crate::models::{
    Account, ForgotPasswordRequest, LoginRequest, LoginResponse, LoginUser,
    MessageResponse, OtpLoginResponse, OtpSentResponse, OtpUser, ProfileResponse,
    RegisterPhoneRequest, ResetPasswordRequest, SignupRequest, SignupResponse, VerifyOtpRequest,
};
use crate::services::accounts::normalize_email;
use crate::services::validation::{require_field, validate_email, validate_phone};
use crate::services::PasswordService;
use crate::state::AuthState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_OTP: &str = "Invalid or expired OTP";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const RESET_REQUESTED: &str = "If the account exists, password reset instructions have been sent";

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated(INVALID_CREDENTIALS.to_string())
}

// ---------------------------
// EMAIL + PASSWORD
// ---------------------------

pub async fn signup(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    require_field(&input.name, "name")?;
    validate_email(&input.email)?;
    PasswordService::validate_new_password(&input.password)?;
    if let Some(phone) = input.phone.as_deref() {
        validate_phone(phone)?;
    }

    let email = normalize_email(&input.email);
    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };

    let password_hash = PasswordService::hash_password(&input.password)?;

    let account = state
        .accounts
        .insert(Account {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email: Some(email.clone()),
            phone: input.phone,
            password_hash: Some(password_hash),
            role,
            is_verified: false,
            created_at: Utc::now(),
        })
        .await?;

    let token = state
        .tokens
        .issue(&email, account.role, state.config.password_token_ttl)?;

    info!("Signup successful for account {}", account.id);
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Signup successful".to_string(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let account = state.accounts.find_by_email(&input.email).await?;
    let stored_hash = account.as_ref().and_then(|a| a.password_hash.as_deref());

    // Always pays for one argon2 verification, so unknown and password-less
    // accounts take as long to reject as a wrong password.
    if !PasswordService::verify_credentials(&input.password, stored_hash) {
        match &account {
            Some(account) => warn!("Failed password login for account {}", account.id),
            None => debug!("Login attempt for unknown email"),
        }
        return Err(invalid_credentials());
    }

    let Some(account) = account else {
        return Err(invalid_credentials());
    };

    let email = account.email.clone().unwrap_or_default();
    let token = state
        .tokens
        .issue(&email, account.role, state.config.password_token_ttl)?;

    info!("Login successful for account {}", account.id);
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: LoginUser {
            id: account.id.to_string(),
            email,
            role: account.role,
        },
    }))
}

/// Tokens are not revoked server-side; the client discards its copy and the
/// token lapses at its own expiry.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logout successful".to_string(),
    })
}

// ---------------------------
// PASSWORD RECOVERY
// ---------------------------

/// Answers the same body for known and unknown emails. The token only ever
/// leaves through the delivery channel.
pub async fn forgot_password(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_email(&input.email)?;

    match state.accounts.find_by_email(&input.email).await? {
        Some(account) => {
            let email = normalize_email(&input.email);
            let token = state
                .tokens
                .issue_reset(&email, account.role, state.config.reset_token_ttl)?;

            match state.delivery.send_reset_token(&email, &token).await {
                Ok(()) => info!("Password reset token sent for account {}", account.id),
                Err(e) => error!("Failed to deliver reset token for account {}: {}", account.id, e),
            }
        }
        None => debug!("Password reset requested for unknown email"),
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED.to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    PasswordService::validate_new_password(&input.new_password)?;

    let email = normalize_email(&input.email);
    let subject = state.tokens.validate_reset(&input.reset_token).map_err(|e| {
        warn!("Reset token rejected: {}", e);
        AppError::Unauthenticated(INVALID_RESET_TOKEN.to_string())
    })?;

    if subject != email {
        warn!("Reset token subject does not match requested email");
        return Err(AppError::Unauthenticated(INVALID_RESET_TOKEN.to_string()));
    }

    let password_hash = PasswordService::hash_password(&input.new_password)?;
    state
        .accounts
        .update_password(&email, password_hash)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unauthenticated(INVALID_RESET_TOKEN.to_string()),
            other => other,
        })?;

    info!("Password reset completed");
    Ok(Json(MessageResponse {
        message: "Password reset successful".to_string(),
    }))
}

// ---------------------------
// PHONE + OTP
// ---------------------------

pub async fn register_phone(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<RegisterPhoneRequest>,
) -> Result<Json<OtpSentResponse>, AppError> {
    validate_phone(&input.phone)?;
    let phone = input.phone.trim().to_string();

    if state.accounts.find_by_phone(&phone).await?.is_none() {
        let created = state
            .accounts
            .insert(Account {
                id: Uuid::new_v4(),
                name: input.name.unwrap_or_default().trim().to_string(),
                email: None,
                phone: Some(phone.clone()),
                password_hash: None,
                role: Role::User,
                is_verified: false,
                created_at: Utc::now(),
            })
            .await;

        // A concurrent registration for the same phone already created it.
        match created {
            Ok(account) => info!("Created unverified phone account {}", account.id),
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let code = state.otps.issue(&phone);
    state.delivery.send_otp(&phone, &code).await?;

    Ok(Json(OtpSentResponse {
        message: "OTP sent to phone".to_string(),
        otp_sent: true,
    }))
}

pub async fn verify_otp(
    State(state): State<Arc<AuthState>>,
    AppJson(input): AppJson<VerifyOtpRequest>,
) -> Result<Json<OtpLoginResponse>, AppError> {
    require_field(&input.phone, "phone")?;
    require_field(&input.otp, "otp")?;
    let phone = input.phone.trim();

    if !state.otps.verify(phone, &input.otp) {
        warn!("OTP verification failed for {}", phone);
        return Err(AppError::Unauthenticated(INVALID_OTP.to_string()));
    }

    let account = state
        .accounts
        .mark_phone_verified(phone)
        .await?
        .ok_or_else(|| AppError::Unauthenticated(INVALID_OTP.to_string()))?;

    let subject = account.subject().unwrap_or(phone).to_string();
    let token = state
        .tokens
        .issue(&subject, account.role, state.config.otp_token_ttl)?;

    info!("OTP verified for account {}", account.id);
    Ok(Json(OtpLoginResponse {
        message: "OTP verified successfully".to_string(),
        token,
        user: OtpUser {
            name: account.name,
            phone: phone.to_string(),
        },
    }))
}

// ---------------------------
// TOKENS
// ---------------------------

pub async fn validate_token(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = state.tokens.validate(token)?;

    Ok(Json(TokenResponse {
        valid: true,
        subject: user.subject,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    debug!("Verifying token");

    let valid = extract_bearer_token(&headers)
        .ok()
        .map(|token| state.tokens.validate(token).is_ok())
        .unwrap_or(false);

    Json(json!({ "valid": valid }))
}

// ---------------------------
// AUTHENTICATED
// ---------------------------

pub async fn get_profile(
    State(state): State<Arc<AuthState>>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    debug!("Getting profile for subject: {}", user.subject);

    let account = state
        .accounts
        .find_by_subject(&user.subject)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(account.into()))
}

pub async fn admin_ping(user: AuthUser) -> Json<serde_json::Value> {
    info!("Admin check passed for {}", user.subject);
    Json(json!({
        "message": "Admin access granted",
        "subject": user.subject,
        "role": user.role,
    }))
}
