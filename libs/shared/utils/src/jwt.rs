use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{AuthUser, JwtClaims, JwtHeader, Role, TokenScope, EXPECTED_ALG};
use shared_models::error::{AppError, AuthError};

use crate::clock::{to_time_delta, Clock, SharedClock};

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies HS256 compact tokens with a single process-wide secret.
///
/// Tokens are not revocable: once issued, a token stays valid until `exp`
/// even if the account behind it changes. Keep the configured TTLs short.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"<redacted>")
            .field("clock", &self.clock)
            .finish()
    }
}

impl TokenAuthority {
    pub fn new(secret: impl AsRef<[u8]>, clock: SharedClock) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            clock,
        }
    }

    /// Issues an access token for `subject` valid for `ttl` from now.
    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, AppError> {
        self.issue_scoped(subject, role, ttl, TokenScope::Access)
    }

    /// Issues a token that only `validate_reset` accepts.
    pub fn issue_reset(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, AppError> {
        self.issue_scoped(subject, role, ttl, TokenScope::PasswordReset)
    }

    fn issue_scoped(
        &self,
        subject: &str,
        role: Role,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<String, AppError> {
        if subject.trim().is_empty() {
            return Err(AppError::ValidationError("Token subject must not be empty".to_string()));
        }
        if ttl.as_secs() == 0 {
            return Err(AppError::ValidationError("Token lifetime must be at least one second".to_string()));
        }

        let now = self.clock.now();
        let expires_at = now + to_time_delta(ttl);

        let claims = JwtClaims {
            sub: subject.to_string(),
            role: role.as_str().to_string(),
            iat: Some(now.timestamp()),
            exp: Some(expires_at.timestamp()),
            scope,
        };

        let header_json = serde_json::to_vec(&JwtHeader::hs256())
            .map_err(|e| AppError::Internal(format!("Failed to encode token header: {}", e)))?;
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Internal(format!("Failed to encode token claims: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.sign(signing_input.as_bytes())?;

        debug!("Issued {:?} token for {} expiring at {}", scope, subject, expires_at);
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AppError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Verifies an access token and returns the identity it carries.
    pub fn validate(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.decode(token, TokenScope::Access)
    }

    /// Verifies a password-reset token and returns its subject.
    pub fn validate_reset(&self, token: &str) -> Result<String, AuthError> {
        self.decode(token, TokenScope::PasswordReset)
            .map(|user| user.subject)
    }

    /// Validates `token` and additionally requires `required` as its role.
    pub fn authorize(&self, token: &str, required: Role) -> Result<AuthUser, AppError> {
        let user = self.validate(token)?;
        user.require_role(required)?;
        Ok(user)
    }

    fn decode(&self, token: &str, scope: TokenScope) -> Result<AuthUser, AuthError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(AuthError::InvalidToken),
            };

        let header: JwtHeader = decode_segment(header_b64).map_err(|e| {
            debug!("Failed to decode token header: {}", e);
            AuthError::InvalidToken
        })?;

        if header.alg != EXPECTED_ALG {
            debug!("Token declares unexpected algorithm {}", header.alg);
            return Err(AuthError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
            debug!("Failed to decode signature: {}", e);
            AuthError::InvalidSignature
        })?;

        let mut mac = self.mac().map_err(|_| AuthError::InvalidSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("Token signature verification failed");
            return Err(AuthError::InvalidSignature);
        }

        let claims: JwtClaims = decode_segment(claims_b64).map_err(|e| {
            debug!("Failed to parse claims: {}", e);
            AuthError::MalformedClaims
        })?;

        let exp = claims.exp.ok_or(AuthError::MalformedClaims)?;
        if let Some(iat) = claims.iat {
            if exp <= iat {
                return Err(AuthError::MalformedClaims);
            }
        }

        let now = self.clock.now().timestamp();
        if now >= exp {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(AuthError::ExpiredToken);
        }

        if claims.sub.trim().is_empty() {
            return Err(AuthError::MalformedClaims);
        }
        let role: Role = claims.role.parse().map_err(|_| AuthError::MalformedClaims)?;

        if claims.scope != scope {
            debug!("Token scope {:?} used where {:?} is required", claims.scope, scope);
            return Err(AuthError::InvalidToken);
        }

        debug!("Token validated successfully for subject: {}", claims.sub);
        Ok(AuthUser {
            subject: claims.sub,
            role,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, ManualClock};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";
    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn authority() -> (TokenAuthority, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (TokenAuthority::new(SECRET, clock.clone()), clock)
    }

    #[test]
    fn test_issue_then_validate_returns_claims() {
        let (authority, _) = authority();
        let token = authority.issue("u@example.com", Role::User, DAY).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let user = authority.validate(&token).unwrap();
        assert_eq!(user.subject, "u@example.com");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_every_role_survives_round_trip() {
        let (authority, _) = authority();
        for (subject, role) in [("42", Role::User), ("root@example.com", Role::Admin), ("+911234567890", Role::User)] {
            let token = authority.issue(subject, role, DAY).unwrap();
            let user = authority.validate(&token).unwrap();
            assert_eq!(user.subject, subject);
            assert_eq!(user.role, role);
        }
    }

    #[test]
    fn test_empty_subject_rejected_at_issue() {
        let (authority, _) = authority();
        assert_matches!(authority.issue("  ", Role::User, DAY), Err(AppError::ValidationError(_)));
        assert_matches!(authority.issue("a", Role::User, Duration::ZERO), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let (authority, clock) = authority();
        let token = authority.issue("u@example.com", Role::User, DAY).unwrap();

        clock.advance(chrono::Duration::hours(23));
        assert!(authority.validate(&token).is_ok());

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(authority.validate(&token), Err(AuthError::ExpiredToken));

        clock.advance(chrono::Duration::days(30));
        assert_eq!(authority.validate(&token), Err(AuthError::ExpiredToken));
    }

    #[test]
    fn test_different_secret_fails_signature() {
        let (authority, clock) = authority();
        let other = TokenAuthority::new("another-secret", clock);

        let token = other.issue("u@example.com", Role::Admin, DAY).unwrap();
        assert_eq!(authority.validate(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let (authority, _) = authority();
        let token = authority.issue("u@example.com", Role::User, DAY).unwrap();

        for index in 0..token.len() {
            if token.as_bytes()[index] == b'.' {
                continue;
            }
            let tampered = JwtTestUtils::tamper_at(&token, index);
            assert!(
                authority.validate(&tampered).is_err(),
                "tampering byte {} was accepted",
                index
            );
        }
    }

    #[test]
    fn test_tampered_claims_fail_signature() {
        let (authority, _) = authority();
        let token = authority.issue("u@example.com", Role::User, DAY).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let escalated = URL_SAFE_NO_PAD.encode(
            json!({"sub": "u@example.com", "role": "admin", "iat": 0, "exp": i64::MAX}).to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], escalated, parts[2]);

        assert_eq!(authority.validate(&forged), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_unexpected_algorithms_rejected() {
        let (authority, clock) = authority();
        let now = clock.now().timestamp();
        let claims = json!({"sub": "u@example.com", "role": "user", "iat": now, "exp": now + 3600});

        for alg in ["none", "HS384", "HS512", "RS256", "ES256", "hs256"] {
            let token = JwtTestUtils::forge_token(&json!({"alg": alg, "typ": "JWT"}), &claims, SECRET);
            assert_eq!(authority.validate(&token), Err(AuthError::InvalidToken), "alg {}", alg);
        }

        let unsigned = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(json!({"alg": "none"}).to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        assert_eq!(authority.validate(&unsigned), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_malformed_tokens() {
        let (authority, _) = authority();
        assert_eq!(authority.validate(""), Err(AuthError::InvalidToken));
        assert_eq!(authority.validate("invalid.token.format"), Err(AuthError::InvalidToken));
        assert_eq!(authority.validate("a.b"), Err(AuthError::InvalidToken));
        assert_eq!(authority.validate("a.b.c.d"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_missing_claims_are_malformed() {
        let (authority, clock) = authority();
        let now = clock.now().timestamp();
        let header = json!({"alg": "HS256", "typ": "JWT"});

        let cases = [
            json!({"role": "user", "iat": now, "exp": now + 60}),
            json!({"sub": "", "role": "user", "iat": now, "exp": now + 60}),
            json!({"sub": "u@example.com", "iat": now, "exp": now + 60}),
            json!({"sub": "u@example.com", "role": "superuser", "iat": now, "exp": now + 60}),
            json!({"sub": "u@example.com", "role": "user", "iat": now}),
            json!({"sub": "u@example.com", "role": "user", "iat": now, "exp": now}),
        ];

        for claims in cases {
            let token = JwtTestUtils::forge_token(&header, &claims, SECRET);
            assert_eq!(authority.validate(&token), Err(AuthError::MalformedClaims), "{}", claims);
        }
    }

    #[test]
    fn test_authorize_distinguishes_forbidden_from_unauthenticated() {
        let (authority, _) = authority();
        let user_token = authority.issue("u@example.com", Role::User, DAY).unwrap();
        let admin_token = authority.issue("root@example.com", Role::Admin, DAY).unwrap();

        assert!(authority.validate(&user_token).is_ok());
        assert_matches!(authority.authorize(&user_token, Role::Admin), Err(AppError::Forbidden(_)));
        assert_matches!(
            authority.authorize("garbage", Role::Admin),
            Err(AppError::Auth(AuthError::InvalidToken))
        );
        assert_eq!(authority.authorize(&admin_token, Role::Admin).unwrap().subject, "root@example.com");
    }

    #[test]
    fn test_reset_and_access_scopes_do_not_mix() {
        let (authority, _) = authority();
        let reset = authority
            .issue_reset("u@example.com", Role::User, Duration::from_secs(900))
            .unwrap();
        let access = authority.issue("u@example.com", Role::User, DAY).unwrap();

        assert_eq!(authority.validate_reset(&reset).unwrap(), "u@example.com");
        assert_eq!(authority.validate(&reset), Err(AuthError::InvalidToken));
        assert_eq!(authority.validate_reset(&access), Err(AuthError::InvalidToken));
    }
}
