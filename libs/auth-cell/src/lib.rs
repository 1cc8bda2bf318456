// =====================================================================================
// AUTH CELL - CREDENTIALS, TOKENS & ONE-TIME CODES
// =====================================================================================
//
// Email/password and phone/OTP login, password reset, and bearer-token
// validation for the rest of the API. Signing and code storage live in
// shared-utils; this cell owns the account flows around them.
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use router::auth_routes;
pub use state::AuthState;
