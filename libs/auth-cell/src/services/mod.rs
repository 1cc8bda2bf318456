pub mod accounts;
pub mod delivery;
pub mod password;
pub mod sweeper;
pub mod validation;

pub use accounts::{AccountStore, InMemoryAccountStore};
pub use delivery::{CredentialDelivery, LogDelivery};
pub use password::PasswordService;
pub use sweeper::spawn_otp_sweeper;
