use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::clock::{to_time_delta, Clock, SharedClock};

pub const OTP_DIGITS: usize = 6;
const OTP_SPACE: u32 = 1_000_000;

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Uniform 6-digit code from the OS RNG, zero-padded.
pub fn generate_code() -> String {
    let n = OsRng.gen_range(0..OTP_SPACE);
    format!("{:0width$}", n, width = OTP_DIGITS)
}

/// In-memory one-time code store keyed by phone number or email.
///
/// At most one live code per key. A single lock covers every key and is only
/// held for the map operation itself; with a very large keyspace this lock is
/// the first contention point. Expired entries linger until overwritten,
/// deleted, or removed by `purge_expired`.
#[derive(Debug)]
pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
    ttl: chrono::Duration,
    clock: SharedClock,
}

impl OtpStore {
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: to_time_delta(ttl),
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, OtpEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a fresh code for `key`, replacing any outstanding one.
    pub fn issue(&self, key: &str) -> String {
        let code = generate_code();
        let expires_at = self.clock.now() + self.ttl;

        self.entries().insert(
            key.to_string(),
            OtpEntry {
                code: code.clone(),
                expires_at,
            },
        );

        debug!("Issued OTP for {} expiring at {}", key, expires_at);
        code
    }

    /// True iff `submitted` exactly matches the live, unexpired code for `key`.
    /// A match consumes the code; a miss leaves it in place for retries.
    pub fn verify(&self, key: &str, submitted: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries();

        let Some(entry) = entries.get(key) else {
            debug!("No OTP outstanding for {}", key);
            return false;
        };

        if now > entry.expires_at {
            debug!("OTP for {} expired at {}", key, entry.expires_at);
            return false;
        }

        if !bool::from(entry.code.as_bytes().ct_eq(submitted.as_bytes())) {
            debug!("OTP mismatch for {}", key);
            return false;
        }

        entries.remove(key);
        true
    }

    /// Drops the code for `key`. Returns whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
