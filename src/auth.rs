//! Password verification and the in-memory session store.
//!
//! A session is server-held proof that a caller presented the shared admin
//! secret (or a valid QR token). Sessions live for a fixed window measured
//! from establishment; expiry is detected lazily on the next check and never
//! slides forward on activity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute the hex-encoded SHA-256 digest of `password + salt`.
pub fn password_digest(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compare two digest strings without short-circuiting on the first
/// mismatched byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify a supplied password against the configured admin secret by
/// comparing salted digests in constant time.
pub fn verify_password(supplied: &str, admin_password: &str, salt: &str) -> bool {
    constant_time_eq(
        &password_digest(supplied, salt),
        &password_digest(admin_password, salt),
    )
}

#[derive(Debug, Clone)]
struct SessionRecord {
    authenticated: bool,
    established_at: DateTime<Utc>,
}

/// In-memory session store keyed by opaque UUID session identifiers.
///
/// All access goes through the mutex; the expiry check removes stale records
/// as a side effect, so a session flips to unauthenticated exactly once.
pub struct SessionStore {
    lifetime_secs: i64,
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn new(lifetime_secs: i64) -> Self {
        Self {
            lifetime_secs,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().expect("session store mutex poisoned")
    }

    /// Establish a new authenticated session and return its identifier.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().insert(
            id.clone(),
            SessionRecord {
                authenticated: true,
                established_at: Utc::now(),
            },
        );
        id
    }

    /// Whether the session exists and is still within its lifetime window.
    ///
    /// A session found to be expired is invalidated here, so subsequent calls
    /// return false without re-checking elapsed time.
    pub fn is_authenticated(&self, id: &str) -> bool {
        let mut sessions = self.lock();
        let expired = match sessions.get(id) {
            Some(record) if record.authenticated => {
                let elapsed = (Utc::now() - record.established_at).num_seconds();
                if elapsed > self.lifetime_secs {
                    true
                } else {
                    return true;
                }
            }
            _ => return false,
        };
        if expired {
            sessions.remove(id);
        }
        false
    }

    /// Seconds until the session expires; 0 when not authenticated. Purely
    /// for the countdown display, not a security boundary.
    pub fn remaining_seconds(&self, id: &str) -> i64 {
        if !self.is_authenticated(id) {
            return 0;
        }
        let sessions = self.lock();
        match sessions.get(id) {
            Some(record) => {
                let elapsed = (Utc::now() - record.established_at).num_seconds();
                (self.lifetime_secs - elapsed).max(0)
            }
            None => 0,
        }
    }

    /// Explicitly reset the establishment timestamp. Returns false when the
    /// session has already expired or never existed. This is the only way a
    /// session's window moves; ordinary requests never refresh it.
    pub fn refresh(&self, id: &str) -> bool {
        if !self.is_authenticated(id) {
            return false;
        }
        let mut sessions = self.lock();
        match sessions.get_mut(id) {
            Some(record) => {
                record.established_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove the session unconditionally (logout).
    pub fn destroy(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Shift a session's establishment timestamp into the past.
    #[cfg(test)]
    fn backdate(&self, id: &str, secs: i64) {
        let mut sessions = self.lock();
        if let Some(record) = sessions.get_mut(id) {
            record.established_at -= chrono::Duration::seconds(secs);
        }
    }
}
