//! Session identity management.
//!
//! A session id correlates a user's turns across requests and client
//! restarts. Ids are ULID-like: a fixed-width base-36 millisecond timestamp
//! followed by a random base-36 suffix, so ids sort lexicographically by
//! creation time while staying collision-resistant. The id is persisted in
//! the durable key-value store and reused until explicitly cleared.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage::KvStore;

/// Fixed storage key for the session id (part of the client's local schema).
const SESSION_ID_KEY: &str = "ai_session_id";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Width of the timestamp component of a session id.
const SESSION_TS_WIDTH: usize = 10;
/// Width of the random component of a session id.
const SESSION_RAND_WIDTH: usize = 16;
/// Width of the random component of a trace id.
const TRACE_RAND_WIDTH: usize = 12;

/// Encodes `value` as fixed-width, left-zero-padded base 36.
fn encode_base36(mut value: u128, width: usize) -> String {
    let mut buf = vec![b'0'; width];
    let mut i = width;
    while value > 0 && i > 0 {
        i -= 1;
        buf[i] = BASE36[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(buf).expect("base36 output is ASCII")
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Random bits for id suffixes. Uuid v4 carries 122 random bits, more than
/// enough for a 16-digit base-36 suffix.
fn random_bits() -> u128 {
    uuid::Uuid::new_v4().as_u128()
}

/// Generates an ordered session id: `{timestamp(10)}-{random(16)}`.
pub fn generate_session_id() -> String {
    format!(
        "{}-{}",
        encode_base36(unix_millis(), SESSION_TS_WIDTH),
        encode_base36(random_bits(), SESSION_RAND_WIDTH)
    )
}

/// Generates a per-request trace id for cross-service log correlation.
pub fn generate_trace_id() -> String {
    format!(
        "{}-{}",
        encode_base36(unix_millis(), SESSION_TS_WIDTH),
        encode_base36(random_bits(), TRACE_RAND_WIDTH)
    )
}

/// Owns the durable session identity for one client process.
///
/// At most one session id is active per store at a time. Storage failures
/// degrade to an in-memory-only session for the current process lifetime
/// rather than aborting the turn.
#[derive(Debug)]
pub struct SessionStore {
    store: KvStore,
    cached: Option<String>,
}

impl SessionStore {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    /// Returns the active session id, creating and persisting one if needed.
    ///
    /// Idempotent: repeated calls return the same id until `clear`.
    pub fn ensure(&mut self) -> String {
        if let Some(id) = &self.cached {
            return id.clone();
        }

        match self.store.get(SESSION_ID_KEY) {
            Ok(Some(id)) => {
                self.cached = Some(id.clone());
                return id;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "session storage unreadable, starting fresh session");
            }
        }

        let id = generate_session_id();
        if let Err(e) = self.store.set(SESSION_ID_KEY, &id) {
            tracing::warn!(error = %e, "session id not persisted, session is in-memory only");
        }
        self.cached = Some(id.clone());
        id
    }

    /// Forgets the active session id, both in memory and in durable storage.
    pub fn clear(&mut self) {
        self.cached = None;
        if let Err(e) = self.store.remove(SESSION_ID_KEY) {
            tracing::warn!(error = %e, "failed to remove stored session id");
        }
    }
}
