//! Decision memoization keyed by submission fingerprint.
//!
//! The fingerprint is a SHA-256 digest over a stable JSON serialization of
//! the identity subset of the raw submission (email, message, name), so
//! equal submissions always map to the same entry regardless of transient
//! metadata like timestamps or user agent.
//!
//! Expiry is lazy: an entry older than the TTL is evicted by the lookup
//! that observes it. There is no background sweep.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use formshield_types::{Decision, Submission};

/// The identity subset hashed into a fingerprint. Field order is part of
/// the fingerprint contract.
#[derive(Serialize)]
struct FingerprintKey<'a> {
    email: Option<&'a str>,
    message: Option<&'a str>,
    name: Option<&'a str>,
}

/// Deterministic cache key for a submission.
pub fn fingerprint(submission: &Submission) -> String {
    let key = FingerprintKey {
        email: submission.email.as_deref(),
        message: submission.message.as_deref(),
        name: submission.name.as_deref(),
    };
    // Serializing a struct with only scalar fields cannot fail
    let json = serde_json::to_string(&key).unwrap_or_default();
    hex::encode(Sha256::digest(json.as_bytes()))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: Decision,
    created: Instant,
}

/// In-memory, mutex-guarded decision cache.
///
/// Owned per engine instance; lookup + expiry + store are each atomic with
/// respect to concurrent evaluations.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DecisionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live entry, evicting it if the TTL has elapsed.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Decision> {
        let mut entries = self.entries.lock().expect("decision cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.created.elapsed() <= ttl => Some(entry.decision.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a decision under the given fingerprint.
    pub fn insert(&self, key: String, decision: Decision) {
        let mut entries = self.entries.lock().expect("decision cache poisoned");
        entries.insert(
            key,
            CacheEntry {
                decision,
                created: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("decision cache poisoned").clear();
    }

    /// Number of stored entries, including any not yet lazily expired.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("decision cache poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
