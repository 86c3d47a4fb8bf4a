//! Per-identifier call bookkeeping and the rate-limit gate

use crate::constants::MAX_IDENTIFIER_ERRORS;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Suppression window for the primary provider after a 429
pub struct RateLimitGate {
    until: Mutex<Option<Instant>>,
    default_backoff: Duration,
}

impl RateLimitGate {
    pub fn new(default_backoff: Duration) -> Self {
        Self {
            until: Mutex::new(None),
            default_backoff,
        }
    }

    /// Closes the gate for `retry_after`, or the default backoff without a hint
    pub fn trip(&self, retry_after: Option<Duration>) {
        let backoff = retry_after.unwrap_or(self.default_backoff);
        let deadline = Instant::now() + backoff;
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        // A later deadline from an earlier response stays in force
        if until.map_or(true, |current| deadline > current) {
            *until = Some(deadline);
        }
        tracing::info!(backoff_secs = backoff.as_secs(), "Primary provider rate limited");
    }

    /// True while calls to the primary provider are suppressed
    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left until the gate opens
    pub fn remaining(&self) -> Option<Duration> {
        let until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        until
            .and_then(|deadline| deadline.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }
}

#[derive(Default)]
struct LedgerState {
    last_attempt: HashMap<String, Instant>,
    errors: HashMap<String, u32>,
    blacklist: HashSet<String>,
}

/// Record of provider lookups per asset identifier
///
/// Blacklisted identifiers are never sent to a provider again for the
/// lifetime of the ledger.
pub struct CallLedger {
    state: Mutex<LedgerState>,
    cooldown: Duration,
}

impl CallLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            cooldown,
        }
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.lock().blacklist.contains(id)
    }

    /// Claims a lookup slot for `id`
    ///
    /// Returns false if `id` is blacklisted or was attempted within the
    /// cooldown; otherwise records the attempt and returns true.
    pub fn try_begin(&self, id: &str) -> bool {
        let mut state = self.lock();
        if state.blacklist.contains(id) {
            return false;
        }
        let now = Instant::now();
        if let Some(last) = state.last_attempt.get(id) {
            if now.duration_since(*last) < self.cooldown {
                return false;
            }
        }
        state.last_attempt.insert(id.to_string(), now);
        true
    }

    /// Permanently excludes `id`, dropping its cooldown and error history
    pub fn blacklist(&self, id: &str) {
        let added = {
            let mut state = self.lock();
            state.last_attempt.remove(id);
            state.errors.remove(id);
            state.blacklist.insert(id.to_string())
        };
        if added {
            tracing::warn!(id, "Blacklisted identifier");
        }
    }

    /// Counts a failed lookup, blacklisting once the limit is reached
    pub fn record_error(&self, id: &str) {
        let count = {
            let mut state = self.lock();
            let count = state.errors.entry(id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if count >= MAX_IDENTIFIER_ERRORS {
            self.blacklist(id);
        }
    }

    pub fn blacklist_len(&self) -> usize {
        self.lock().blacklist.len()
    }

    /// Forgets attempts whose cooldown has run out, returning how many
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.last_attempt.len();
        state
            .last_attempt
            .retain(|_, last| now.duration_since(*last) < self.cooldown);
        before - state.last_attempt.len()
    }

    /// Identifiers with a cooldown or error count still on record
    pub fn tracked_len(&self) -> usize {
        let state = self.lock();
        state
            .last_attempt
            .keys()
            .chain(state.errors.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
