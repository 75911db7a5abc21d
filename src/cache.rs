use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Source of the current time for cache freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock().expect("manual clock poisoned");
        *now = now.checked_add_signed(step).unwrap_or(*now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("manual clock poisoned")
    }
}

/// A stored value and the time it was stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
}

/// Single-slot cache with lazy TTL expiry.
///
/// `put` replaces the slot wholesale; `get` misses once the entry is at least
/// `ttl` old. Concurrent writers race and the last one wins.
pub struct ResultCache<T> {
    slot: RwLock<Option<Cached<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> ResultCache<T> {
    /// Create an empty cache using the wall clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns `true` when nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.slot.read().expect("result cache poisoned").is_none()
    }

    /// Stored entry if it is younger than the TTL.
    pub fn get(&self) -> Option<Cached<T>> {
        let slot = self.slot.read().expect("result cache poisoned");
        let entry = slot.as_ref()?;
        let age = self.clock.now().signed_duration_since(entry.created_at);
        // A clock that moved backwards yields a negative age, which stays fresh.
        let expired = age.to_std().is_ok_and(|age| age >= self.ttl);
        if expired {
            debug!(
                "[pulse:cache] entry expired age={}s ttl={}s",
                age.num_seconds(),
                self.ttl.as_secs()
            );
            return None;
        }
        Some(entry.clone())
    }

    /// Replace the stored entry, stamping it with the current time.
    pub fn put(&self, value: T) -> Cached<T> {
        let entry = Cached {
            value,
            created_at: self.clock.now(),
        };
        let mut slot = self.slot.write().expect("result cache poisoned");
        *slot = Some(entry.clone());
        entry
    }
}
