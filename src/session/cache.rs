//! Session cache with TTL expiry.
//!
//! # Responsibilities
//! - Remember one handle per [`ModelIdentity`] together with its issue time
//! - Report entries older than the TTL as expired
//! - Run at most one issuance per identity at a time
//!
//! # Design Decisions
//! - Owned by its caller and injected, never a process global
//! - Every time read goes through the injected [`Clock`]
//! - Waiters on an issuance re-check freshness and reuse the winner's handle

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::observability::metrics;
use crate::session::identity::ModelIdentity;

#[derive(Debug, Clone)]
struct SessionEntry<H> {
    issued_at: SystemTime,
    handle: H,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<H> {
    Fresh(H),
    Stale,
    Missing,
}

impl<H> Lookup<H> {
    fn label(&self) -> &'static str {
        match self {
            Lookup::Fresh(_) => "hit",
            Lookup::Stale => "expired",
            Lookup::Missing => "miss",
        }
    }
}

/// Per-identity handle cache.
#[derive(Debug)]
pub struct SessionCache<H> {
    entries: DashMap<ModelIdentity, SessionEntry<H>>,
    issuance: DashMap<ModelIdentity, Arc<Mutex<()>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<H: Clone> SessionCache<H> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            issuance: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `handle` as issued now, replacing any previous entry.
    pub fn new_session(&self, key: ModelIdentity, handle: H) {
        let issued_at = self.clock.now();
        self.entries.insert(key, SessionEntry { issued_at, handle });
    }

    /// `true` once more than the TTL has passed since issue. Unknown keys are expired.
    pub fn is_expired(&self, key: &ModelIdentity) -> bool {
        match self.entries.get(key) {
            Some(entry) => self.stale(entry.issued_at),
            None => true,
        }
    }

    /// The stored handle, fresh or not.
    pub fn get(&self, key: &ModelIdentity) -> Option<H> {
        self.entries.get(key).map(|entry| entry.handle.clone())
    }

    pub fn lookup(&self, key: &ModelIdentity) -> Lookup<H> {
        match self.entries.get(key) {
            Some(entry) if self.stale(entry.issued_at) => Lookup::Stale,
            Some(entry) => Lookup::Fresh(entry.handle.clone()),
            None => Lookup::Missing,
        }
    }

    /// The stored handle if it has not expired.
    pub fn fresh(&self, key: &ModelIdentity) -> Option<H> {
        match self.lookup(key) {
            Lookup::Fresh(handle) => Some(handle),
            _ => None,
        }
    }

    /// Return the fresh handle for `key`, or run `issue` and cache its result.
    ///
    /// Concurrent callers for the same key wait for a single issuance. A
    /// failed issuance caches nothing and the next waiter tries again.
    pub async fn get_or_issue<F, Fut, E>(&self, key: &ModelIdentity, issue: F) -> Result<H, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H, E>>,
    {
        if let Lookup::Fresh(handle) = self.lookup(key) {
            metrics::record_cache_lookup("hit");
            return Ok(handle);
        }

        let lock = self.issuance_lock(key);
        let _guard = lock.lock().await;

        let lookup = self.lookup(key);
        metrics::record_cache_lookup(lookup.label());
        if let Lookup::Fresh(handle) = lookup {
            return Ok(handle);
        }

        let handle = issue().await?;
        self.new_session(key.clone(), handle.clone());
        Ok(handle)
    }

    /// Blocking form of [`get_or_issue`](Self::get_or_issue).
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn get_or_issue_blocking<F, E>(&self, key: &ModelIdentity, issue: F) -> Result<H, E>
    where
        F: FnOnce() -> Result<H, E>,
    {
        if let Lookup::Fresh(handle) = self.lookup(key) {
            metrics::record_cache_lookup("hit");
            return Ok(handle);
        }

        let lock = self.issuance_lock(key);
        let _guard = lock.blocking_lock();

        let lookup = self.lookup(key);
        metrics::record_cache_lookup(lookup.label());
        if let Lookup::Fresh(handle) = lookup {
            return Ok(handle);
        }

        let handle = issue()?;
        self.new_session(key.clone(), handle.clone());
        Ok(handle)
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &ModelIdentity) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every expired entry and idle issuance lock. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.stale(entry.issued_at));
        self.issuance
            .retain(|key, lock| Arc::strong_count(lock) > 1 || self.entries.contains_key(key));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(fresh, stale)` entry counts.
    pub fn summary(&self) -> (usize, usize) {
        self.entries.iter().fold((0, 0), |(fresh, stale), entry| {
            if self.stale(entry.issued_at) {
                (fresh, stale + 1)
            } else {
                (fresh + 1, stale)
            }
        })
    }

    fn issuance_lock(&self, key: &ModelIdentity) -> Arc<Mutex<()>> {
        self.issuance
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn stale(&self, issued_at: SystemTime) -> bool {
        // a clock that moved backwards counts as no time elapsed
        let elapsed = self
            .clock
            .now()
            .duration_since(issued_at)
            .unwrap_or(Duration::ZERO);
        elapsed > self.ttl
    }
}
