//! In-process LRU/TTL cache of simulation results.
//!
//! Lookups of live entries only take the read lock: the LRU position is an
//! atomic tick on the entry. Inserts, evictions and expiry removal take the
//! write lock. Misses go through [`SimulationCache::get_or_compute`], which
//! lets exactly one caller per key run the simulation while the others wait
//! for its result.

mod clock;
mod key;
mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use snapshot::{PeriodicSnapshot, SNAPSHOT_VERSION};

use crate::model::ProbabilityResult;

pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

#[derive(Debug)]
pub struct CacheEntry {
    key: CacheKey,
    value: Arc<ProbabilityResult>,
    created_at: Timestamp,
    last_accessed: AtomicU64,
    ttl_seconds: u64,
}

impl CacheEntry {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn value(&self) -> &Arc<ProbabilityResult> {
        &self.value
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Logical access tick, larger is more recent
    pub fn last_accessed_at(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        let age = now.as_second().saturating_sub(self.created_at.as_second());
        age > 0 && age as u64 > self.ttl_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

#[derive(Debug)]
pub struct SimulationCache {
    entries: RwLock<FxHashMap<CacheKey, CacheEntry>>,
    /// One gate per key currently being computed
    in_flight: Mutex<FxHashMap<CacheKey, Arc<Mutex<()>>>>,
    max_size: usize,
    default_ttl: u64,
    clock: Arc<dyn Clock>,
    tick: AtomicU64,
    counters: Counters,
}

impl Default for SimulationCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL_SECONDS)
    }
}

impl SimulationCache {
    #[must_use]
    pub fn new(max_size: usize, default_ttl: u64) -> Self {
        Self::with_clock(max_size, default_ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(max_size: usize, default_ttl: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            in_flight: Mutex::new(FxHashMap::default()),
            max_size,
            default_ttl,
            clock,
            tick: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ProbabilityResult>> {
        self.lookup(key, true)
    }

    /// Store `value` under `key`, evicting the least recently used entry if
    /// the cache is full. `ttl` defaults to the cache-wide TTL.
    pub fn set(&self, key: CacheKey, value: Arc<ProbabilityResult>, ttl: Option<u64>) {
        if self.max_size == 0 {
            return;
        }
        let entry = CacheEntry {
            key: key.clone(),
            value,
            created_at: self.clock.now(),
            last_accessed: AtomicU64::new(self.next_tick()),
            ttl_seconds: ttl.unwrap_or(self.default_ttl),
        };

        let mut entries = self.write_entries();
        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            self.evict_lru(&mut entries);
        }
        entries.insert(key, entry);
    }

    /// Remove every key matching a `*` glob. `"*"` clears the cache.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|key, _| !key.matches(pattern));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(pattern, removed, "Invalidated cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        self.write_entries().clear();
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries now instead of on next access
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            hits,
            misses,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Return the cached value for `key`, or run `compute` and store its
    /// result. At most one computation per key runs at a time: concurrent
    /// callers wait for it and read the stored value. Partial results are
    /// returned but not stored, so after a failed or partial computation the
    /// next waiter computes in turn.
    ///
    /// The flag is `true` when the value came from the cache.
    pub fn get_or_compute<F, E>(
        &self,
        key: &CacheKey,
        ttl: Option<u64>,
        compute: F,
    ) -> Result<(Arc<ProbabilityResult>, bool), E>
    where
        F: FnOnce() -> Result<ProbabilityResult, E>,
    {
        if let Some(value) = self.lookup(key, false) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Cache hit");
            return Ok((value, true));
        }

        let gate = self.gate_for(key);
        let outcome = self.compute_behind_gate(key, ttl, &gate, compute);
        self.release_gate(key, gate);
        outcome
    }

    fn compute_behind_gate<F, E>(
        &self,
        key: &CacheKey,
        ttl: Option<u64>,
        gate: &Mutex<()>,
        compute: F,
    ) -> Result<(Arc<ProbabilityResult>, bool), E>
    where
        F: FnOnce() -> Result<ProbabilityResult, E>,
    {
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Whoever held the gate before us may have filled the entry
        if let Some(value) = self.lookup(key, true) {
            tracing::debug!(key = %key, "Cache hit after waiting on in-flight computation");
            return Ok((value, true));
        }

        let value = Arc::new(compute()?);
        if value.is_partial() {
            tracing::debug!(key = %key, "Not caching partial result");
        } else {
            self.set(key.clone(), Arc::clone(&value), ttl);
        }
        Ok((value, false))
    }

    fn lookup(&self, key: &CacheKey, record: bool) -> Option<Arc<ProbabilityResult>> {
        let now = self.clock.now();
        let mut expired = false;
        {
            let entries = self.read_entries();
            if let Some(entry) = entries.get(key) {
                if entry.is_expired(now) {
                    expired = true;
                } else {
                    entry.last_accessed.store(self.next_tick(), Ordering::Relaxed);
                    if record {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    return Some(Arc::clone(&entry.value));
                }
            }
        }

        if expired {
            let mut entries = self.write_entries();
            // Re-check: it may have been replaced since the read lock dropped
            if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                entries.remove(key);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Cache entry expired");
            }
        }
        if record {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn evict_lru(&self, entries: &mut FxHashMap<CacheKey, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed_at())
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Evicted least recently used cache entry");
        }
    }

    fn gate_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(key.clone()).or_default())
    }

    /// Drop the caller's handle on a gate. The map entry goes away with the
    /// last handle, so later callers queue on the same gate as any waiter
    /// that is still computing. Handles are only cloned and dropped under
    /// the `in_flight` lock.
    fn release_gate(&self, key: &CacheKey, gate: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let last_holder = in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(&gate) == 2);
        if last_holder {
            in_flight.remove(key);
        }
        drop(gate);
    }

    /// Keys with a computation queued or running
    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, FxHashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, FxHashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
