//! Category-aware TTL cache with a soft memory budget
//!
//! Entries are keyed by `(category, key)`. Each insert estimates the value's
//! footprint and, when the budget would be exceeded, evicts the cheapest
//! entries first (see [`crate::eviction`]). The budget is soft: an insert is
//! never rejected because eviction could not free enough memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheKey, EntryInfo};
use crate::error::CacheError;
use crate::eviction::{EvictionPolicy, EvictionTarget};
use crate::size::SizeEstimator;
use crate::value::CacheValue;

/// Per-call options for [`CacheStore::set_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Replaces the category's default TTL
    pub ttl: Option<Duration>,
    /// Replaces the estimated size
    pub size_hint: Option<usize>,
}

impl SetOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_size_hint(mut self, bytes: usize) -> Self {
        self.size_hint = Some(bytes);
        self
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live entries
    pub entry_count: usize,
    /// Estimated bytes held by live entries
    pub memory_usage: usize,
    /// Configured soft budget
    pub max_memory: usize,
    /// `get` calls that returned a value
    pub hits: u64,
    /// `get` calls that found nothing or an expired entry
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL ran out
    pub expirations: u64,
}

impl CacheStats {
    /// Number of counted lookups
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 and up; may exceed 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.max_memory == 0 {
            0.0
        } else {
            self.memory_usage as f64 / self.max_memory as f64
        }
    }
}

/// Memory held by one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUsage {
    pub entries: usize,
    pub bytes: usize,
}

/// Internal store state, guarded by one lock
#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Always equal to the sum of `size_bytes` over `entries`
    memory_usage: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl StoreState {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_usage = self.memory_usage.saturating_sub(entry.size_bytes());
        Some(entry)
    }

    fn evict(&mut self, policy: &EvictionPolicy, target: EvictionTarget) -> usize {
        let plan = policy.select(&self.entries, target);
        let mut freed = 0usize;
        for key in &plan.victims {
            if let Some(entry) = self.remove(key) {
                freed = freed.saturating_add(entry.size_bytes());
                self.evictions += 1;
            }
        }
        if !plan.is_empty() {
            debug!(?target, evicted = plan.victims.len(), freed, "evicted cache entries");
        }
        freed
    }

    fn retain(&mut self, mut keep: impl FnMut(&CacheKey, &CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        let mut released = 0usize;
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                released = released.saturating_add(entry.size_bytes());
            }
            kept
        });
        self.memory_usage = self.memory_usage.saturating_sub(released);
        before - self.entries.len()
    }
}

/// Thread-safe category-aware cache
///
/// # Example
///
/// ```
/// use pokedex_cache::{CacheConfig, CacheStore, CacheValue};
///
/// let cache = CacheStore::new(CacheConfig::default());
///
/// cache.set("POKEMON_DATA", "pikachu", CacheValue::from("electric"));
///
/// if let Some(value) = cache.get("POKEMON_DATA", "pikachu") {
///     assert_eq!(value.as_str(), Some("electric"));
/// }
///
/// let stats = cache.stats();
/// println!("Hit rate: {:.2}%", stats.hit_rate() * 100.0);
/// println!("Memory used: {} / {} bytes", stats.memory_usage, stats.max_memory);
/// ```
#[derive(Debug)]
pub struct CacheStore {
    state: Mutex<StoreState>,
    config: CacheConfig,
    estimator: SizeEstimator,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Create a store using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            config,
            estimator: SizeEstimator::new(),
            policy: EvictionPolicy::new(),
            clock,
        }
    }

    /// Replace the size estimator
    pub fn with_estimator(mut self, estimator: SizeEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Store a value with the category's default TTL
    pub fn set(&self, category: &str, key: &str, value: impl Into<CacheValue>) {
        self.set_with(category, key, value, SetOptions::default());
    }

    /// Store a value
    ///
    /// If the estimated size would push usage over the budget, eviction runs
    /// first. Failures are logged and swallowed; the cache is best effort.
    pub fn set_with(&self, category: &str, key: &str, value: impl Into<CacheValue>, opts: SetOptions) {
        if let Err(error) = self.insert(category, key, value.into(), opts) {
            warn!(%error, category, key, "cache set failed");
        }
    }

    fn insert(
        &self,
        category: &str,
        key: &str,
        value: CacheValue,
        opts: SetOptions,
    ) -> Result<(), CacheError> {
        let cache_key = CacheKey::new(category, key);
        let size = match opts.size_hint {
            Some(hint) => hint,
            None => self.estimator.estimate(&value),
        };
        let profile = self.config.categories.resolve(category);
        let ttl = opts.ttl.unwrap_or(profile.default_ttl);
        let now = self.clock.now();
        let expires_at = now.checked_add(ttl).ok_or_else(|| CacheError::ExpiryOverflow {
            key: cache_key.to_string(),
            ttl,
        })?;

        let mut state = self.state.lock();

        let replaced = state.entries.get(&cache_key).map_or(0, CacheEntry::size_bytes);
        let projected = (state.memory_usage - replaced)
            .checked_add(size)
            .ok_or_else(|| CacheError::AccountingOverflow {
                key: cache_key.to_string(),
                size,
            })?;

        // Overwrites release the old bytes first so the old value is never
        // its own eviction victim.
        state.remove(&cache_key);

        if projected > self.config.max_memory {
            let required = projected - self.config.max_memory;
            let freed = state.evict(&self.policy, EvictionTarget::Bytes(required));
            if freed < required {
                debug!(required, freed, "memory budget still exceeded after eviction");
            }
        }

        if state.entries.len() >= self.config.max_entries {
            let excess = state.entries.len() + 1 - self.config.max_entries;
            state.evict(&self.policy, EvictionTarget::Entries(excess));
        }

        state.memory_usage += size;
        state
            .entries
            .insert(cache_key, CacheEntry::new(Arc::new(value), size, profile, now, expires_at));

        Ok(())
    }

    /// Retrieve a value
    ///
    /// Returns `None` if the entry is missing or expired. Reading an expired
    /// entry removes it. Every call counts one hit or one miss.
    pub fn get(&self, category: &str, key: &str) -> Option<Arc<CacheValue>> {
        let cache_key = CacheKey::new(category, key);
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.entries.get_mut(&cache_key) {
            None => {
                state.misses += 1;
                return None;
            }
            Some(entry) if !entry.is_expired(now) => {
                entry.touch(now);
                state.hits += 1;
                return Some(Arc::clone(entry.value()));
            }
            Some(_) => {}
        }

        state.remove(&cache_key);
        state.expirations += 1;
        state.misses += 1;
        None
    }

    /// Check whether a live entry exists without updating access tracking
    ///
    /// An expired entry is removed and reported as absent.
    pub fn has(&self, category: &str, key: &str) -> bool {
        let cache_key = CacheKey::new(category, key);
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired = match state.entries.get(&cache_key) {
            None => return false,
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            state.remove(&cache_key);
            state.expirations += 1;
        }
        !expired
    }

    /// Remove an entry. Returns whether an entry was removed.
    pub fn delete(&self, category: &str, key: &str) -> bool {
        let cache_key = CacheKey::new(category, key);
        self.state.lock().remove(&cache_key).is_some()
    }

    /// Remove every entry of a category. Returns the number removed.
    pub fn clear_category(&self, category: &str) -> usize {
        let removed = self.state.lock().retain(|key, _| key.category() != category);
        debug!(category, removed, "cleared cache category");
        removed
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.memory_usage = 0;
        debug!(removed, "cleared cache");
        removed
    }

    /// Evict non-persistent entries until at least `bytes` are freed or no
    /// candidates remain. Returns the bytes actually freed.
    pub fn evict(&self, bytes: usize) -> usize {
        self.state.lock().evict(&self.policy, EvictionTarget::Bytes(bytes))
    }

    /// Remove every entry whose TTL has run out. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let removed = state.retain(|_, entry| !entry.is_expired(now));
        state.expirations += removed as u64;
        removed
    }

    /// Metadata of a live entry, without counting an access
    pub fn entry_info(&self, category: &str, key: &str) -> Option<EntryInfo> {
        let cache_key = CacheKey::new(category, key);
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .entries
            .get(&cache_key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.info(&cache_key, now))
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entry_count: state.entries.len(),
            memory_usage: state.memory_usage,
            max_memory: self.config.max_memory,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }

    /// Reset hit, miss, eviction and expiration counters
    pub fn reset_stats(&self) {
        let mut state = self.state.lock();
        state.hits = 0;
        state.misses = 0;
        state.evictions = 0;
        state.expirations = 0;
    }

    /// Entries and bytes per category, computed from the live entries
    pub fn memory_breakdown(&self) -> BTreeMap<String, CategoryUsage> {
        let state = self.state.lock();
        let mut breakdown: BTreeMap<String, CategoryUsage> = BTreeMap::new();
        for (key, entry) in &state.entries {
            let usage = breakdown.entry(key.category().to_string()).or_default();
            usage.entries += 1;
            usage.bytes += entry.size_bytes();
        }
        breakdown
    }

    /// Get the current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.state.lock().memory_usage
    }

    /// Get the number of entries currently in the cache
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
