//! Cache entries and their metadata

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::category::{CachePriority, CategoryProfile};
use crate::value::CacheValue;

/// Composite key identifying an entry across categories
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    category: String,
    key: String,
}

impl CacheKey {
    pub fn new(category: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}

/// A stored value together with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Arc<CacheValue>,
    size_bytes: usize,
    created_at: SystemTime,
    accessed_at: SystemTime,
    expires_at: SystemTime,
    access_count: u64,
    priority: CachePriority,
    persistent: bool,
}

impl CacheEntry {
    pub(crate) fn new(
        value: Arc<CacheValue>,
        size_bytes: usize,
        profile: CategoryProfile,
        now: SystemTime,
        expires_at: SystemTime,
    ) -> Self {
        Self {
            value,
            size_bytes,
            created_at: now,
            accessed_at: now,
            expires_at,
            access_count: 0,
            priority: profile.priority,
            persistent: profile.persistent,
        }
    }

    pub fn value(&self) -> &Arc<CacheValue> {
        &self.value
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn accessed_at(&self) -> SystemTime {
        self.accessed_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn priority(&self) -> CachePriority {
        self.priority
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// An entry is expired once `now` is strictly past its expiry instant
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at < now
    }

    /// Record a read. `accessed_at` never moves backwards.
    pub(crate) fn touch(&mut self, now: SystemTime) {
        if now > self.accessed_at {
            self.accessed_at = now;
        }
        self.access_count += 1;
    }

    pub(crate) fn info(&self, key: &CacheKey, now: SystemTime) -> EntryInfo {
        EntryInfo {
            category: key.category().to_string(),
            key: key.key().to_string(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
            accessed_at: self.accessed_at,
            expires_at: self.expires_at,
            ttl_remaining: self.expires_at.duration_since(now).unwrap_or(Duration::ZERO),
            access_count: self.access_count,
            priority: self.priority,
            persistent: self.persistent,
        }
    }
}

/// Serializable snapshot of an entry's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub category: String,
    pub key: String,
    pub size_bytes: usize,
    pub created_at: SystemTime,
    pub accessed_at: SystemTime,
    pub expires_at: SystemTime,
    pub ttl_remaining: Duration,
    pub access_count: u64,
    pub priority: CachePriority,
    pub persistent: bool,
}
