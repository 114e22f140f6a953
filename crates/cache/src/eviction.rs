//! Priority-weighted LRU victim selection
//!
//! Victims are the non-persistent entries ordered by `(priority rank,
//! accessed_at)`: lowest priority first, then least recently used. The policy
//! only selects; [`crate::CacheStore`] removes the selected keys while still
//! holding the lock it used to decide that eviction was needed.

use std::time::SystemTime;

use crate::category::CachePriority;
use crate::entry::{CacheEntry, CacheKey};

/// How much an eviction pass has to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionTarget {
    /// Free at least this many bytes
    Bytes(usize),
    /// Remove this many entries
    Entries(usize),
}

impl EvictionTarget {
    fn is_met(self, freed_bytes: usize, removed: usize) -> bool {
        match self {
            EvictionTarget::Bytes(bytes) => freed_bytes >= bytes,
            EvictionTarget::Entries(count) => removed >= count,
        }
    }
}

/// Entries chosen by one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Keys in removal order
    pub victims: Vec<CacheKey>,
    /// Sum of the victims' sizes
    pub bytes: usize,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }
}

#[derive(Debug)]
struct Candidate<'a> {
    key: &'a CacheKey,
    priority: CachePriority,
    accessed_at: SystemTime,
    size: usize,
}

/// Selects eviction victims
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionPolicy;

impl EvictionPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Pick victims until `target` is met or no candidates remain.
    ///
    /// Persistent entries are never candidates. The plan may fall short of the
    /// target; the caller decides what to do with a partial plan.
    pub fn select<'a, I>(&self, entries: I, target: EvictionTarget) -> EvictionPlan
    where
        I: IntoIterator<Item = (&'a CacheKey, &'a CacheEntry)>,
    {
        let mut plan = EvictionPlan::default();
        if target.is_met(0, 0) {
            return plan;
        }

        let mut candidates: Vec<Candidate<'a>> = entries
            .into_iter()
            .filter(|(_, entry)| !entry.is_persistent())
            .map(|(key, entry)| Candidate {
                key,
                priority: entry.priority(),
                accessed_at: entry.accessed_at(),
                size: entry.size_bytes(),
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then_with(|| a.accessed_at.cmp(&b.accessed_at))
                .then_with(|| a.key.cmp(b.key))
        });

        for candidate in candidates {
            if target.is_met(plan.bytes, plan.victims.len()) {
                break;
            }
            plan.bytes = plan.bytes.saturating_add(candidate.size);
            plan.victims.push(candidate.key.clone());
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryProfile;
    use crate::value::CacheValue;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn entry(priority: CachePriority, persistent: bool, accessed_secs: u64, size: usize) -> CacheEntry {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(accessed_secs);
        let mut profile = CategoryProfile::new(Duration::from_secs(3600), priority);
        profile.persistent = persistent;
        CacheEntry::new(Arc::new(CacheValue::Null), size, profile, at, at + Duration::from_secs(3600))
    }

    fn keys(plan: &EvictionPlan) -> Vec<String> {
        plan.victims.iter().map(|k| k.key().to_string()).collect()
    }

    #[test]
    fn test_priority_before_recency() {
        let mut entries = HashMap::new();
        entries.insert(CacheKey::new("c", "a"), entry(CachePriority::Low, false, 0, 10));
        entries.insert(CacheKey::new("c", "b"), entry(CachePriority::Low, false, 1, 10));
        entries.insert(CacheKey::new("c", "c"), entry(CachePriority::High, false, 0, 10));

        let policy = EvictionPolicy::new();

        let plan = policy.select(&entries, EvictionTarget::Bytes(10));
        assert_eq!(keys(&plan), vec!["a"]);

        let plan = policy.select(&entries, EvictionTarget::Bytes(20));
        assert_eq!(keys(&plan), vec!["a", "b"]);

        let plan = policy.select(&entries, EvictionTarget::Bytes(30));
        assert_eq!(keys(&plan), vec!["a", "b", "c"]);
        assert_eq!(plan.bytes, 30);
    }

    #[test]
    fn test_persistent_entries_are_never_selected() {
        let mut entries = HashMap::new();
        entries.insert(CacheKey::new("c", "pinned"), entry(CachePriority::Low, true, 0, 100));
        entries.insert(CacheKey::new("c", "other"), entry(CachePriority::High, false, 5, 10));

        let plan = EvictionPolicy::new().select(&entries, EvictionTarget::Bytes(1000));
        assert_eq!(keys(&plan), vec!["other"]);
        assert_eq!(plan.bytes, 10);
    }

    #[test]
    fn test_zero_target_selects_nothing() {
        let mut entries = HashMap::new();
        entries.insert(CacheKey::new("c", "a"), entry(CachePriority::Low, false, 0, 10));

        assert!(EvictionPolicy::new().select(&entries, EvictionTarget::Bytes(0)).is_empty());
        assert!(EvictionPolicy::new().select(&entries, EvictionTarget::Entries(0)).is_empty());
    }

    #[test]
    fn test_entry_count_target() {
        let mut entries = HashMap::new();
        for i in 0..5u64 {
            entries.insert(
                CacheKey::new("c", format!("k{}", i)),
                entry(CachePriority::Medium, false, 10 - i, 1),
            );
        }

        let plan = EvictionPolicy::new().select(&entries, EvictionTarget::Entries(2));
        // Oldest access first: k4 (t=6), then k3 (t=7)
        assert_eq!(keys(&plan), vec!["k4", "k3"]);
    }

    #[test]
    fn test_ties_break_on_key() {
        let mut entries = HashMap::new();
        entries.insert(CacheKey::new("c", "zeta"), entry(CachePriority::Low, false, 0, 1));
        entries.insert(CacheKey::new("c", "alpha"), entry(CachePriority::Low, false, 0, 1));

        let plan = EvictionPolicy::new().select(&entries, EvictionTarget::Entries(1));
        assert_eq!(keys(&plan), vec!["alpha"]);
    }
}
