//! Cache categories
//!
//! Every cache entry belongs to a category. The category decides the default
//! time-to-live, the eviction priority and whether eviction may touch the
//! entry at all. Unknown categories resolve to [`CategoryRegistry::fallback`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Eviction priority of a cache entry
///
/// Lower priorities are evicted first. The derived ordering follows the
/// declaration order, so `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePriority {
    /// Cheap to recompute, evicted first
    Low = 0,
    /// Default priority
    Medium = 1,
    /// Expensive to recompute, evicted last
    High = 2,
}

impl CachePriority {
    /// Ordinal used as the primary eviction sort key
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl Default for CachePriority {
    fn default() -> Self {
        CachePriority::Medium
    }
}

/// Per-category caching behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryProfile {
    /// TTL used when `set` is called without an override
    pub default_ttl: Duration,
    /// Eviction priority of entries in this category
    pub priority: CachePriority,
    /// Persistent entries are never chosen as eviction victims
    pub persistent: bool,
}

impl CategoryProfile {
    pub fn new(default_ttl: Duration, priority: CachePriority) -> Self {
        Self {
            default_ttl,
            priority,
            persistent: false,
        }
    }

    /// Mark the profile as persistent (exempt from eviction)
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

impl Default for CategoryProfile {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60), CachePriority::Medium)
    }
}

/// Category name constants used by the application
pub mod names {
    pub const POKEMON_DATA: &str = "POKEMON_DATA";
    pub const SPECIES_DATA: &str = "SPECIES_DATA";
    pub const MOVE_DATA: &str = "MOVE_DATA";
    pub const TYPE_CHART: &str = "TYPE_CHART";
    pub const SPRITES: &str = "SPRITES";
    pub const SEARCH_RESULTS: &str = "SEARCH_RESULTS";
    pub const TEAM_ANALYSIS: &str = "TEAM_ANALYSIS";
    pub const AI_RESPONSES: &str = "AI_RESPONSES";
    pub const USER_PREFERENCES: &str = "USER_PREFERENCES";
}

/// Lookup table from category name to [`CategoryProfile`]
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRegistry {
    profiles: HashMap<String, CategoryProfile>,
    fallback: CategoryProfile,
}

impl CategoryRegistry {
    /// Registry with no categories; every lookup returns `fallback`
    pub fn empty(fallback: CategoryProfile) -> Self {
        Self {
            profiles: HashMap::new(),
            fallback,
        }
    }

    /// Add or replace a category
    pub fn with_category(mut self, name: impl Into<String>, profile: CategoryProfile) -> Self {
        self.insert(name, profile);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: CategoryProfile) {
        self.profiles.insert(name.into(), profile);
    }

    /// Replace the profile used for unknown categories
    pub fn with_fallback(mut self, fallback: CategoryProfile) -> Self {
        self.fallback = fallback;
        self
    }

    /// Resolve a category, falling back to the default profile
    pub fn resolve(&self, category: &str) -> CategoryProfile {
        self.profiles.get(category).copied().unwrap_or(self.fallback)
    }

    /// Look up a category without falling back
    pub fn get(&self, category: &str) -> Option<&CategoryProfile> {
        self.profiles.get(category)
    }

    pub fn fallback(&self) -> CategoryProfile {
        self.fallback
    }

    /// Whether the category was registered explicitly
    pub fn contains(&self, category: &str) -> bool {
        self.profiles.contains_key(category)
    }

    /// Iterate over the registered categories
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryProfile)> {
        self.profiles.iter().map(|(name, profile)| (name.as_str(), profile))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for CategoryRegistry {
    /// The application's category table
    fn default() -> Self {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;

        Self::empty(CategoryProfile::default())
            .with_category(
                names::POKEMON_DATA,
                CategoryProfile::new(Duration::from_secs(30 * MINUTE), CachePriority::High),
            )
            .with_category(
                names::SPECIES_DATA,
                CategoryProfile::new(Duration::from_secs(30 * MINUTE), CachePriority::High),
            )
            .with_category(
                names::MOVE_DATA,
                CategoryProfile::new(Duration::from_secs(HOUR), CachePriority::Medium),
            )
            .with_category(
                names::TYPE_CHART,
                CategoryProfile::new(Duration::from_secs(24 * HOUR), CachePriority::High)
                    .persistent(),
            )
            .with_category(
                names::SPRITES,
                CategoryProfile::new(Duration::from_secs(HOUR), CachePriority::Low),
            )
            .with_category(
                names::SEARCH_RESULTS,
                CategoryProfile::new(Duration::from_secs(5 * MINUTE), CachePriority::Low),
            )
            .with_category(
                names::TEAM_ANALYSIS,
                CategoryProfile::new(Duration::from_secs(10 * MINUTE), CachePriority::Medium),
            )
            .with_category(
                names::AI_RESPONSES,
                CategoryProfile::new(Duration::from_secs(15 * MINUTE), CachePriority::Medium),
            )
            .with_category(
                names::USER_PREFERENCES,
                CategoryProfile::new(Duration::from_secs(24 * HOUR), CachePriority::High)
                    .persistent(),
            )
    }
}
