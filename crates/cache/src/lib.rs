//! Pokedex Cache Library
//!
//! Category-aware TTL cache with approximate memory accounting,
//! priority-weighted LRU eviction under a soft budget, and a background
//! expiry reaper.

pub mod category;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod eviction;
pub mod reaper;
pub mod size;
pub mod store;
pub mod value;

pub use category::{names, CachePriority, CategoryProfile, CategoryRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheSection, CategorySection, ConfigError};
pub use entry::{CacheEntry, CacheKey, EntryInfo};
pub use error::{CacheError, EstimationError};
pub use eviction::{EvictionPlan, EvictionPolicy, EvictionTarget};
pub use reaper::ExpiryReaper;
pub use size::SizeEstimator;
pub use store::{CacheStats, CacheStore, CategoryUsage, SetOptions};
pub use value::CacheValue;
