//! Pokedex Performance Library
//!
//! Operation profiling, insight generation and the [`PerformanceEngine`]
//! that ties them to a [`pokedex_cache::CacheStore`].

pub mod config;
pub mod engine;
pub mod error;
pub mod insights;
pub mod profiler;
pub mod suggestion;

pub use config::{ConfigError, EngineConfig};
pub use engine::PerformanceEngine;
pub use error::EngineError;
pub use insights::{InsightConfig, InsightEngine, Insights};
pub use profiler::{OperationProfiler, OperationStats, Outcome, ProfilerConfig, SlowOperationSample};
pub use suggestion::{Remediation, Suggestion, SuggestionKind, SuggestionPriority};
