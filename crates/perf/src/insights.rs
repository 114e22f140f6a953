//! Insight generation
//!
//! Suggestions are a pure function of a cache statistics snapshot and the
//! slow-sample buffer; nothing here holds state between calls.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime};

use pokedex_cache::{CacheStats, CategoryUsage};
use serde::{Deserialize, Serialize};

use crate::profiler::{within_window, OperationStats, SlowOperationSample};
use crate::suggestion::{Remediation, Suggestion, SuggestionKind, SuggestionPriority};

const MB: f64 = 1024.0 * 1024.0;

/// Thresholds for suggestion generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightConfig {
    /// Memory usage above this share of the budget is reported
    pub memory_pressure_percent: u8,
    /// Share of current usage the memory remediation evicts
    pub evict_percent: u8,
    /// More than this many slow samples within `slow_window` is reported
    pub slow_burst_count: usize,
    pub slow_window: Duration,
    /// Hit rates below this are reported
    pub min_hit_rate: f64,
    /// Lookups needed before the hit rate is judged; with no lookups at all
    /// there is no rate to judge
    pub min_lookups_for_hit_rate: u64,
    /// Slow samples included in [`Insights`]
    pub recent_slow_limit: usize,
    /// Operations included in [`Insights`]
    pub top_operations_limit: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            memory_pressure_percent: 80,
            evict_percent: 30,
            slow_burst_count: 5,
            slow_window: Duration::from_secs(5 * 60),
            min_hit_rate: 0.7,
            min_lookups_for_hit_rate: 1,
            recent_slow_limit: 10,
            top_operations_limit: 10,
        }
    }
}

impl InsightConfig {
    pub fn with_memory_pressure_percent(mut self, percent: u8) -> Self {
        self.memory_pressure_percent = percent;
        self
    }

    pub fn with_evict_percent(mut self, percent: u8) -> Self {
        self.evict_percent = percent.min(100);
        self
    }

    pub fn with_slow_burst(mut self, count: usize, window: Duration) -> Self {
        self.slow_burst_count = count;
        self.slow_window = window;
        self
    }

    pub fn with_min_hit_rate(mut self, rate: f64, min_lookups: u64) -> Self {
        self.min_hit_rate = rate;
        self.min_lookups_for_hit_rate = min_lookups;
        self
    }
}

/// Everything reported by one insight request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub cache_stats: CacheStats,
    pub slow_operations: Vec<SlowOperationSample>,
    pub top_operations: Vec<OperationStats>,
    pub memory_breakdown: BTreeMap<String, CategoryUsage>,
    pub suggestions: Vec<Suggestion>,
}

impl Insights {
    /// Suggestions the engine can act on
    pub fn actionable(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter().filter(|s| s.is_actionable())
    }
}

/// Derives suggestions from cache and profiler snapshots
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    config: InsightConfig,
}

impl InsightEngine {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Suggestions for the given state, memory first, then performance,
    /// then cache.
    pub fn generate_suggestions(
        &self,
        stats: &CacheStats,
        slow_samples: &[SlowOperationSample],
        now: SystemTime,
    ) -> Vec<Suggestion> {
        [
            self.memory_suggestion(stats),
            self.performance_suggestion(slow_samples, now),
            self.cache_suggestion(stats),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn memory_suggestion(&self, stats: &CacheStats) -> Option<Suggestion> {
        // usage / max > percent / 100, kept in integers so the boundary is exact
        let usage = stats.memory_usage as u128 * 100;
        let limit = stats.max_memory as u128 * u128::from(self.config.memory_pressure_percent);
        if usage <= limit {
            return None;
        }

        Some(
            Suggestion::new(
                SuggestionKind::Memory,
                SuggestionPriority::High,
                "High memory usage",
                format!(
                    "Cache is using {:.1}MB of {:.1}MB ({:.0}% of budget)",
                    stats.memory_usage as f64 / MB,
                    stats.max_memory as f64 / MB,
                    stats.memory_utilization() * 100.0,
                ),
                format!(
                    "Evict {}% of cached data, starting with low-priority entries",
                    self.config.evict_percent
                ),
            )
            .with_remediation(Remediation::EvictPercentage(self.config.evict_percent)),
        )
    }

    fn performance_suggestion(&self, slow_samples: &[SlowOperationSample], now: SystemTime) -> Option<Suggestion> {
        let recent: Vec<_> = slow_samples
            .iter()
            .filter(|sample| within_window(sample.timestamp, now, self.config.slow_window))
            .collect();
        if recent.len() <= self.config.slow_burst_count {
            return None;
        }

        let affected: BTreeSet<&str> = recent.iter().map(|sample| sample.operation.as_str()).collect();

        Some(
            Suggestion::new(
                SuggestionKind::Performance,
                SuggestionPriority::Medium,
                "Slow operations detected",
                format!(
                    "{} slow operations in the last {} seconds",
                    recent.len(),
                    self.config.slow_window.as_secs()
                ),
                "Cache the results of the affected operations or reduce their work",
            )
            .with_affected_operations(affected.into_iter().map(str::to_string).collect()),
        )
    }

    fn cache_suggestion(&self, stats: &CacheStats) -> Option<Suggestion> {
        if stats.lookups() == 0 || stats.lookups() < self.config.min_lookups_for_hit_rate {
            return None;
        }
        let hit_rate = stats.hit_rate();
        if hit_rate >= self.config.min_hit_rate {
            return None;
        }

        Some(Suggestion::new(
            SuggestionKind::Cache,
            SuggestionPriority::Medium,
            "Low cache hit rate",
            format!(
                "Hit rate is {:.1}% over {} lookups",
                hit_rate * 100.0,
                stats.lookups()
            ),
            "Increase TTLs for frequently read categories or prefetch common data",
        ))
    }
}
