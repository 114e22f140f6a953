//! Performance engine
//!
//! Owns one cache store, one profiler, the insight engine and the expiry
//! reaper. Each engine is independent; build as many as needed.

use std::sync::Arc;

use parking_lot::Mutex;
use pokedex_cache::{CacheStore, Clock, ExpiryReaper, SystemClock};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::insights::{InsightEngine, Insights};
use crate::profiler::OperationProfiler;
use crate::suggestion::Remediation;

/// Cache, profiler and insights behind one handle
///
/// # Example
///
/// ```
/// use pokedex_perf::{EngineConfig, PerformanceEngine};
///
/// let engine = PerformanceEngine::new(EngineConfig::default()).unwrap();
///
/// let sprite: Result<Vec<u8>, std::io::Error> =
///     engine.profiler().measure("load_sprite", || Ok(vec![0u8; 64]));
/// engine.cache().set("SPRITES", "pikachu", sprite.unwrap());
///
/// let insights = engine.get_insights();
/// assert_eq!(insights.cache_stats.entry_count, 1);
///
/// engine.shutdown();
/// ```
#[derive(Debug)]
pub struct PerformanceEngine {
    cache: Arc<CacheStore>,
    profiler: Arc<OperationProfiler>,
    insights: InsightEngine,
    reaper: Mutex<Option<ExpiryReaper>>,
}

impl PerformanceEngine {
    /// Build an engine on the system clock and start its expiry reaper.
    ///
    /// # Errors
    /// Returns [`EngineError::Cache`] if the reaper thread cannot be spawned.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine whose store and profiler read time from `clock`
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        let interval = config.cache.cleanup_interval;
        let cache = Arc::new(CacheStore::with_clock(config.cache, Arc::clone(&clock)));
        let profiler = Arc::new(OperationProfiler::with_clock(config.profiler, clock));
        let reaper = ExpiryReaper::start(Arc::clone(&cache), interval)?;

        info!(
            max_memory = cache.config().max_memory,
            max_entries = cache.config().max_entries,
            "performance engine started"
        );

        Ok(Self {
            cache,
            profiler,
            insights: InsightEngine::new(config.insights),
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Build an engine from environment overrides on the default configuration
    pub fn from_env() -> Result<Self, EngineError> {
        Self::new(EngineConfig::from_env()?)
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn profiler(&self) -> &Arc<OperationProfiler> {
        &self.profiler
    }

    pub fn insight_engine(&self) -> &InsightEngine {
        &self.insights
    }

    /// Snapshot of cache and profiler state with fresh suggestions
    pub fn get_insights(&self) -> Insights {
        let config = self.insights.config();
        let now = self.cache.clock().now();
        let cache_stats = self.cache.stats();
        let window = self.profiler.recent_slow_operations(config.slow_window);
        let suggestions = self.insights.generate_suggestions(&cache_stats, &window, now);

        Insights {
            cache_stats,
            slow_operations: self.profiler.slow_operations(config.recent_slow_limit),
            top_operations: self.profiler.top_operations(config.top_operations_limit),
            memory_breakdown: self.cache.memory_breakdown(),
            suggestions,
        }
    }

    /// Carry out a suggested action. Returns the bytes freed.
    pub fn apply_remediation(&self, remediation: &Remediation) -> usize {
        match *remediation {
            Remediation::EvictPercentage(percent) => {
                let usage = self.cache.memory_usage();
                let target = (usage as u128 * u128::from(percent.min(100)) / 100) as usize;
                let freed = self.cache.evict(target);
                info!(percent, target, freed, "applied eviction remediation");
                freed
            }
        }
    }

    /// Whether the expiry reaper is still active
    pub fn is_running(&self) -> bool {
        self.reaper.lock().as_ref().is_some_and(ExpiryReaper::is_running)
    }

    /// Stop the reaper and release every cached entry.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let reaper = self.reaper.lock().take();
        let Some(mut reaper) = reaper else {
            return;
        };

        reaper.stop();
        let released = self.cache.clear_all();
        debug!(released, "performance engine shut down");
    }
}

impl Drop for PerformanceEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
