//! Engine configuration
//!
//! A single TOML file configures every component:
//!
//! ```toml
//! [cache]
//! max_memory_mb = 50
//! max_entries = 1000
//! cleanup_interval_ms = 120000
//!
//! [cache.categories.SPRITES]
//! ttl_ms = 3600000
//! priority = "low"
//!
//! [profiler]
//! slow_threshold_ms = 100
//!
//! [insights]
//! memory_pressure_percent = 80
//! slow_window_ms = 300000
//! ```
//!
//! Missing sections and keys keep their defaults. Durations are whole
//! milliseconds, so [`EngineConfig::to_toml`] refuses durations it could not
//! load back unchanged.

use std::fs;
use std::path::Path;
use std::time::Duration;

use pokedex_cache::config::duration_millis;
use pokedex_cache::{CacheConfig, CacheSection};
use serde::{Deserialize, Serialize};

use crate::insights::InsightConfig;
use crate::profiler::ProfilerConfig;

pub use pokedex_cache::ConfigError;

/// Environment variable overriding [`ProfilerConfig::slow_threshold`] (milliseconds)
pub const ENV_PROFILER_SLOW_MS: &str = "POKEDEX_PROFILER_SLOW_MS";

/// Configuration of a [`crate::PerformanceEngine`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub profiler: ProfilerConfig,
    pub insights: InsightConfig,
}

impl EngineConfig {
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_insights(mut self, insights: InsightConfig) -> Self {
        self.insights = insights;
        self
    }

    /// Loads the default configuration with environment overrides applied.
    ///
    /// Reads the cache variables (see [`CacheConfig::from_env`]) and
    /// `POKEDEX_PROFILER_SLOW_MS`.
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Applies environment overrides on top of `self`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.cache.apply_env()?;

        if let Ok(val) = std::env::var(ENV_PROFILER_SLOW_MS) {
            let ms = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue(ENV_PROFILER_SLOW_MS.to_string()))?;
            self.profiler.slow_threshold = Duration::from_millis(ms);
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: EngineFile = toml::from_str(toml_str)?;
        file.into_config()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(&EngineFile::try_from(self)?)?)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct EngineFile {
    cache: CacheSection,
    profiler: ProfilerSection,
    insights: InsightSection,
}

impl EngineFile {
    fn into_config(self) -> Result<EngineConfig, ConfigError> {
        let profiler = &self.profiler;
        if profiler.slow_sample_retain > profiler.slow_sample_cap {
            return Err(ConfigError::InvalidValue("profiler.slow_sample_retain".to_string()));
        }
        for (key, percent) in [
            ("insights.memory_pressure_percent", self.insights.memory_pressure_percent),
            ("insights.evict_percent", self.insights.evict_percent),
        ] {
            if percent > 100 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }
        if self.insights.slow_window_ms == 0 {
            return Err(ConfigError::InvalidValue("insights.slow_window_ms".to_string()));
        }

        Ok(EngineConfig {
            cache: self.cache.into_config()?,
            profiler: self.profiler.into(),
            insights: self.insights.into(),
        })
    }
}

impl TryFrom<&EngineConfig> for EngineFile {
    type Error = ConfigError;

    fn try_from(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cache: CacheSection::try_from(&config.cache)?,
            profiler: ProfilerSection::try_from(config.profiler)?,
            insights: InsightSection::try_from(config.insights)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct ProfilerSection {
    slow_threshold_ms: u64,
    slow_sample_cap: usize,
    slow_sample_retain: usize,
}

impl Default for ProfilerSection {
    fn default() -> Self {
        let defaults = ProfilerConfig::default();
        Self {
            slow_threshold_ms: defaults.slow_threshold.as_millis() as u64,
            slow_sample_cap: defaults.slow_sample_cap,
            slow_sample_retain: defaults.slow_sample_retain,
        }
    }
}

impl TryFrom<ProfilerConfig> for ProfilerSection {
    type Error = ConfigError;

    fn try_from(config: ProfilerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            slow_threshold_ms: duration_millis("profiler.slow_threshold_ms", config.slow_threshold)?,
            slow_sample_cap: config.slow_sample_cap,
            slow_sample_retain: config.slow_sample_retain,
        })
    }
}

impl From<ProfilerSection> for ProfilerConfig {
    fn from(section: ProfilerSection) -> Self {
        ProfilerConfig::default()
            .with_slow_threshold(Duration::from_millis(section.slow_threshold_ms))
            .with_slow_samples(section.slow_sample_cap, section.slow_sample_retain)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct InsightSection {
    memory_pressure_percent: u8,
    evict_percent: u8,
    slow_burst_count: usize,
    slow_window_ms: u64,
    min_hit_rate: f64,
    min_lookups_for_hit_rate: u64,
    recent_slow_limit: usize,
    top_operations_limit: usize,
}

impl Default for InsightSection {
    fn default() -> Self {
        let defaults = InsightConfig::default();
        Self {
            memory_pressure_percent: defaults.memory_pressure_percent,
            evict_percent: defaults.evict_percent,
            slow_burst_count: defaults.slow_burst_count,
            slow_window_ms: defaults.slow_window.as_millis() as u64,
            min_hit_rate: defaults.min_hit_rate,
            min_lookups_for_hit_rate: defaults.min_lookups_for_hit_rate,
            recent_slow_limit: defaults.recent_slow_limit,
            top_operations_limit: defaults.top_operations_limit,
        }
    }
}

impl TryFrom<InsightConfig> for InsightSection {
    type Error = ConfigError;

    fn try_from(config: InsightConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            memory_pressure_percent: config.memory_pressure_percent,
            evict_percent: config.evict_percent,
            slow_burst_count: config.slow_burst_count,
            slow_window_ms: duration_millis("insights.slow_window_ms", config.slow_window)?,
            min_hit_rate: config.min_hit_rate,
            min_lookups_for_hit_rate: config.min_lookups_for_hit_rate,
            recent_slow_limit: config.recent_slow_limit,
            top_operations_limit: config.top_operations_limit,
        })
    }
}

impl From<InsightSection> for InsightConfig {
    fn from(section: InsightSection) -> Self {
        Self {
            memory_pressure_percent: section.memory_pressure_percent,
            evict_percent: section.evict_percent,
            slow_burst_count: section.slow_burst_count,
            slow_window: Duration::from_millis(section.slow_window_ms),
            min_hit_rate: section.min_hit_rate,
            min_lookups_for_hit_rate: section.min_lookups_for_hit_rate,
            recent_slow_limit: section.recent_slow_limit,
            top_operations_limit: section.top_operations_limit,
        }
    }
}
