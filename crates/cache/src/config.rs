//! Cache configuration
//!
//! [`CacheConfig`] is built programmatically through its `with_*` methods,
//! from environment variables, or from TOML through [`CacheSection`], the
//! serializable form used inside the engine configuration file.
//!
//! The file format stores memory in bytes and durations in milliseconds, so a
//! saved configuration loads back unchanged. `max_memory_mb` is accepted as a
//! shorthand when reading.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::{CachePriority, CategoryProfile, CategoryRegistry};

const MB: usize = 1024 * 1024;

/// Environment variable overriding [`CacheConfig::max_memory`] (megabytes)
pub const ENV_MAX_MEMORY_MB: &str = "POKEDEX_CACHE_MAX_MEMORY_MB";
/// Environment variable overriding [`CacheConfig::max_entries`]
pub const ENV_MAX_ENTRIES: &str = "POKEDEX_CACHE_MAX_ENTRIES";
/// Environment variable overriding [`CacheConfig::cleanup_interval`] (seconds)
pub const ENV_CLEANUP_SECS: &str = "POKEDEX_CACHE_CLEANUP_SECS";

/// Configuration of a [`crate::CacheStore`] and its reaper.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Soft memory budget in bytes
    pub max_memory: usize,
    /// Soft limit on the number of entries
    pub max_entries: usize,
    /// How often the expiry reaper sweeps the store; must be non-zero
    pub cleanup_interval: Duration,
    /// Per-category TTL, priority and persistence
    pub categories: CategoryRegistry,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory: 50 * MB,
            max_entries: 1000,
            cleanup_interval: Duration::from_secs(2 * 60),
            categories: CategoryRegistry::default(),
        }
    }
}

impl CacheConfig {
    /// Sets the memory budget in bytes.
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Sets the memory budget in megabytes.
    pub fn with_max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory = mb.saturating_mul(MB);
        self
    }

    /// Sets the soft entry limit.
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Sets the reaper interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Adds or replaces a category profile.
    pub fn with_category(mut self, name: impl Into<String>, profile: CategoryProfile) -> Self {
        self.categories.insert(name, profile);
        self
    }

    /// Replaces the whole category table.
    pub fn with_categories(mut self, categories: CategoryRegistry) -> Self {
        self.categories = categories;
        self
    }

    /// Returns the memory budget in whole megabytes.
    pub fn max_memory_mb(&self) -> usize {
        self.max_memory / MB
    }

    /// Loads the default configuration with environment overrides applied.
    ///
    /// Environment variables:
    /// - `POKEDEX_CACHE_MAX_MEMORY_MB`: memory budget in MB (default: 50)
    /// - `POKEDEX_CACHE_MAX_ENTRIES`: entry limit (default: 1000)
    /// - `POKEDEX_CACHE_CLEANUP_SECS`: reaper interval in seconds, at least 1 (default: 120)
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
        if let Some(mb) = env_number(ENV_MAX_MEMORY_MB)? {
            self.max_memory = usize::try_from(mb)
                .map_err(|_| ConfigError::InvalidValue(ENV_MAX_MEMORY_MB.to_string()))?
                .saturating_mul(MB);
        }

        if let Some(entries) = env_number(ENV_MAX_ENTRIES)? {
            self.max_entries = usize::try_from(entries)
                .map_err(|_| ConfigError::InvalidValue(ENV_MAX_ENTRIES.to_string()))?;
        }

        if let Some(secs) = env_number(ENV_CLEANUP_SECS)? {
            if secs == 0 {
                return Err(ConfigError::InvalidValue(ENV_CLEANUP_SECS.to_string()));
            }
            self.cleanup_interval = Duration::from_secs(secs);
        }

        Ok(())
    }

    /// Parses a configuration whose keys are at the top level of the document.
    ///
    /// ```toml
    /// max_memory_mb = 64
    /// max_entries = 500
    /// cleanup_interval_ms = 60000
    ///
    /// [categories.SPRITES]
    /// ttl_ms = 3600000
    /// priority = "low"
    /// ```
    ///
    /// Without a `categories` table the built-in table is used; a listed
    /// table replaces it entirely.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let section: CacheSection = toml::from_str(toml_str)?;
        section.into_config()
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for durations with a
    /// sub-millisecond part, which the file format cannot hold.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(&CacheSection::try_from(self)?)?)
    }
}

fn env_number(name: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Converts `duration` to whole milliseconds for a configuration file.
///
/// Fails with [`ConfigError::InvalidValue`] naming `key` if the duration has a
/// sub-millisecond part or does not fit in a `u64`.
pub fn duration_millis(key: &str, duration: Duration) -> Result<u64, ConfigError> {
    if duration.subsec_nanos() % 1_000_000 != 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    u64::try_from(duration.as_millis()).map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Serializable form of a [`CategoryProfile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySection {
    pub ttl_ms: u64,
    #[serde(default)]
    pub priority: CachePriority,
    #[serde(default)]
    pub persistent: bool,
}

impl CategorySection {
    fn from_profile(key: &str, profile: CategoryProfile) -> Result<Self, ConfigError> {
        Ok(Self {
            ttl_ms: duration_millis(key, profile.default_ttl)?,
            priority: profile.priority,
            persistent: profile.persistent,
        })
    }
}

impl Default for CategorySection {
    fn default() -> Self {
        let profile = CategoryProfile::default();
        Self {
            ttl_ms: profile.default_ttl.as_millis() as u64,
            priority: profile.priority,
            persistent: profile.persistent,
        }
    }
}

impl From<CategorySection> for CategoryProfile {
    fn from(section: CategorySection) -> Self {
        Self {
            default_ttl: Duration::from_millis(section.ttl_ms),
            priority: section.priority,
            persistent: section.persistent,
        }
    }
}

/// Serializable form of a [`CacheConfig`]
///
/// Missing keys keep their defaults. A missing `categories` table means the
/// built-in table; a present one is used as the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_bytes: Option<usize>,
    /// Shorthand for `max_memory_bytes`; setting both is an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<usize>,
    pub max_entries: usize,
    pub cleanup_interval_ms: u64,
    pub default_category: CategorySection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, CategorySection>>,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_memory_bytes: None,
            max_memory_mb: None,
            max_entries: defaults.max_entries,
            cleanup_interval_ms: defaults.cleanup_interval.as_millis() as u64,
            default_category: CategorySection::default(),
            categories: None,
        }
    }
}

impl CacheSection {
    /// Validates the section and builds the configuration it describes.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if both memory keys are set, the
    /// megabyte value overflows, or the cleanup interval is zero.
    pub fn into_config(self) -> Result<CacheConfig, ConfigError> {
        let max_memory = match (self.max_memory_bytes, self.max_memory_mb) {
            (Some(_), Some(_)) => return Err(ConfigError::InvalidValue("max_memory_mb".to_string())),
            (Some(bytes), None) => bytes,
            (None, Some(mb)) => mb
                .checked_mul(MB)
                .ok_or_else(|| ConfigError::InvalidValue("max_memory_mb".to_string()))?,
            (None, None) => CacheConfig::default().max_memory,
        };

        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("cleanup_interval_ms".to_string()));
        }

        let fallback = CategoryProfile::from(self.default_category);
        let categories = match self.categories {
            Some(table) => table
                .into_iter()
                .fold(CategoryRegistry::empty(fallback), |registry, (name, section)| {
                    registry.with_category(name, section.into())
                }),
            None => CategoryRegistry::default().with_fallback(fallback),
        };

        Ok(CacheConfig {
            max_memory,
            max_entries: self.max_entries,
            cleanup_interval: Duration::from_millis(self.cleanup_interval_ms),
            categories,
        })
    }
}

impl TryFrom<&CacheConfig> for CacheSection {
    type Error = ConfigError;

    fn try_from(config: &CacheConfig) -> Result<Self, ConfigError> {
        let categories = config
            .categories
            .iter()
            .map(|(name, profile)| {
                let key = format!("categories.{}.ttl_ms", name);
                Ok((name.to_string(), CategorySection::from_profile(&key, *profile)?))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(Self {
            max_memory_bytes: Some(config.max_memory),
            max_memory_mb: None,
            max_entries: config.max_entries,
            cleanup_interval_ms: duration_millis("cleanup_interval_ms", config.cleanup_interval)?,
            default_category: CategorySection::from_profile(
                "default_category.ttl_ms",
                config.categories.fallback(),
            )?,
            categories: Some(categories),
        })
    }
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    /// I/O error reading or writing a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed TOML
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Configuration could not be rendered as TOML
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::names;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory, 50 * 1024 * 1024);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(120));
        assert!(config.categories.contains(names::POKEMON_DATA));
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_max_memory_mb(8)
            .with_max_entries(10)
            .with_cleanup_interval(Duration::from_secs(5))
            .with_category("CUSTOM", CategoryProfile::new(Duration::from_secs(9), CachePriority::Low));

        assert_eq!(config.max_memory, 8 * 1024 * 1024);
        assert_eq!(config.max_memory_mb(), 8);
        assert_eq!(config.max_entries, 10);
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
        assert_eq!(config.categories.resolve("CUSTOM").default_ttl, Duration::from_secs(9));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&[ENV_MAX_MEMORY_MB, ENV_MAX_ENTRIES, ENV_CLEANUP_SECS]);

        env::set_var(ENV_MAX_MEMORY_MB, "128");
        env::set_var(ENV_MAX_ENTRIES, "250");
        env::set_var(ENV_CLEANUP_SECS, "30");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.max_memory, 128 * 1024 * 1024);
        assert_eq!(config.max_entries, 250);
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&[ENV_MAX_MEMORY_MB, ENV_MAX_ENTRIES, ENV_CLEANUP_SECS]);

        env::remove_var(ENV_MAX_ENTRIES);
        env::remove_var(ENV_CLEANUP_SECS);
        env::set_var(ENV_MAX_MEMORY_MB, "16");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.max_memory, 16 * 1024 * 1024);
        assert_eq!(config.max_entries, 1000); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&[ENV_MAX_ENTRIES]);

        env::set_var(ENV_MAX_ENTRIES, "lots");
        let result = CacheConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == ENV_MAX_ENTRIES));
    }

    // Saves and restores environment variables around a test
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_cleanup_interval() {
        let _guard = EnvGuard::new(&[ENV_CLEANUP_SECS]);

        env::set_var(ENV_CLEANUP_SECS, "0");
        let result = CacheConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == ENV_CLEANUP_SECS));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CacheConfig::from_toml(
            r#"
            max_memory_mb = 64
            max_entries = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.max_memory, 64 * 1024 * 1024);
        assert_eq!(config.max_entries, 200);
        assert_eq!(config.cleanup_interval, Duration::from_secs(120)); // default

        // No table in the file: built-in categories apply
        assert_eq!(config.categories, CategoryRegistry::default());
    }

    #[test]
    fn test_listed_categories_replace_builtin_table() {
        let config = CacheConfig::from_toml(
            r#"
            [categories.SPRITES]
            ttl_ms = 7200000
            priority = "high"
            persistent = true

            [categories.BERRIES]
            ttl_ms = 60000
            "#,
        )
        .unwrap();

        assert_eq!(config.categories.len(), 2);
        assert!(!config.categories.contains(names::POKEMON_DATA));

        let sprites = config.categories.resolve(names::SPRITES);
        assert_eq!(sprites.default_ttl, Duration::from_secs(7200));
        assert_eq!(sprites.priority, CachePriority::High);
        assert!(sprites.persistent);

        let berries = config.categories.resolve("BERRIES");
        assert_eq!(berries.priority, CachePriority::Medium);
        assert!(!berries.persistent);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CacheConfig::default()
            .with_max_memory_mb(32)
            .with_max_entries(64)
            .with_category("BERRIES", CategoryProfile::new(Duration::from_secs(60), CachePriority::Low));

        let toml = config.to_toml().unwrap();
        let parsed = CacheConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_toml_roundtrip_keeps_exact_values() {
        let registry = CategoryRegistry::empty(CategoryProfile::new(Duration::from_millis(750), CachePriority::Low))
            .with_category("BERRIES", CategoryProfile::new(Duration::from_millis(250), CachePriority::High));
        let config = CacheConfig::default()
            .with_max_memory(1000)
            .with_cleanup_interval(Duration::from_millis(1500))
            .with_categories(registry);

        let parsed = CacheConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.max_memory, 1000);
        assert_eq!(parsed.cleanup_interval, Duration::from_millis(1500));
        assert_eq!(parsed.categories.len(), 1);
        assert_eq!(parsed, config);

        let empty = CacheConfig::default().with_categories(CategoryRegistry::empty(CategoryProfile::default()));
        let parsed = CacheConfig::from_toml(&empty.to_toml().unwrap()).unwrap();
        assert!(parsed.categories.is_empty());
        assert_eq!(parsed, empty);
    }

    #[test]
    fn test_to_toml_rejects_sub_millisecond_durations() {
        let config = CacheConfig::default().with_cleanup_interval(Duration::from_micros(1500));
        let result = config.to_toml();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "cleanup_interval_ms"));

        let config = CacheConfig::default()
            .with_category("BERRIES", CategoryProfile::new(Duration::from_nanos(10), CachePriority::Low));
        let result = config.to_toml();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "categories.BERRIES.ttl_ms"));
    }

    #[test]
    fn test_from_toml_rejects_zero_cleanup_interval() {
        let result = CacheConfig::from_toml("cleanup_interval_ms = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "cleanup_interval_ms"));
    }

    #[test]
    fn test_from_toml_rejects_both_memory_keys() {
        let result = CacheConfig::from_toml("max_memory_mb = 1\nmax_memory_bytes = 1024");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let result = CacheConfig::from_toml("max_entries = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
