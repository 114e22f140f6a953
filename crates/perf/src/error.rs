use pokedex_cache::{CacheError, ConfigError};

/// Errors from building or configuring a [`crate::PerformanceEngine`]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
