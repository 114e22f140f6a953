//! Approximate memory footprint of cached values
//!
//! The model is deliberately simple and mirrors what a JavaScript heap would
//! charge for the same document: 2 bytes per UTF-16 character, 8 bytes per
//! number, fixed overheads for containers. Blobs cost their exact length.

use std::collections::HashSet;

use crate::error::EstimationError;
use crate::value::CacheValue;

/// Bytes charged for a boolean
pub const BOOL_SIZE: usize = 4;
/// Bytes charged for a number
pub const NUMBER_SIZE: usize = 8;
/// Bytes charged per string or key character
pub const CHAR_SIZE: usize = 2;
/// Fixed overhead of an array
pub const ARRAY_OVERHEAD: usize = 24;
/// Fixed overhead of an object
pub const OBJECT_OVERHEAD: usize = 16;
/// Cost of values the model does not understand
pub const DEFAULT_SIZE: usize = 1024;
/// Deepest nesting walked before giving up
pub const MAX_DEPTH: usize = 512;

/// Recursive size estimator
#[derive(Debug, Clone, Copy)]
pub struct SizeEstimator {
    default_size: usize,
    max_depth: usize,
}

impl SizeEstimator {
    pub fn new() -> Self {
        Self {
            default_size: DEFAULT_SIZE,
            max_depth: MAX_DEPTH,
        }
    }

    /// Override the cost charged for opaque or unmeasurable values
    pub fn with_default_size(mut self, bytes: usize) -> Self {
        self.default_size = bytes;
        self
    }

    /// Override the nesting limit
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn default_size(&self) -> usize {
        self.default_size
    }

    /// Estimate the footprint of `value` in bytes.
    ///
    /// Never fails: if the walk cannot finish the default size is returned.
    pub fn estimate(&self, value: &CacheValue) -> usize {
        match self.try_estimate(value) {
            Ok(size) => size,
            Err(error) => {
                tracing::debug!(%error, fallback = self.default_size, "size estimate failed");
                self.default_size
            }
        }
    }

    /// Estimate the footprint of `value`, reporting why a walk failed.
    pub fn try_estimate(&self, value: &CacheValue) -> Result<usize, EstimationError> {
        let mut visited = HashSet::new();
        self.walk(value, 0, &mut visited)
    }

    fn walk(
        &self,
        value: &CacheValue,
        depth: usize,
        visited: &mut HashSet<usize>,
    ) -> Result<usize, EstimationError> {
        if depth > self.max_depth {
            return Err(EstimationError::TooDeep {
                limit: self.max_depth,
            });
        }

        let size = match value {
            CacheValue::Null => 0,
            CacheValue::Bool(_) => BOOL_SIZE,
            CacheValue::Number(_) => NUMBER_SIZE,
            CacheValue::String(s) => chars_size(s)?,
            CacheValue::Bytes(bytes) => bytes.len(),
            CacheValue::Array(items) => items.iter().try_fold(ARRAY_OVERHEAD, |acc, item| {
                checked_add(acc, self.walk(item, depth + 1, visited)?)
            })?,
            CacheValue::Object(map) => {
                map.iter().try_fold(OBJECT_OVERHEAD, |acc, (key, child)| {
                    let acc = checked_add(acc, chars_size(key)?)?;
                    checked_add(acc, self.walk(child, depth + 1, visited)?)
                })?
            }
            CacheValue::Shared(inner) => {
                // Address of the shared allocation identifies it for this walk.
                let addr = std::sync::Arc::as_ptr(inner) as usize;
                if visited.insert(addr) {
                    self.walk(inner, depth + 1, visited)?
                } else {
                    0
                }
            }
            CacheValue::Opaque(_) => self.default_size,
        };

        Ok(size)
    }
}

impl Default for SizeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

fn chars_size(s: &str) -> Result<usize, EstimationError> {
    s.encode_utf16()
        .count()
        .checked_mul(CHAR_SIZE)
        .ok_or(EstimationError::Overflow)
}

fn checked_add(a: usize, b: usize) -> Result<usize, EstimationError> {
    a.checked_add(b).ok_or(EstimationError::Overflow)
}
