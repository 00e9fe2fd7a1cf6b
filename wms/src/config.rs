//! Runtime configuration
//!
//! Limits can come from a TOML file:
//!
//! ```toml
//! string_pool_capacity = 8192
//! array_pool_capacity = 4096
//! max_call_depth = 2000
//! ```
//!
//! Missing keys fall back to the defaults below.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_POOL_CAPACITY: usize = 4096;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Slots in the string pool
    pub string_pool_capacity: usize,
    /// Slots in the array-cell pool (heads and elements together)
    pub array_pool_capacity: usize,
    /// Nested user/foreign calls allowed before a stack overflow error
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            string_pool_capacity: DEFAULT_POOL_CAPACITY,
            array_pool_capacity: DEFAULT_POOL_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WmsError;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.string_pool_capacity, 4096);
        assert_eq!(config.array_pool_capacity, 4096);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str("string_pool_capacity = 16").unwrap();
        assert_eq!(config.string_pool_capacity, 16);
        assert_eq!(config.array_pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RuntimeConfig::from_toml_str("pool = 3").unwrap_err();
        assert!(matches!(err, WmsError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::load(Path::new("/nonexistent/wms.toml")).unwrap_err();
        assert!(matches!(err, WmsError::Io(_)));
    }
}
