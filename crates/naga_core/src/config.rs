//! # Runtime Configuration
//!
//! Sizing knobs for the interner and the pool registry, loaded once at
//! startup from TOML.
//!
//! ```toml
//! string_buffer_size = 4096
//! default_objects_per_block = 64
//! max_alignment = 16
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};
use crate::memory::{BLOCK_ALIGN, DEFAULT_BUFFER_SIZE};

/// Objects per block when a caller does not name a capacity.
pub const DEFAULT_OBJECTS_PER_BLOCK: usize = 32;

/// Runtime sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Size of each interner buffer in bytes.
    pub string_buffer_size: usize,
    /// Cells per block for pools created without an explicit capacity.
    pub default_objects_per_block: usize,
    /// Strictest alignment served from pools; stricter types use the heap.
    pub max_alignment: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            string_buffer_size: DEFAULT_BUFFER_SIZE,
            default_objects_per_block: DEFAULT_OBJECTS_PER_BLOCK,
            max_alignment: BLOCK_ALIGN,
        }
    }
}

impl RuntimeConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`] if the document does not parse
    /// or fails [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> RuntimeResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|err| RuntimeError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| RuntimeError::Io(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> RuntimeResult<String> {
        toml::to_string(self).map_err(|err| RuntimeError::InvalidConfig(err.to_string()))
    }

    /// Checks the values for consistency.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ZeroCapacity`] if `default_objects_per_block` is zero
    /// - [`RuntimeError::InvalidConfig`] if the buffer size is zero or the
    ///   alignment is not a power of two
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.default_objects_per_block == 0 {
            return Err(RuntimeError::ZeroCapacity);
        }
        if self.string_buffer_size == 0 {
            return Err(RuntimeError::InvalidConfig(
                "string_buffer_size must be greater than zero".to_string(),
            ));
        }
        if !self.max_alignment.is_power_of_two() {
            return Err(RuntimeError::InvalidConfig(format!(
                "max_alignment must be a power of two, got {}",
                self.max_alignment
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.string_buffer_size, 1024);
        assert_eq!(config.default_objects_per_block, 32);
        assert_eq!(config.max_alignment, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = RuntimeConfig::from_toml_str("string_buffer_size = 4096").unwrap();
        assert_eq!(config.string_buffer_size, 4096);
        assert_eq!(config.default_objects_per_block, DEFAULT_OBJECTS_PER_BLOCK);

        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            RuntimeConfig::from_toml_str("default_objects_per_block = 0"),
            Err(RuntimeError::ZeroCapacity)
        );
        assert!(matches!(
            RuntimeConfig::from_toml_str("max_alignment = 12"),
            Err(RuntimeError::InvalidConfig(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml_str("string_buffer_size = 0"),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_malformed_and_unknown_keys() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("string_buffer_size = \"big\""),
            Err(RuntimeError::InvalidConfig(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml_str("pool_size = 3"),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_toml_text_reloads() {
        let config = RuntimeConfig {
            string_buffer_size: 256,
            default_objects_per_block: 8,
            max_alignment: 8,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            RuntimeConfig::from_toml_file("/nonexistent/naga.toml"),
            Err(RuntimeError::Io(_))
        ));
    }
}
