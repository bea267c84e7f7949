//! Config types for filter construction.
//!
//! [`FilterConfig`] is the serde-deserializable form of a filter, loaded from
//! JSON or YAML and built into a boxed [`StorageFilter`]:
//!
//! ```yaml
//! type: read_optimized
//! label_key: __storage_name__   # optional
//! cache_capacity: 1024          # optional, omit to parse every call
//! ```
//!
//! | Config | Runtime filter |
//! |--------|----------------|
//! | `allow_all` | [`AllowAll`] |
//! | `allow_none` | [`AllowNone`] |
//! | `local_only` | [`LocalOnly`] |
//! | `read_optimized` | [`ReadOptimizedFilter`] |

use crate::{AllowAll, AllowNone, LocalOnly, ReadOptimizedFilter, StorageFilter};
use serde::{Deserialize, Serialize};

/// Errors from loading or validating a [`FilterConfig`].
///
/// Caught at config load time, never at evaluation time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("label_key must not be empty")]
    EmptyLabelKey,
    #[error("cache_capacity must be greater than zero (omit it to disable caching)")]
    ZeroCacheCapacity,
}

/// Configuration for a [`StorageFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Include every backend.
    AllowAll,
    /// Include no backend.
    AllowNone,
    /// Include local backends only.
    LocalOnly,
    /// Prune remote backends by routing hints.
    ReadOptimized {
        /// Routing label; defaults to [`STORAGE_NAME_LABEL`](crate::STORAGE_NAME_LABEL).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label_key: Option<String>,
        /// Parsed-pattern cache size; `None` disables caching.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_capacity: Option<usize>,
    },
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::ReadOptimized {
            label_key: None,
            cache_capacity: None,
        }
    }
}

impl FilterConfig {
    /// Parse a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a config from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed input.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyLabelKey`] or [`ConfigError::ZeroCacheCapacity`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::ReadOptimized {
            label_key,
            cache_capacity,
        } = self
        {
            if label_key.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::EmptyLabelKey);
            }
            if *cache_capacity == Some(0) {
                return Err(ConfigError::ZeroCacheCapacity);
            }
        }
        Ok(())
    }

    /// Validate and build the runtime filter.
    ///
    /// # Errors
    ///
    /// Returns the first [`validate()`](Self::validate) failure.
    pub fn build(&self) -> Result<Box<dyn StorageFilter>, ConfigError> {
        self.validate()?;
        let filter: Box<dyn StorageFilter> = match self {
            Self::AllowAll => Box::new(AllowAll),
            Self::AllowNone => Box::new(AllowNone),
            Self::LocalOnly => Box::new(LocalOnly),
            Self::ReadOptimized {
                label_key,
                cache_capacity,
            } => {
                let mut filter = ReadOptimizedFilter::new();
                if let Some(key) = label_key {
                    filter = filter.with_label_key(key.as_str());
                }
                if let Some(capacity) = cache_capacity {
                    filter = filter.with_cache(*capacity);
                }
                Box::new(filter)
            }
        };
        tracing::debug!(?filter, "built storage filter");
        Ok(filter)
    }
}
