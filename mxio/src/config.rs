//! Context configuration
//!
//! ```
//! use mxio::{MxioConfig, UnknownHandlePolicy};
//!
//! let config = MxioConfig::from_json(r#"{ "max_fds": 64, "unknown_handles": "retain" }"#).unwrap();
//! assert_eq!(config.max_fds, 64);
//! assert!(config.stdio_fallback);
//! assert_eq!(config.unknown_handles, UnknownHandlePolicy::Retain);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default fd table capacity
pub const DEFAULT_MAX_FDS: usize = 256;

/// Number of standard stream slots (stdin, stdout, stderr)
pub const STDIO_FDS: usize = 3;

/// Largest table an info word can address; the fd argument is 16 bits
pub const MAX_FDS_LIMIT: usize = u16::MAX as usize + 1;

/// What bootstrap does with bundle entries whose type it does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownHandlePolicy {
    /// Leave them in the bundle, neither bound nor closed
    #[default]
    Ignore,
    /// Move them into the context for the application to claim
    Retain,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_fds must be at least {min}, got {got}")]
    TooFewFds { min: usize, got: usize },

    #[error("max_fds must be at most {max}, got {got}")]
    TooManyFds { max: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MxioConfig {
    /// Capacity of the fd table
    pub max_fds: usize,
    /// Fill empty slots 0-2 with null objects after bootstrap
    pub stdio_fallback: bool,
    pub unknown_handles: UnknownHandlePolicy,
}

impl Default for MxioConfig {
    fn default() -> Self {
        Self {
            max_fds: DEFAULT_MAX_FDS,
            stdio_fallback: true,
            unknown_handles: UnknownHandlePolicy::Ignore,
        }
    }
}

impl MxioConfig {
    /// Parses and validates a JSON configuration
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MxioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let min = if self.stdio_fallback { STDIO_FDS } else { 1 };
        if self.max_fds < min {
            return Err(ConfigError::TooFewFds {
                min,
                got: self.max_fds,
            });
        }
        if self.max_fds > MAX_FDS_LIMIT {
            return Err(ConfigError::TooManyFds {
                max: MAX_FDS_LIMIT,
                got: self.max_fds,
            });
        }
        Ok(())
    }

    /// Worst-case bundle size when packing every fd plus the root
    pub fn subprocess_capacity(&self) -> usize {
        (1 + self.max_fds) * core_types::MXIO_MAX_HANDLES
    }
}
