use std::time::Duration;

use thiserror::Error;

use crate::validation::ValidationFlags;

/// Parameters governing new path validations
///
/// Default values should be suitable for most internet applications. Connections typically
/// derive the timeout from their current PTO instead, e.g. three times the larger of the PTO and
/// twice the initial RTT, and only use the default until an RTT sample is available.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub(crate) timeout: Duration,
    pub(crate) flags: ValidationFlags,
}

impl ValidationConfig {
    /// Time within which a validation must succeed, counted from its first challenge
    ///
    /// Must be nonzero.
    pub fn timeout(&mut self, value: Duration) -> Result<&mut Self, ConfigError> {
        if value.is_zero() {
            return Err(ConfigError::OutOfBounds);
        }
        self.timeout = value;
        Ok(self)
    }

    /// Get the current value of `timeout`
    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// How the connection treats validations started with this configuration
    pub fn flags(&mut self, value: ValidationFlags) -> &mut Self {
        self.flags = value;
        self
    }

    /// Get the current value of `flags`
    pub fn get_flags(&self) -> ValidationFlags {
        self.flags
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        // 3 * 2 * the RFC 9002 initial RTT of 333ms, rounded
        const TIMEOUT: Duration = Duration::from_secs(2);

        Self {
            timeout: TIMEOUT,
            flags: ValidationFlags::NONE,
        }
    }
}

/// Errors in the configuration of a path validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Value exceeds supported bounds
    #[error("value exceeds supported bounds")]
    OutOfBounds,
}
