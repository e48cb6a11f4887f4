//! Store configuration module.
//!
//! This module provides configuration loading for the reactive store from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `REACTIVE_CHANGE_CHANNEL_CAPACITY`: Number of change notifications buffered
//!   per listener before it lags (default: `1024`)
//!
//! # Invariants
//!
//! - `change_channel_capacity` is always greater than zero

/// Store configuration.
///
/// # Post-conditions
///
/// - `change_channel_capacity` is always at least 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Capacity of the broadcast channel that carries change notifications.
    /// A listener that falls further behind than this lags and is told that
    /// an unknown change happened.
    pub change_channel_capacity: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            change_channel_capacity: Self::DEFAULT_CHANGE_CHANNEL_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Default change channel capacity.
    pub const DEFAULT_CHANGE_CHANNEL_CAPACITY: usize = 1024;
    /// Environment variable holding the change channel capacity.
    pub const CHANGE_CHANNEL_CAPACITY_VAR: &'static str = "REACTIVE_CHANGE_CHANNEL_CAPACITY";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `REACTIVE_CHANGE_CHANNEL_CAPACITY` is set but is not
    /// a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// `from_env` uses the process environment; tests pass a closure.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let change_channel_capacity =
            Self::load_change_channel_capacity(lookup(Self::CHANGE_CHANNEL_CAPACITY_VAR))?;
        Ok(Self {
            change_channel_capacity,
        })
    }

    /// Parse the change channel capacity, falling back to the default.
    fn load_change_channel_capacity(value: Option<String>) -> Result<usize, ConfigError> {
        let Some(value) = value else {
            return Ok(Self::DEFAULT_CHANGE_CHANNEL_CAPACITY);
        };
        match value.trim().parse::<usize>() {
            Ok(0) => Err(ConfigError::InvalidValue {
                name: Self::CHANGE_CHANNEL_CAPACITY_VAR.to_string(),
                message: "must be greater than zero".to_string(),
            }),
            Ok(capacity) => Ok(capacity),
            Err(_) => Err(ConfigError::InvalidValue {
                name: Self::CHANGE_CHANNEL_CAPACITY_VAR.to_string(),
                message: format!("'{value}' is not a valid capacity"),
            }),
        }
    }
}
