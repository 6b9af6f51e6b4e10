//! Configuration and provider wiring for the lock screen.
//!
//! [`LockConfig`] loads from environment variables with defaults.
//! [`LockEnvironment`] carries the providers the pipelines call; building
//! one without a validator is a startup error, never a silent default.

use crate::pin::{DEFAULT_PIN_LENGTH, PinValidation, SecretPinValidator};
use automata_runtime::EngineError;
use automata_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the PIN length
pub const PIN_LENGTH_VAR: &str = "LOCK_PIN_LENGTH";

/// Environment variable holding the secret, as a string of digits
pub const SECRET_VAR: &str = "LOCK_SECRET";

/// Environment variable holding the validator retry count
pub const VALIDATION_RETRIES_VAR: &str = "LOCK_VALIDATION_RETRIES";

/// Errors raised while assembling the lock screen
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required effect provider was never supplied
    #[error("Missing provider: {0}")]
    MissingProvider(&'static str),

    /// A configuration value could not be used
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// The engine refused to start
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Lock screen settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Digits in a PIN
    pub pin_length: usize,
    /// The PIN the in-memory validator accepts
    pub secret: Vec<u8>,
    /// Retries for transient validator failures
    pub validation_retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            pin_length: DEFAULT_PIN_LENGTH,
            secret: vec![1, 2, 3, 4],
            validation_retries: 2,
        }
    }
}

impl LockConfig {
    /// Load from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparsable or inconsistent values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load from any variable lookup; unset variables keep their defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparsable or inconsistent values.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let pin_length = match lookup(PIN_LENGTH_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: PIN_LENGTH_VAR,
                value,
            })?,
            None => defaults.pin_length,
        };

        let secret = match lookup(SECRET_VAR) {
            Some(value) => parse_digits(&value).ok_or(ConfigError::Invalid {
                name: SECRET_VAR,
                value,
            })?,
            None => defaults.secret,
        };

        let validation_retries = match lookup(VALIDATION_RETRIES_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: VALIDATION_RETRIES_VAR,
                value,
            })?,
            None => defaults.validation_retries,
        };

        let config = Self {
            pin_length,
            secret,
            validation_retries,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are consistent
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the PIN length is zero or the
    /// secret does not have exactly `pin_length` digits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pin_length == 0 {
            return Err(ConfigError::Invalid {
                name: PIN_LENGTH_VAR,
                value: "0".to_string(),
            });
        }
        if self.secret.len() != self.pin_length || self.secret.iter().any(|digit| *digit > 9) {
            return Err(ConfigError::Invalid {
                name: SECRET_VAR,
                value: format!("{:?}", self.secret),
            });
        }
        Ok(())
    }

    /// Retry schedule for the validator
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.validation_retries)
            .with_initial_delay(Duration::from_millis(50))
    }
}

fn parse_digits(value: &str) -> Option<Vec<u8>> {
    value
        .chars()
        .map(|c| c.to_digit(10).and_then(|d| u8::try_from(d).ok()))
        .collect()
}

/// Providers and settings the lock screen's pipelines use
#[derive(Clone)]
pub struct LockEnvironment {
    /// Checks complete PINs
    pub validator: Arc<dyn PinValidation>,
    /// Digits in a PIN
    pub pin_length: usize,
    /// Retry schedule for the validator
    pub retry: RetryPolicy,
}

impl LockEnvironment {
    /// Start wiring an environment
    #[must_use]
    pub fn builder() -> LockEnvironmentBuilder {
        LockEnvironmentBuilder::default()
    }

    /// Environment backed by the in-memory validator holding `config.secret`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the config is inconsistent.
    pub fn from_config(config: &LockConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::builder()
            .validator(SecretPinValidator::new(config.secret.clone()))
            .pin_length(config.pin_length)
            .retry(config.retry_policy())
            .build()
    }
}

impl std::fmt::Debug for LockEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockEnvironment")
            .field("pin_length", &self.pin_length)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`LockEnvironment`]
#[derive(Default)]
pub struct LockEnvironmentBuilder {
    validator: Option<Arc<dyn PinValidation>>,
    pin_length: Option<usize>,
    retry: Option<RetryPolicy>,
}

impl LockEnvironmentBuilder {
    /// Supply the PIN validator
    #[must_use]
    pub fn validator(self, validator: impl PinValidation + 'static) -> Self {
        self.shared_validator(Arc::new(validator))
    }

    /// Supply a validator shared with other owners
    #[must_use]
    pub fn shared_validator(mut self, validator: Arc<dyn PinValidation>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Override the PIN length
    #[must_use]
    pub const fn pin_length(mut self, pin_length: usize) -> Self {
        self.pin_length = Some(pin_length);
        self
    }

    /// Override the validator retry schedule
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Finish wiring
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingProvider`] when no validator was supplied
    /// - [`ConfigError::Invalid`] for a zero PIN length
    pub fn build(self) -> Result<LockEnvironment, ConfigError> {
        let validator = self
            .validator
            .ok_or(ConfigError::MissingProvider("PinValidation"))?;
        let pin_length = self.pin_length.unwrap_or(DEFAULT_PIN_LENGTH);
        if pin_length == 0 {
            return Err(ConfigError::Invalid {
                name: "pin_length",
                value: "0".to_string(),
            });
        }

        Ok(LockEnvironment {
            validator,
            pin_length,
            retry: self.retry.unwrap_or_default(),
        })
    }
}
