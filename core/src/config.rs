//! Serializable retry configuration.
//!
//! [`RetryConfig`] mirrors the usual client-side knobs in float seconds:
//!
//! ```json
//! { "max_tries": -1, "delay": 0.1, "backoff": 2.0, "max_jitter": 0.4,
//!   "max_delay": 60.0, "deadline": 30.0, "ignore_expire": true }
//! ```
//!
//! Conversion into a [`RetryPolicy`] never fails: negative or NaN durations
//! become zero, infinite ones saturate, a negative `max_tries` means
//! unlimited, and the policy builder clamps jitter and multiplier.

use crate::policy::PolicyRegistry;
use crate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Retry settings for one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts; any negative value means unlimited.
    pub max_tries: i64,
    /// Initial delay in seconds.
    pub delay: f64,
    /// Backoff multiplier.
    pub backoff: f64,
    /// Jitter fraction in `[0, 1]`.
    pub max_jitter: f64,
    /// Maximum delay in seconds.
    pub max_delay: f64,
    /// Deadline for the whole sequence in seconds.
    pub deadline: Option<f64>,
    /// Treat session expiry as retryable.
    pub ignore_expire: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            delay: 0.1,
            backoff: 2.0,
            max_jitter: 0.4,
            max_delay: 60.0,
            deadline: None,
            ignore_expire: true,
        }
    }
}

impl RetryConfig {
    /// Build the policy described by this configuration.
    pub fn to_policy(&self) -> RetryPolicy {
        let builder = RetryPolicy::builder()
            .initial_delay(seconds(self.delay))
            .multiplier(self.backoff)
            .max_jitter(self.max_jitter)
            .max_delay(seconds(self.max_delay))
            .session_expiry_retryable(self.ignore_expire);

        let builder = if self.max_tries < 0 {
            builder.unlimited_attempts()
        } else {
            builder.max_attempts(u32::try_from(self.max_tries).unwrap_or(u32::MAX))
        };

        match self.deadline {
            Some(deadline) => builder.deadline(seconds(deadline)),
            None => builder,
        }
        .build()
    }
}

/// A default policy plus named overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Settings used for names that are not listed.
    pub default: RetryConfig,
    /// Per-recipe settings.
    pub policies: BTreeMap<String, RetryConfig>,
}

impl RegistryConfig {
    /// The default policy.
    pub fn default_policy(&self) -> RetryPolicy {
        self.default.to_policy()
    }

    /// Build a registry holding every named policy.
    pub fn to_registry(&self) -> PolicyRegistry {
        let mut registry = PolicyRegistry::new();
        for (name, config) in &self.policies {
            registry.register(name.clone(), config.to_policy());
        }
        registry
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}
