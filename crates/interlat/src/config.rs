// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration for TOML/JSON config files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cancel timeout for interactions started without one (1 minute)
pub const DEFAULT_CANCEL_TIMEOUT_MS: u64 = 60_000;

fn default_cancel_timeout_ms() -> u64 {
    DEFAULT_CANCEL_TIMEOUT_MS
}

fn default_trace_interactions() -> bool {
    true
}

/// Errors that can occur when loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Interaction client configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionConfig {
    /// Name for logging/debugging
    #[serde(default)]
    pub name: String,

    /// Timeout applied when a rule starts an interaction without one
    #[serde(default = "default_cancel_timeout_ms")]
    pub default_cancel_timeout_ms: u64,

    /// Upper bound on concurrently running interactions per rule.
    /// Unset means unbounded.
    #[serde(default)]
    pub max_running_per_rule: Option<usize>,

    /// Open a trace span for each interaction by default
    #[serde(default = "default_trace_interactions")]
    pub trace_interactions: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            default_cancel_timeout_ms: DEFAULT_CANCEL_TIMEOUT_MS,
            max_running_per_rule: None,
            trace_interactions: true,
        }
    }
}

impl InteractionConfig {
    /// Load from a TOML or JSON file, chosen by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but make no sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_cancel_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "default_cancel_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_running_per_rule == Some(0) {
            return Err(ConfigError::Validation(
                "max_running_per_rule must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Default cancel timeout as a duration
    pub fn default_cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.default_cancel_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
