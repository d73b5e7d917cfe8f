// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use std::io::Write;
use yare::parameterized;

#[test]
fn test_defaults() {
    let config = InteractionConfig::default();
    assert_eq!(config.default_cancel_timeout(), Duration::from_secs(60));
    assert_eq!(config.max_running_per_rule, None);
    assert!(config.trace_interactions);
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = InteractionConfig::from_toml("").unwrap();
    assert_eq!(config, InteractionConfig::default());
}

#[test]
fn test_parse_toml() {
    let config = InteractionConfig::from_toml(
        r#"
name = "checkout-app"
default_cancel_timeout_ms = 5000
max_running_per_rule = 4
trace_interactions = false
"#,
    )
    .unwrap();
    assert_eq!(config.name, "checkout-app");
    assert_eq!(config.default_cancel_timeout(), Duration::from_secs(5));
    assert_eq!(config.max_running_per_rule, Some(4));
    assert!(!config.trace_interactions);
}

#[test]
fn test_unknown_field_rejected() {
    let err = InteractionConfig::from_toml("timeout = 5").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[parameterized(
    zero_timeout = { "default_cancel_timeout_ms = 0" },
    zero_capacity = { "max_running_per_rule = 0" },
)]
fn test_validation_errors(toml_str: &str) {
    let err = InteractionConfig::from_toml(toml_str).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got {err}");
}

#[test]
fn test_load_json_by_extension() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"name": "json", "max_running_per_rule": 2}}"#).unwrap();
    let config = InteractionConfig::load(file.path()).unwrap();
    assert_eq!(config.name, "json");
    assert_eq!(config.max_running_per_rule, Some(2));
    assert_eq!(config.default_cancel_timeout_ms, DEFAULT_CANCEL_TIMEOUT_MS);
}

#[test]
fn test_load_toml_by_default() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "name = \"toml\"").unwrap();
    assert_eq!(InteractionConfig::load(file.path()).unwrap().name, "toml");
}

#[test]
fn test_load_missing_file() {
    let err = InteractionConfig::load(Path::new("/nonexistent/interlat.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
