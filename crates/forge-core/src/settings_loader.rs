//! Settings loading from configuration files.
//!
//! Builds [`ViewSettings`] from TOML or JSON and applies environment variable
//! overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FORGE_VIEW_ROOT` | `view_root` |
//! | `FORGE_VIEW_EXTENSION` | `extension` |
//! | `FORGE_MAX_INCLUDE_DEPTH` | `max_include_depth` |
//! | `FORGE_DEBUG_MODE` | `debug_mode` (`halt` or `inline`) |
//! | `FORGE_CACHE_COMPILED` | `cache_compiled` |
//! | `FORGE_LOG_LEVEL` | `log_level` |
//! | `FORGE_DEBUG` | `debug` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use forge_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/views.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::ForgeError;
use crate::settings::{DebugMode, ViewSettings};

/// Loads settings from a TOML string. Missing keys keep their defaults.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<ViewSettings, ForgeError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| ForgeError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<ViewSettings, ForgeError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ForgeError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the TOML is malformed, or an
/// environment override has an invalid value.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<ViewSettings, ForgeError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from a JSON string. Missing keys keep their defaults.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<ViewSettings, ForgeError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ForgeError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from just environment variables (starting from defaults).
///
/// # Errors
///
/// Returns an error if an environment override has an invalid value.
pub fn from_env() -> Result<ViewSettings, ForgeError> {
    let mut settings = ViewSettings::default();
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Applies environment variable overrides to a settings struct.
///
/// # Errors
///
/// Returns `ConfigurationError` when `FORGE_MAX_INCLUDE_DEPTH` is not a
/// number or `FORGE_DEBUG_MODE` is not `halt`/`inline`.
pub fn apply_env_overrides(settings: &mut ViewSettings) -> Result<(), ForgeError> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

fn apply_overrides(
    settings: &mut ViewSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ForgeError> {
    if let Some(val) = lookup("FORGE_VIEW_ROOT") {
        settings.view_root = PathBuf::from(val);
    }

    if let Some(val) = lookup("FORGE_VIEW_EXTENSION") {
        settings.extension = val.trim_start_matches('.').to_string();
    }

    if let Some(val) = lookup("FORGE_MAX_INCLUDE_DEPTH") {
        settings.max_include_depth = val.trim().parse().map_err(|_| {
            ForgeError::ConfigurationError(format!(
                "FORGE_MAX_INCLUDE_DEPTH must be a positive integer, got '{val}'"
            ))
        })?;
    }

    if let Some(val) = lookup("FORGE_DEBUG_MODE") {
        settings.debug_mode = DebugMode::parse(&val).ok_or_else(|| {
            ForgeError::ConfigurationError(format!(
                "FORGE_DEBUG_MODE must be 'halt' or 'inline', got '{val}'"
            ))
        })?;
    }

    if let Some(val) = lookup("FORGE_CACHE_COMPILED") {
        settings.cache_compiled = parse_flag(&val);
    }

    if let Some(val) = lookup("FORGE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("FORGE_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    Ok(())
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

// ============================================================
// Helpers
// ============================================================

fn merge_over_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<ViewSettings, ForgeError> {
    let default_json = serde_json::to_value(ViewSettings::default()).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
