//! Settings resolution across layers.
//!
//! Layers, lowest priority first:
//! 1. Compiled [`ChatSettings::default()`]
//! 2. The nearest `.chathistory` YAML file
//! 3. The profile named by `profile`, looked up in `profiles`
//! 4. Front matter of the document itself
//!
//! Each layer replaces top-level keys of the one below it. Null values are
//! skipped, so a layer cannot unset a key.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::ChatSettings;

/// File name searched for by [`find_config_file`].
pub const CONFIG_FILE_NAME: &str = ".chathistory";

/// Resolve settings for a document in `working_dir` with front matter `inline`.
pub fn load_settings(working_dir: &Path, inline: &Map<String, Value>) -> Result<ChatSettings> {
    let file = match find_config_file(working_dir) {
        Some(path) => read_config_file(&path)?,
        None => {
            debug!(?working_dir, "no settings file found, using defaults");
            Map::new()
        }
    };
    resolve_settings(&file, inline)
}

/// Nearest `.chathistory` file at or above `start`, not looking past `$HOME`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    find_config_file_until(start, CONFIG_FILE_NAME, home.as_deref())
}

/// Walk from `start` towards the root looking for `name`.
///
/// The walk ends after checking `stop` (when reached) or the filesystem root.
pub fn find_config_file_until(start: &Path, name: &str, stop: Option<&Path>) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(name);
        if candidate.is_file() {
            debug!(path = ?candidate, "found settings file");
            return Some(candidate);
        }
        if stop.is_some_and(|stop| stop == current) {
            return None;
        }
        dir = current.parent();
    }
    None
}

/// Read a YAML settings file into a key map. An empty file is an empty map.
pub fn read_config_file(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    parse_layer(&content)
}

pub fn parse_layer(content: &str) -> Result<Map<String, Value>> {
    match serde_yaml_ng::from_str::<Value>(content)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(SettingsError::InvalidValue(format!(
            "settings must be a key-value mapping, got {other}"
        ))),
    }
}

/// Merge defaults, `file`, the selected profile and `inline`.
pub fn resolve_settings(
    file: &Map<String, Value>,
    inline: &Map<String, Value>,
) -> Result<ChatSettings> {
    let profile = select_profile(file, inline)?;

    let mut merged = match serde_json::to_value(ChatSettings::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    overlay(&mut merged, file);
    if let Some(profile) = &profile {
        overlay(&mut merged, profile);
    }
    overlay(&mut merged, inline);

    Ok(serde_json::from_value(Value::Object(merged))?)
}

/// Replace top-level keys of `base` with those of `layer`, skipping nulls.
pub fn overlay(base: &mut Map<String, Value>, layer: &Map<String, Value>) {
    for (key, value) in layer {
        if value.is_null() {
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
}

/// The profile layer chosen by `profile` in `file` or `inline` (inline wins).
fn select_profile(
    file: &Map<String, Value>,
    inline: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>> {
    let mut selection = file.clone();
    overlay(&mut selection, inline);

    let name = match selection.get("profile") {
        Some(Value::String(name)) if !name.is_empty() => name,
        Some(Value::String(_)) | None => return Ok(None),
        Some(other) => {
            return Err(SettingsError::InvalidValue(format!(
                "profile must be a string, got {other}"
            )))
        }
    };

    let profile = selection
        .get("profiles")
        .and_then(|profiles| profiles.get(name))
        .ok_or_else(|| SettingsError::UnknownProfile(name.clone()))?;

    match profile {
        Value::Object(map) => {
            debug!(profile = %name, "applying settings profile");
            Ok(Some(map.clone()))
        }
        Value::Null => Ok(Some(Map::new())),
        other => Err(SettingsError::InvalidValue(format!(
            "profile `{name}` must be a key-value mapping, got {other}"
        ))),
    }
}
