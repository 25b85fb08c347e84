//! Settings access.
//!
//! Everything downstream reads configuration through [`SettingsProvider`], a
//! single `get(key)` lookup. [`Settings`] is the JSON document on disk,
//! [`Overrides`] layers command-line values on top of any provider.
//!
//! ```json
//! {
//!     "host": "localhost",
//!     "port": 7002,
//!     "file_endings": { "linux": "so", "windows": "mll" },
//!     "plugins": {
//!         "MyPlugin": {
//!             "platform": "x64",
//!             "file": "scene_setup.py",
//!             "code": ["cmds.file(new=True, force=True);", "cmds.createNode('myNode')"]
//!         }
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::platform::Platform;

/// Key in `__main__` under which the persistent remote namespace lives.
pub const DEFAULT_NAMESPACE_KEY: &str = "_sublime_SendToMaya_plugin";

/// Read-only key/value settings store.
pub trait SettingsProvider {
    fn get(&self, key: &str) -> Option<Value>;
}

impl<T: SettingsProvider + ?Sized> SettingsProvider for &T {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }
}

/// Settings backed by a JSON object.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::InvalidSetting {
                key: "<root>".to_string(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Read and parse a settings file. Called once per invocation so edits
    /// take effect on the next command.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Self::from_value(value)
    }
}

impl SettingsProvider for Settings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// Values that shadow a base provider key by key.
#[derive(Debug, Clone)]
pub struct Overrides<P> {
    base: P,
    values: Map<String, Value>,
}

impl<P: SettingsProvider> Overrides<P> {
    pub fn new(base: P) -> Self {
        Self {
            base,
            values: Map::new(),
        }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` only when a value is present.
    pub fn set_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }
}

impl<P: SettingsProvider> SettingsProvider for Overrides<P> {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.base.get(key))
    }
}

/// Per-plugin entry under `plugins.<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PluginSettings {
    /// Build sub-directory on Windows, e.g. `x64`.
    #[serde(default)]
    pub platform: Option<String>,
    /// Python file appended after `code`. Relative to the plugin directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub code: Code,
}

/// Follow-up code: a single string or lines joined in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Single(String),
    Lines(Vec<String>),
}

impl Default for Code {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl Code {
    pub fn concat(&self) -> String {
        match self {
            Self::Single(code) => code.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

pub fn host(settings: &dyn SettingsProvider) -> Result<String, ConfigError> {
    match settings.get("host") {
        Some(Value::String(host)) if !host.trim().is_empty() => Ok(host.trim().to_string()),
        Some(other) => Err(invalid("host", format!("expected a hostname, got {other}"))),
        None => Err(ConfigError::MissingSetting("host".to_string())),
    }
}

/// Port as an integer or a numeric string.
pub fn port(settings: &dyn SettingsProvider) -> Result<u16, ConfigError> {
    let value = settings
        .get("port")
        .ok_or_else(|| ConfigError::MissingSetting("port".to_string()))?;
    let port = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.ok_or_else(|| invalid("port", format!("expected a port number, got {value}")))
}

pub fn file_ending(
    settings: &dyn SettingsProvider,
    platform: Platform,
) -> Result<String, ConfigError> {
    let key = format!("file_endings.{platform}");
    let endings = settings
        .get("file_endings")
        .ok_or_else(|| ConfigError::MissingSetting("file_endings".to_string()))?;
    match endings.get(platform.as_str()) {
        Some(Value::String(ext)) => Ok(ext.trim_start_matches('.').to_string()),
        Some(other) => Err(invalid(&key, format!("expected a string, got {other}"))),
        None => Err(ConfigError::MissingSetting(key)),
    }
}

pub fn plugin(settings: &dyn SettingsProvider, name: &str) -> Result<PluginSettings, ConfigError> {
    let plugins = settings
        .get("plugins")
        .ok_or_else(|| ConfigError::MissingSetting("plugins".to_string()))?;
    let Value::Object(mut plugins) = plugins else {
        return Err(invalid("plugins", "expected an object keyed by plugin name"));
    };
    let entry = plugins
        .remove(name)
        .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;
    serde_json::from_value(entry).map_err(|e| invalid(&format!("plugins.{name}"), e.to_string()))
}

pub fn namespace_key(settings: &dyn SettingsProvider) -> Result<String, ConfigError> {
    match settings.get("namespace_key") {
        None | Some(Value::Null) => Ok(DEFAULT_NAMESPACE_KEY.to_string()),
        Some(Value::String(key)) if !key.is_empty() => Ok(key),
        Some(other) => Err(invalid(
            "namespace_key",
            format!("expected a non-empty string, got {other}"),
        )),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
