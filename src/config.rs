//! Converter configuration store
//!
//! A flat key/value mapping read once when a converter is created. It
//! supplies default format versions, the debug info level and the resource
//! limits handed to the backend.
//!
//! Documented keys and their defaults:
//!
//! | key                                   | type | default |
//! |---------------------------------------|------|---------|
//! | `input_version`                       | text | `""`    |
//! | `output_version`                      | text | `""`    |
//! | `debug_info_level`                    | text | `""`    |
//! | `warnings_as_errors`                  | bool | `false` |
//! | `max_draw_buffers`                    | int  | 32      |
//! | `max_vertex_attribs`                  | int  | 64      |
//! | `max_combined_texture_image_units`    | int  | 80      |
//! | `max_compute_work_group_invocations`  | int  | 1024    |
//! | `max_compute_work_group_size_x`       | int  | 1024    |
//! | `max_compute_work_group_size_y`       | int  | 1024    |
//! | `max_compute_work_group_size_z`       | int  | 64      |

use std::collections::BTreeMap;

use crate::error::ConfigError;

const KNOWN_KEYS: &[&str] = &[
    "input_version",
    "output_version",
    "debug_info_level",
    "warnings_as_errors",
    "max_draw_buffers",
    "max_vertex_attribs",
    "max_combined_texture_image_units",
    "max_compute_work_group_invocations",
    "max_compute_work_group_size_x",
    "max_compute_work_group_size_y",
    "max_compute_work_group_size_z",
];

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

/// Limits the backend validates shaders against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceLimits {
    pub max_draw_buffers: u32,
    pub max_vertex_attribs: u32,
    pub max_combined_texture_image_units: u32,
    pub max_compute_work_group_invocations: u32,
    pub max_compute_work_group_size: [u32; 3],
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_draw_buffers: 32,
            max_vertex_attribs: 64,
            max_combined_texture_image_units: 80,
            max_compute_work_group_invocations: 1024,
            max_compute_work_group_size: [1024, 1024, 64],
        }
    }
}

/// Key/value configuration store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    values: BTreeMap<String, ConfigValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON object whose values are all bools, integers or
    /// strings.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let root: serde_json::Value = serde_json::from_str(document)
            .map_err(|e| ConfigError::MalformedDocument(e.to_string()))?;
        let object = root
            .as_object()
            .ok_or_else(|| ConfigError::MalformedDocument("expected a JSON object".to_string()))?;

        let mut config = Self::new();
        for (key, value) in object {
            let value = match value {
                serde_json::Value::Bool(b) => ConfigValue::Bool(*b),
                serde_json::Value::Number(n) => ConfigValue::Int(n.as_i64().ok_or_else(|| {
                    ConfigError::MalformedDocument(format!("{} is not an integer", key))
                })?),
                serde_json::Value::String(s) => ConfigValue::Text(s.clone()),
                _ => {
                    return Err(ConfigError::MalformedDocument(format!(
                        "{} should be a bool, integer or string",
                        key
                    )))
                }
            };
            config.set(key, value);
        }

        log::debug!("Loaded configuration with {} key(s)", config.values.len());
        Ok(config)
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        if !KNOWN_KEYS.contains(&key) {
            log::warn!("Unknown configuration key {} has no effect", key);
        }
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> Result<&str, ConfigError> {
        match self.values.get(key) {
            None => Ok(""),
            Some(ConfigValue::Text(s)) => Ok(s.as_str()),
            Some(_) => Err(wrong_type(key, "a string")),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.values.get(key) {
            None => Ok(false),
            Some(ConfigValue::Bool(b)) => Ok(*b),
            Some(_) => Err(wrong_type(key, "a bool")),
        }
    }

    fn limit(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(ConfigValue::Int(i)) => {
                u32::try_from(*i).map_err(|_| wrong_type(key, "a non-negative integer"))
            }
            Some(_) => Err(wrong_type(key, "a non-negative integer")),
        }
    }

    /// Resource limits, with defaults for absent keys.
    pub fn limits(&self) -> Result<ResourceLimits, ConfigError> {
        let defaults = ResourceLimits::default();
        Ok(ResourceLimits {
            max_draw_buffers: self.limit("max_draw_buffers", defaults.max_draw_buffers)?,
            max_vertex_attribs: self.limit("max_vertex_attribs", defaults.max_vertex_attribs)?,
            max_combined_texture_image_units: self.limit(
                "max_combined_texture_image_units",
                defaults.max_combined_texture_image_units,
            )?,
            max_compute_work_group_invocations: self.limit(
                "max_compute_work_group_invocations",
                defaults.max_compute_work_group_invocations,
            )?,
            max_compute_work_group_size: [
                self.limit("max_compute_work_group_size_x", defaults.max_compute_work_group_size[0])?,
                self.limit("max_compute_work_group_size_y", defaults.max_compute_work_group_size[1])?,
                self.limit("max_compute_work_group_size_z", defaults.max_compute_work_group_size[2])?,
            ],
        })
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongValueType {
        key: key.to_string(),
        expected,
    }
}
