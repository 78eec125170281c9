//! Preprocessor definitions
//!
//! An ordered set of macro definitions injected ahead of the shader source.
//! Target-specific implicit definitions are appended after user ones.

use crate::error::ConfigError;
use crate::target::{TargetApi, TargetEnvironment};

/// Ordered `name -> value` macro definitions.
///
/// Redefining a name replaces its value but keeps the position where it was
/// first defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSet {
    entries: Vec<(String, String)>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, value)` pairs, validating every name.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Result<Self, ConfigError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.define(name.as_ref(), value.as_ref())?;
        }
        Ok(set)
    }

    /// Add or replace a definition.
    pub fn define(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidDefinitionName(name.to_string()));
        }

        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// User definitions followed by the target's implicit one.
    ///
    /// OpenGL targets get `GL_SPIRV`, Vulkan targets get `VULKAN`. The
    /// implicit definition is skipped when the user already defined the name.
    pub fn with_target(&self, target: &TargetEnvironment) -> DefinitionSet {
        let (name, value) = match target.api {
            TargetApi::OpenGl => ("GL_SPIRV", "100"),
            TargetApi::Vulkan => ("VULKAN", "100"),
        };

        let mut out = self.clone();
        if !out.contains(name) {
            out.entries.push((name.to_string(), value.to_string()));
        }
        out
    }
}
