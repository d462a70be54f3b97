//! Raw node configuration as handed over by the graph engine.
//!
//! Graph editors store node parameters as loosely typed key/value maps. Numbers
//! may come back as integers, integral floats or numeric strings depending on
//! which widget produced them, so the typed getters here are lenient about
//! representation but strict about meaning.

use crate::pipeline::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            ConfigValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

/// Keyed configuration map of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawConfig(BTreeMap<String, ConfigValue>);

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`; explicit nulls read as absent.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// First present value among `keys`.
    pub fn get_any<'a>(&'a self, keys: &[&'a str]) -> Option<(&'a str, &'a ConfigValue)> {
        keys.iter()
            .find_map(|key| self.get(key).map(|value| (*key, value)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Integer under any of `keys`. Absent → `Ok(None)`; present but not an
    /// integer → `InvalidConfig`.
    pub fn int(&self, keys: &[&str]) -> PipelineResult<Option<i64>> {
        match self.get_any(keys) {
            None => Ok(None),
            Some((key, value)) => value.as_int().map(Some).ok_or_else(|| {
                PipelineError::InvalidConfig {
                    key: key.to_string(),
                    message: format!("expected an integer, got {:?}", value),
                }
            }),
        }
    }

    /// Non-negative integer under any of `keys`.
    pub fn uint(&self, keys: &[&str]) -> PipelineResult<Option<u64>> {
        match self.int(keys)? {
            None => Ok(None),
            Some(v) if v >= 0 => Ok(Some(v as u64)),
            Some(v) => Err(PipelineError::InvalidConfig {
                key: keys[0].to_string(),
                message: format!("must not be negative, got {}", v),
            }),
        }
    }

    /// Non-empty string under any of `keys`. Absent or blank → `Ok(None)`.
    pub fn string(&self, keys: &[&str]) -> PipelineResult<Option<String>> {
        match self.get_any(keys) {
            None => Ok(None),
            Some((_, ConfigValue::String(s))) if s.trim().is_empty() => Ok(None),
            Some((_, ConfigValue::String(s))) => Ok(Some(s.trim().to_string())),
            Some((key, value)) => Err(PipelineError::InvalidConfig {
                key: key.to_string(),
                message: format!("expected a string, got {:?}", value),
            }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RawConfig
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = RawConfig::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}
