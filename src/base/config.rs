use std::collections::BTreeMap;

/// A single channel-argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Int(i64),
    Str(String),
}

/// Immutable-per-attempt snapshot of channel arguments.
///
/// A `ChannelConfig` is copied into the connector when an attempt starts
/// and threaded, by value, through the handshake pipeline. Handshakers may
/// return a modified copy (the "negotiated" configuration); the input
/// snapshot is never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    entries: BTreeMap<String, ConfigValue>,
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer argument, replacing any previous value for the key.
    pub fn set_int(mut self, key: &str, value: i64) -> Self {
        self.entries.insert(key.to_string(), ConfigValue::Int(value));
        self
    }

    /// Set a string argument, replacing any previous value for the key.
    pub fn set_str(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), ConfigValue::Str(value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(ConfigValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ConfigValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
