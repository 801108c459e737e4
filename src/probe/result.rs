//! Probe result value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outcome of one successful probe run.
///
/// `data` is kept in a `BTreeMap` so every encoder sees keys in the same
/// order regardless of how the probe inserted them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ProbeResult {
    /// Create an empty result for the named probe.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            data: BTreeMap::new(),
        }
    }

    /// Set the free-text summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Insert one key/value pair, overwriting an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.data.insert(key.into(), value.to_string());
    }

    /// Builder form of [`ProbeResult::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }
}
