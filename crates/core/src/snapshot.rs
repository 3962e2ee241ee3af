//! Minimal field-name → prior-value maps captured before a mutation.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Prior values of the fields a mutation is about to change.
///
/// A field that is present with `null` means "was unset"; an absent field
/// means "not touched by the mutation". References to other owned records
/// are always stored as raw ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the prior value of `field`.
    pub fn record(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    /// Builder form of [`record`](Self::record).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.record(field, value);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Decode a captured field.
    ///
    /// Returns `Ok(None)` when the field was not captured. Use an `Option<T>`
    /// target to distinguish a captured `null` from an absent field.
    pub fn field<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, CoreError> {
        match self.0.get(field) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| {
                    CoreError::Validation(format!("Snapshot field '{field}' is malformed: {e}"))
                }),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
