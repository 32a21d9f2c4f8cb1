//! Uniform result envelope returned by every public operation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Envelope carrying the outcome of one diagnostic operation.
///
/// Invariant: when `success` is false, callers must ignore `data` and read
/// `error` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    /// Create a successful envelope around a data payload
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a failed envelope with a descriptive error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
