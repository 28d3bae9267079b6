//! # Offline Queue Records
//!
//! Durable description of work that must reach the backend eventually.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request queued while offline.
///
/// Stored as part of the JSON array under the `offlineQueue` key:
///
/// ```text
/// [{"id":"…","timestamp":1767225600000,"retryCount":0,"type":"trade","data":{"id":"T1"}}]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRequest {
    pub id: String,
    /// Milliseconds since the Unix epoch when the request was queued.
    pub timestamp: i64,
    #[serde(default)]
    pub retry_count: u32,
    /// Selects the replay handler.
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub data: Value,
}

impl QueuedRequest {
    pub fn new(request_type: impl Into<String>, data: Value, timestamp: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            retry_count: 0,
            request_type: request_type.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_layout_is_camel_case() {
        let req = QueuedRequest::new("trade", json!({"id": "T1"}), 42);
        let raw = serde_json::to_value(&req).unwrap();
        assert_eq!(raw["type"], "trade");
        assert_eq!(raw["retryCount"], 0);
        assert_eq!(raw["timestamp"], 42);
        assert_eq!(raw["data"]["id"], "T1");
    }

    #[test]
    fn test_missing_retry_count_defaults_to_zero() {
        let req: QueuedRequest =
            serde_json::from_str(r#"{"id":"a","timestamp":1,"type":"trade"}"#).unwrap();
        assert_eq!(req.retry_count, 0);
        assert_eq!(req.data, Value::Null);
    }
}
