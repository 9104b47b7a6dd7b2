//! Request and response envelopes carried inside frames.
//!
//! `params` and `data` are opaque to the bridge and stay schemaless
//! [`serde_json::Value`]s; only the envelope's fixed fields are typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request sent to the enclave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Caller-generated correlation token.
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl RequestEnvelope {
    /// Build a request with a fresh random id stamped with the current time.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), method, params)
    }

    pub fn with_id(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A response produced by the enclave.
///
/// `id` is expected to echo the request's id; whether that is checked is up
/// to the client's [`CorrelationCheck`](crate::client::CorrelationCheck).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Hex-encoded enclave signature over the response. Never verified here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            signature: None,
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            signature: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let req = RequestEnvelope {
            id: "req-1".into(),
            method: "sign".into(),
            params: json!({"msg": "aGk="}),
            timestamp: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "req-1",
                "method": "sign",
                "params": {"msg": "aGk="},
                "timestamp": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn new_requests_get_distinct_ids() {
        let a = RequestEnvelope::new("ping", Value::Null);
        let b = RequestEnvelope::new("ping", Value::Null);
        assert_ne!(a.id, b.id);
        assert!(a.timestamp > 0);
    }

    #[test]
    fn response_optional_fields_may_be_absent() {
        let resp: ResponseEnvelope =
            serde_json::from_str(r#"{"id":"x","success":false,"error":"boom"}"#).unwrap();
        assert_eq!(resp, ResponseEnvelope::failure("x", "boom"));

        let encoded = serde_json::to_string(&ResponseEnvelope::ok("y", json!(1))).unwrap();
        assert!(!encoded.contains("signature"));
    }
}
