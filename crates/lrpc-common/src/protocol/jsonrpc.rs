//! JSON-RPC Style Text Envelope
//!
//! Human-readable alternative to the binary envelope, served by the same
//! dispatcher. A payload whose first non-whitespace byte is `{` is handled
//! with this format.
//!
//! # Wire Format
//!
//! - Request: `{"method": "...", "params": <raw JSON>, "id": <raw JSON>}`
//! - Response: `{"result": <any>, "error": "...", "id": <echoed id>}`
//!
//! `params` and `id` are kept as raw JSON: `params` goes straight to the
//! method's argument decoder and `id` is echoed byte for byte. A request
//! without an `id` member is a notification; the method still runs but no
//! response is produced. An explicit `"id": null` is not a notification.
//!
//! # Example
//!
//! ```
//! use lrpc_common::protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
//! use serde_json::value::to_raw_value;
//!
//! let req = JsonRpcRequest::parse(br#"{"method":"Arith.Divide","params":{"A":5,"B":2},"id":"1"}"#).unwrap();
//! assert_eq!(req.method, "Arith.Divide");
//! assert!(!req.is_notification());
//!
//! let result = to_raw_value(&serde_json::json!({"Quo": 2, "Rem": 1})).unwrap();
//! let res = JsonRpcResponse::success(req.id.clone().unwrap(), result);
//! assert_eq!(res.to_vec().unwrap(), br#"{"result":{"Quo":2,"Rem":1},"id":"1"}"#);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use super::error::Result;

/// Text-protocol request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Registered method key (`"Type.Method"`)
    pub method: String,
    /// Method argument, handed to the argument decoder untouched
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<Box<RawValue>>,
    /// Request identifier; absent for notifications
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Box<RawValue>>,
}

/// Text-protocol response
///
/// Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Reply value on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Echo of the request id
    pub id: Box<RawValue>,
}

// A member that is present (even as `null`) is `Some`; only a missing member
// falls back to the `#[serde(default)]` of `None`.
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// Parses a text-protocol request from a raw payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// True when the request carries no `id` and must not be answered.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Raw JSON text of the params, `null` when they were omitted.
    pub fn params_json(&self) -> &str {
        self.params.as_deref().map_or("null", RawValue::get)
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Box<RawValue>, result: Box<RawValue>) -> Self {
        Self {
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: Box<RawValue>, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
            id,
        }
    }

    /// Id used when a request could not be parsed far enough to read its own.
    pub fn null_id() -> Box<RawValue> {
        RawValue::NULL.to_owned()
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
