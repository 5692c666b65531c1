//! Invocation context and platform fault types
//!
//! The hosting platform hands the dispatcher one [`InvocationContext`] per
//! invocation. When the dispatcher cannot produce a reply at all it answers
//! with a [`PlatformFault`], which travels on the platform's out-of-band
//! error channel rather than inside the payload.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::error::{LrpcError, PlatformErrorKind};

/// Per-invocation data supplied by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Platform request id of this invocation.
    pub request_id: String,
    /// Raw request payload exactly as received.
    pub payload: Vec<u8>,
    /// Name of the invoked function, when the platform reports it.
    pub function_name: Option<String>,
    /// Qualifier (version or alias) the invocation targeted.
    pub qualifier: Option<String>,
    /// Point in time after which the platform abandons the invocation.
    pub deadline: Option<SystemTime>,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InvocationContext {
            request_id: request_id.into(),
            payload: payload.into(),
            function_name: None,
            qualifier: None,
            deadline: None,
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, qualifier: Option<String>) -> Self {
        self.function_name = Some(name.into());
        self.qualifier = qualifier;
        self
    }

    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Side-channel payload describing a platform-level failure.
///
/// Serialized as `{"errorMessage": ..., "errorType": ...}`; the shorter
/// `message`/`kind` keys are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFault {
    #[serde(rename = "errorMessage", alias = "message", default)]
    pub error_message: String,
    #[serde(rename = "errorType", alias = "kind", default)]
    pub error_type: String,
}

impl PlatformFault {
    pub fn new(message: impl Into<String>, kind: PlatformErrorKind) -> Self {
        PlatformFault {
            error_message: message.into(),
            error_type: kind.as_str().to_string(),
        }
    }

    pub fn kind(&self) -> PlatformErrorKind {
        PlatformErrorKind::from_wire(&self.error_type)
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Two string fields cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Builds the classified error for a side-channel payload.
    ///
    /// A payload that is not a fault object is kept verbatim as the message.
    pub fn classify(payload: &[u8]) -> LrpcError {
        match serde_json::from_slice::<PlatformFault>(payload) {
            Ok(fault) => fault.into(),
            Err(e) => {
                tracing::debug!("Side-channel payload is not a fault object: {}", e);
                LrpcError::platform(
                    String::from_utf8_lossy(payload).into_owned(),
                    PlatformErrorKind::Error,
                )
            }
        }
    }
}

impl From<PlatformFault> for LrpcError {
    fn from(fault: PlatformFault) -> Self {
        let kind = fault.kind();
        LrpcError::platform(fault.error_message, kind)
    }
}
