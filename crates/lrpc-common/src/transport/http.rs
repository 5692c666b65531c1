//! HTTP Hosting Boundary
//!
//! Shared pieces of the local hosting endpoint: the paths it serves, the
//! headers that carry the platform's side channel, and helpers for building
//! its responses.
//!
//! # Wire Format
//!
//! - `POST /invoke`: body is the raw invocation payload; the response body is
//!   the raw output payload. A platform-level failure is flagged with the
//!   [`FUNCTION_ERROR_HEADER`] header and a JSON [`PlatformFault`] body.
//! - `GET /ping`: keep-alive acknowledgement that never reaches user methods.
//!   Doubles as the existence check for the function named in
//!   [`FUNCTION_NAME_HEADER`].
//!
//! # Example
//!
//! ```
//! use lrpc_common::transport::http::{HttpEnvelope, FUNCTION_ERROR_HEADER};
//! use lrpc_common::protocol::{PlatformFault, PlatformErrorKind};
//!
//! let fault = PlatformFault::new("boom", PlatformErrorKind::Error);
//! let response = HttpEnvelope::fault_response(&fault);
//! assert_eq!(response.headers()[FUNCTION_ERROR_HEADER], "Unhandled");
//! ```

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};

use crate::protocol::PlatformFault;

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

pub const INVOKE_PATH: &str = "/invoke";
pub const PING_PATH: &str = "/ping";

/// Set on a response when the platform, not the payload, reports the outcome.
pub const FUNCTION_ERROR_HEADER: &str = "x-function-error";
/// Base64 tail of the execution log, when the caller asked for it.
pub const LOG_RESULT_HEADER: &str = "x-log-result";
/// Asks the endpoint to return the execution log tail.
pub const LOG_TYPE_HEADER: &str = "x-log-type";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const FUNCTION_NAME_HEADER: &str = "x-function-name";
pub const FUNCTION_QUALIFIER_HEADER: &str = "x-function-qualifier";
/// Invocation deadline as milliseconds since the Unix epoch.
pub const DEADLINE_HEADER: &str = "x-deadline-ms";

/// Value of [`FUNCTION_ERROR_HEADER`] for faults raised by the function.
pub const UNHANDLED: &str = "Unhandled";

/// Body of the keep-alive acknowledgement.
pub const PING_ACK: &[u8] = b"{}";

/// Response builders for the hosting endpoint
pub struct HttpEnvelope;

impl HttpEnvelope {
    /// 200 response carrying an output payload, possibly empty.
    pub fn payload_response(payload: Vec<u8>) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::from(payload)));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// 200 response flagged as a platform fault.
    pub fn fault_response(fault: &PlatformFault) -> HyperResponse {
        let mut response = Self::payload_response(fault.to_json());
        response
            .headers_mut()
            .insert(FUNCTION_ERROR_HEADER, HeaderValue::from_static(UNHANDLED));
        response
    }

    /// Keep-alive acknowledgement.
    pub fn ping_response() -> HyperResponse {
        Self::payload_response(PING_ACK.to_vec())
    }

    pub fn status_response(status: StatusCode) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlatformErrorKind;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_payload_response() {
        let response = HttpEnvelope::payload_response(b"\"abc\"".to_vec());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers().get(FUNCTION_ERROR_HEADER).is_none());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"\"abc\"");
    }

    #[tokio::test]
    async fn test_fault_response_body() {
        let fault = PlatformFault::new("runtime exited", PlatformErrorKind::Error);
        let response = HttpEnvelope::fault_response(&fault);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[FUNCTION_ERROR_HEADER], UNHANDLED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let decoded: PlatformFault = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded, fault);
    }

    #[test]
    fn test_status_response() {
        let response = HttpEnvelope::status_response(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
