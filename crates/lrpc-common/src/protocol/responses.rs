//! Reply header types
//!
//! The reply header mirrors the [`InvocationHeader`](super::InvocationHeader)
//! of the call it answers. When `error` is present no reply value follows it
//! on the wire, so a reader always knows whether a third value is coming from
//! the header it has already decoded.

use serde::{Deserialize, Serialize};

use super::error::{LrpcError, PlatformErrorKind};
use super::requests::{InvocationHeader, Sequence, ServiceMethod};

/// Which side of the dispatcher produced a failed reply.
///
/// Carried next to the error string so the client can rebuild the right
/// [`LrpcError`] variant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The method returned an error.
    #[default]
    Method,
    /// The dispatcher failed (decode failure, unknown method).
    Server,
    /// The method panicked and the dispatcher recovered.
    Panic,
}

/// Reply header written by the dispatcher.
///
/// # Example
///
/// ```
/// use lrpc_common::protocol::{InvocationHeader, ReplyHeader};
///
/// let request = InvocationHeader::new("Arith.Divide", 7);
/// let reply = ReplyHeader::success(&request);
/// assert_eq!(reply.seq, 7);
/// assert!(!reply.is_error());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyHeader {
    pub service_method: ServiceMethod,
    pub seq: Sequence,
    pub error: Option<String>,
    pub origin: FailureOrigin,
}

impl ReplyHeader {
    pub fn success(request: &InvocationHeader) -> Self {
        ReplyHeader {
            service_method: request.service_method.clone(),
            seq: request.seq,
            error: None,
            origin: FailureOrigin::Method,
        }
    }

    /// Header for a failed call.
    ///
    /// An empty message still marks the reply as failed: presence of
    /// `error`, not its length, decides whether a reply value follows.
    pub fn failure(
        request: &InvocationHeader,
        error: impl Into<String>,
        origin: FailureOrigin,
    ) -> Self {
        ReplyHeader {
            service_method: request.service_method.clone(),
            seq: request.seq,
            error: Some(error.into()),
            origin,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts a failed header into the classified error a caller sees.
    ///
    /// Returns `None` for a successful header.
    pub fn to_error(&self, request_id: &str) -> Option<LrpcError> {
        let message = self.error.as_ref()?;
        Some(match self.origin {
            FailureOrigin::Method => LrpcError::method(message.clone(), request_id),
            FailureOrigin::Server => LrpcError::server(message.clone(), request_id),
            FailureOrigin::Panic => LrpcError::platform(message.clone(), PlatformErrorKind::Panic),
        })
    }
}
