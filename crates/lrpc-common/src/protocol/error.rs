//! Classified errors
//!
//! Every failed call surfaces exactly one [`LrpcError`] variant so a caller can
//! tell apart a local/transport failure, a failure returned by the remote
//! method, a fault reported by the platform and a defect in the dispatcher.
//!
//! # Example
//!
//! ```
//! use lrpc_common::protocol::error::{LrpcError, UNKNOWN_REQUEST_ID};
//!
//! let err = LrpcError::method("divide by zero", "req-1");
//! assert!(err.is_method_error());
//! assert_eq!(err.request_id(), "req-1");
//!
//! let err = LrpcError::Transport("connection reset".into());
//! assert_eq!(err.request_id(), UNKNOWN_REQUEST_ID);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Request id reported for errors that do not carry one.
pub const UNKNOWN_REQUEST_ID: &str = "*unknown*";

/// Kind of a platform-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformErrorKind {
    /// Any platform-classified fault other than a recovered panic.
    Error,
    /// A handler panic that was recovered and converted.
    Panic,
}

impl PlatformErrorKind {
    /// Wire spelling of the kind (`"error"` or `"panic"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformErrorKind::Error => "error",
            PlatformErrorKind::Panic => "panic",
        }
    }

    /// Parses the wire spelling. Anything that is not `"panic"` is an error.
    pub fn from_wire(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("panic") {
            PlatformErrorKind::Panic
        } else {
            PlatformErrorKind::Error
        }
    }
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LrpcError {
    /// Local encode/decode failure, or the platform call itself failed.
    #[error("{0}")]
    Transport(String),

    /// The remote method returned an error.
    #[error("{message}")]
    Method { message: String, request_id: String },

    /// The platform reported a failure instead of a normal reply.
    #[error("{message}")]
    Platform {
        message: String,
        kind: PlatformErrorKind,
    },

    /// The dispatcher's own logic failed (decode failure, unknown method).
    #[error("{message}")]
    Server { message: String, request_id: String },
}

impl LrpcError {
    pub fn method(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        LrpcError::Method {
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    pub fn server(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        LrpcError::Server {
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    pub fn platform(message: impl Into<String>, kind: PlatformErrorKind) -> Self {
        LrpcError::Platform {
            message: message.into(),
            kind,
        }
    }

    /// The error message without any classification prefix.
    pub fn message(&self) -> &str {
        match self {
            LrpcError::Transport(message)
            | LrpcError::Method { message, .. }
            | LrpcError::Platform { message, .. }
            | LrpcError::Server { message, .. } => message,
        }
    }

    /// True if the remote method returned this error.
    pub fn is_method_error(&self) -> bool {
        matches!(self, LrpcError::Method { .. })
    }

    /// True if the platform reported a recovered handler panic.
    pub fn is_platform_panic(&self) -> bool {
        matches!(
            self,
            LrpcError::Platform {
                kind: PlatformErrorKind::Panic,
                ..
            }
        )
    }

    /// True if the platform reported a fault that is not a panic.
    pub fn is_platform_error(&self) -> bool {
        matches!(
            self,
            LrpcError::Platform {
                kind: PlatformErrorKind::Error,
                ..
            }
        )
    }

    /// True if the failure happened locally or in the plumbing.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, LrpcError::Transport(_))
    }

    /// True if the remote dispatcher failed before or around the method.
    pub fn is_server_error(&self) -> bool {
        matches!(self, LrpcError::Server { .. })
    }

    /// The platform request id carried by the error, or [`UNKNOWN_REQUEST_ID`].
    pub fn request_id(&self) -> &str {
        match self {
            LrpcError::Method { request_id, .. } | LrpcError::Server { request_id, .. }
                if !request_id.is_empty() =>
            {
                request_id.as_str()
            }
            _ => UNKNOWN_REQUEST_ID,
        }
    }
}

/// Returns the request id associated with `err`, or `*unknown*`.
pub fn request_id(err: &LrpcError) -> &str {
    err.request_id()
}

impl From<postcard::Error> for LrpcError {
    fn from(err: postcard::Error) -> Self {
        LrpcError::Transport(format!("binary encoding error: {}", err))
    }
}

impl From<serde_json::Error> for LrpcError {
    fn from(err: serde_json::Error) -> Self {
        LrpcError::Transport(format!("JSON encoding error: {}", err))
    }
}

impl From<base64::DecodeError> for LrpcError {
    fn from(err: base64::DecodeError) -> Self {
        LrpcError::Transport(format!("base64 decoding error: {}", err))
    }
}

impl From<hyper::Error> for LrpcError {
    fn from(err: hyper::Error) -> Self {
        LrpcError::Transport(format!("HTTP error: {}", err))
    }
}

impl From<std::io::Error> for LrpcError {
    fn from(err: std::io::Error) -> Self {
        LrpcError::Transport(format!("IO error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, LrpcError>;
