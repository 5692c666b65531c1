//! lrpc Transport Layer
//!
//! This module holds the envelope codec and the boundary to the platform's
//! invocation primitive.
//!
//! # Architecture
//!
//! - **Codec**: [`BinaryCodec`] writes and reads the structural binary
//!   envelope; [`WireFormat`] decides which envelope an inbound payload uses
//! - **Transport**: [`Transport`] submits one payload to a named function and
//!   returns its output or the platform's failure indicator
//! - **HTTP**: paths, headers and response builders of the local hosting
//!   endpoint
//!
//! Implementations of [`Transport`] live next to what they talk to: the
//! in-process transport in `lrpc-server` and the HTTP transport in
//! `lrpc-client`.

pub mod codec;
pub mod http;

pub use codec::{BinaryCodec, WireFormat};
pub use http::{HttpEnvelope, HyperRequest, HyperResponse};

use async_trait::async_trait;

use crate::protocol::error::Result;

/// One submission to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub function_name: String,
    /// Version or alias to invoke; `None` targets the unqualified function.
    pub qualifier: Option<String>,
    pub payload: Vec<u8>,
    /// Ask the platform for the tail of the execution log.
    pub log_tail: bool,
}

impl InvokeRequest {
    pub fn new(function_name: impl Into<String>, payload: Vec<u8>) -> Self {
        InvokeRequest {
            function_name: function_name.into(),
            qualifier: None,
            payload,
            log_tail: false,
        }
    }

    pub fn with_qualifier(mut self, qualifier: Option<String>) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn with_log_tail(mut self, log_tail: bool) -> Self {
        self.log_tail = log_tail;
        self
    }
}

/// What the platform returned for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeOutput {
    pub payload: Vec<u8>,
    /// Set when the platform reports a failure; `payload` then holds a
    /// [`PlatformFault`](crate::protocol::PlatformFault) document.
    pub function_error: Option<String>,
    /// Base64 execution log tail, when requested and available.
    pub log_result: Option<String>,
}

impl InvokeOutput {
    pub fn payload(payload: Vec<u8>) -> Self {
        InvokeOutput {
            payload,
            ..Default::default()
        }
    }

    pub fn is_function_error(&self) -> bool {
        self.function_error.is_some()
    }
}

/// The platform's synchronous call-and-response primitive.
///
/// `invoke` returns `Err` only when the call itself failed (network, unknown
/// target). A failure the platform reports about the function arrives as
/// `Ok` with [`InvokeOutput::function_error`] set.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Verify that `function_name` (at `qualifier`) exists.
    async fn describe(&self, function_name: &str, qualifier: Option<&str>) -> Result<()>;

    /// Submit one payload and wait for the output.
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutput>;
}
