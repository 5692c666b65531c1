use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lrpc_common::protocol::error::{LrpcError, Result};
use lrpc_common::transport::{BinaryCodec, InvokeOutput, InvokeRequest, Transport};
use lrpc_common::{InvocationHeader, PlatformFault, ReplyHeader};

use crate::config::FunctionTarget;

/// lrpc client for single calls
///
/// Each call is one encode, one platform invocation and one decode. Calls
/// on the same client may run concurrently.
pub struct Client {
    transport: Arc<dyn Transport>,
    target: FunctionTarget,
    seq: AtomicU64,
}

impl Client {
    /// Create a client for `function` (`name[:qualifier]`)
    ///
    /// Fails if the transport cannot find the function.
    pub async fn new(transport: Arc<dyn Transport>, function: &str) -> Result<Self> {
        Self::with_target(transport, FunctionTarget::parse(function)?).await
    }

    pub async fn with_target(transport: Arc<dyn Transport>, target: FunctionTarget) -> Result<Self> {
        transport
            .describe(&target.name, target.qualifier.as_deref())
            .await?;

        Ok(Self {
            transport,
            target,
            seq: AtomicU64::new(0),
        })
    }

    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }

    /// Call `method`, returning the reply and the request id of the
    /// invocation that produced it
    pub async fn call_with_id<A, R>(&self, method: &str, args: &A) -> Result<(R, String)>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let header = InvocationHeader::new(method, seq);
        let payload = BinaryCodec::encode_request(&header, args)?;

        tracing::debug!(function = %self.target, seq, "Calling {}", method);

        let request = InvokeRequest::new(self.target.name.clone(), payload)
            .with_qualifier(self.target.qualifier.clone());
        let output = self.transport.invoke(request).await?;

        let (request_id, _, body) = decode_output(&output)?;
        let reply = BinaryCodec::decode_value(body)?;
        Ok((reply, request_id))
    }

    /// Call `method`
    pub async fn call<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call_with_id(method, args).await.map(|(reply, _)| reply)
    }
}

/// Classifies an invocation output.
///
/// On success returns the request id, the reply header and the undecoded
/// reply value.
pub(crate) fn decode_output(output: &InvokeOutput) -> Result<(String, ReplyHeader, &[u8])> {
    if output.is_function_error() {
        return Err(PlatformFault::classify(&output.payload));
    }

    let (request_id, header, body) = BinaryCodec::decode_reply(&output.payload)?;
    match header.to_error(&request_id) {
        Some(err) => Err(err),
        None => Ok((request_id, header, body)),
    }
}

/// Error used once a client or codec has been closed.
pub(crate) fn closed() -> LrpcError {
    LrpcError::Transport("client is closed".to_string())
}
