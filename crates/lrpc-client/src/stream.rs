//! Streaming client codec
//!
//! [`StreamingCodec`] lets a pipelining RPC client keep many calls in flight
//! on one codec. Every [`write_request`](StreamingCodec::write_request)
//! submits its own platform invocation in a background task; completed
//! invocations queue up until [`read_response_header`](StreamingCodec::read_response_header)
//! takes them, in completion order.
//!
//! # Ordering
//!
//! Replies come back in whatever order the invocations finish. The sequence
//! number in each [`ResponseHeader`] is the only correlation key.
//!
//! # Backpressure
//!
//! Each submission reserves a slot in a bounded queue before it starts, so at
//! most [`ClientConfig::queue_capacity`] calls are outstanding or unread.
//! Further writes wait for the reader.
//!
//! # Example
//!
//! ```no_run
//! use lrpc_client::{ClientConfig, StreamingCodec};
//! use lrpc_common::InvocationHeader;
//! # async fn run(transport: std::sync::Arc<dyn lrpc_common::transport::Transport>) -> lrpc_common::Result<()> {
//! let codec = StreamingCodec::new(transport, "arith", ClientConfig::default()).await?;
//!
//! codec.write_request(&InvocationHeader::new("Arith.Multiply", 1), &(6, 7)).await?;
//! codec.write_request(&InvocationHeader::new("Arith.Multiply", 2), &(2, 3)).await?;
//!
//! for _ in 0..2 {
//!     let header = codec.read_response_header().await?;
//!     match header.error {
//!         Some(err) => println!("call {} failed: {}", header.seq, err),
//!         None => println!("call {} = {}", header.seq, codec.read_response_body::<i64>().await?),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;

use lrpc_common::protocol::error::{LrpcError, Result};
use lrpc_common::transport::{BinaryCodec, InvokeOutput, InvokeRequest, Transport};
use lrpc_common::{InvocationHeader, Sequence, ServiceMethod, UNKNOWN_REQUEST_ID};

use crate::client::{closed, decode_output};
use crate::config::{ClientConfig, FunctionTarget};

/// Receives execution log lines tagged with the method and sequence number
/// of the call that produced them.
pub type Logger = Arc<dyn Fn(&str, Sequence, &str) + Send + Sync>;

fn default_logger() -> Logger {
    Arc::new(|method, seq, line| {
        tracing::info!(method, seq, "{}", line);
    })
}

/// Header of one completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub service_method: ServiceMethod,
    pub seq: Sequence,
    /// Request id of the invocation, or `*unknown*` when no reply was decoded.
    pub request_id: String,
    /// Classified failure of the call; `None` means a reply body is ready.
    pub error: Option<LrpcError>,
}

struct Completion {
    service_method: ServiceMethod,
    seq: Sequence,
    result: Result<InvokeOutput>,
}

struct Reader {
    completions: mpsc::Receiver<Completion>,
    body: Option<Vec<u8>>,
}

/// Pipelining client codec over a [`Transport`].
pub struct StreamingCodec {
    transport: Arc<dyn Transport>,
    target: FunctionTarget,
    config: ClientConfig,
    sender: Mutex<Option<mpsc::Sender<Completion>>>,
    reader: tokio::sync::Mutex<Reader>,
    logger: RwLock<Logger>,
}

impl StreamingCodec {
    /// Create a codec for `function` (`name[:qualifier]`)
    ///
    /// Fails if the transport cannot find the function.
    pub async fn new(transport: Arc<dyn Transport>, function: &str, config: ClientConfig) -> Result<Self> {
        Self::with_target(transport, FunctionTarget::parse(function)?, config).await
    }

    pub async fn with_target(
        transport: Arc<dyn Transport>,
        target: FunctionTarget,
        config: ClientConfig,
    ) -> Result<Self> {
        transport
            .describe(&target.name, target.qualifier.as_deref())
            .await?;

        let (sender, completions) = mpsc::channel(config.queue_capacity.max(1));
        Ok(Self {
            transport,
            target,
            config,
            sender: Mutex::new(Some(sender)),
            reader: tokio::sync::Mutex::new(Reader {
                completions,
                body: None,
            }),
            logger: RwLock::new(default_logger()),
        })
    }

    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }

    /// Replace the sink for execution log lines.
    pub fn set_logger(&self, logger: impl Fn(&str, Sequence, &str) + Send + Sync + 'static) {
        *self.logger.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(logger);
    }

    /// Submit one call
    ///
    /// Returns once the call is submitted, not when it completes. Waits while
    /// the completion queue is full.
    pub async fn write_request<A>(&self, header: &InvocationHeader, args: &A) -> Result<()>
    where
        A: Serialize + ?Sized,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(closed)?;

        let payload = BinaryCodec::encode_request(header, args)?;
        let permit = sender.reserve_owned().await.map_err(|_| closed())?;

        let request = InvokeRequest::new(self.target.name.clone(), payload)
            .with_qualifier(self.target.qualifier.clone())
            .with_log_tail(self.config.capture_logs);
        let transport = Arc::clone(&self.transport);
        let service_method = header.service_method.clone();
        let seq = header.seq;

        tracing::debug!(function = %self.target, seq, "Submitting {}", service_method);

        tokio::spawn(async move {
            let result = transport.invoke(request).await;
            permit.send(Completion {
                service_method,
                seq,
                result,
            });
        });
        Ok(())
    }

    /// Wait for the next completed call
    ///
    /// A failed call is reported in [`ResponseHeader::error`]; `Err` means
    /// the codec is closed and every submitted call has been read.
    pub async fn read_response_header(&self) -> Result<ResponseHeader> {
        let mut reader = self.reader.lock().await;
        reader.body = None;

        let completion = reader.completions.recv().await.ok_or_else(closed)?;
        let mut header = ResponseHeader {
            service_method: completion.service_method,
            seq: completion.seq,
            request_id: UNKNOWN_REQUEST_ID.to_string(),
            error: None,
        };

        let output = match completion.result {
            Ok(output) => output,
            Err(err) => {
                header.error = Some(err);
                return Ok(header);
            }
        };

        if let Some(log) = &output.log_result {
            self.emit_log(&header, log);
        }

        match decode_output(&output) {
            Ok((request_id, _, body)) => {
                header.request_id = request_id;
                reader.body = Some(body.to_vec());
            }
            Err(err) => {
                header.request_id = err.request_id().to_string();
                header.error = Some(err);
            }
        }
        Ok(header)
    }

    /// Decode the reply of the call whose header was read last
    pub async fn read_response_body<R: DeserializeOwned>(&self) -> Result<R> {
        let body = self.take_body().await?;
        BinaryCodec::decode_value(&body)
    }

    pub(crate) async fn take_body(&self) -> Result<Vec<u8>> {
        self.reader
            .lock()
            .await
            .body
            .take()
            .ok_or_else(|| LrpcError::Transport("no reply body pending".to_string()))
    }

    /// Stop accepting calls
    ///
    /// Calls already submitted still complete and can be read.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn emit_log(&self, header: &ResponseHeader, encoded: &str) {
        let decoded = match STANDARD.decode(encoded.as_bytes()) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(seq = header.seq, "Undecodable execution log: {}", e);
                return;
            }
        };
        let logger = self
            .logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for line in String::from_utf8_lossy(&decoded).lines() {
            logger(&header.service_method, header.seq, line);
        }
    }
}
