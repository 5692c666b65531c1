use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use lrpc_common::protocol::error::Result;
use lrpc_common::transport::{BinaryCodec, Transport};
use lrpc_common::{InvocationHeader, Sequence};

use crate::client::closed;
use crate::config::ClientConfig;
use crate::stream::StreamingCodec;

type Pending = Arc<Mutex<HashMap<Sequence, oneshot::Sender<Result<Vec<u8>>>>>>;

/// Concurrent client driving a [`StreamingCodec`].
///
/// Calls get increasing sequence numbers and wait on a ledger entry keyed by
/// that number. A background task reads completed calls off the codec and
/// routes each reply to the caller waiting for its sequence number, so
/// replies may finish in any order.
pub struct PipelinedClient {
    codec: Arc<StreamingCodec>,
    next_seq: AtomicU64,
    pending: Pending,
    reader: JoinHandle<()>,
}

impl PipelinedClient {
    /// Create a client for `function` (`name[:qualifier]`)
    pub async fn new(transport: Arc<dyn Transport>, function: &str, config: ClientConfig) -> Result<Self> {
        let codec = StreamingCodec::new(transport, function, config).await?;
        Ok(Self::from_codec(codec))
    }

    pub fn from_codec(codec: StreamingCodec) -> Self {
        let codec = Arc::new(codec);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_loop(Arc::clone(&codec), Arc::clone(&pending)));

        Self {
            codec,
            next_seq: AtomicU64::new(0),
            pending,
            reader,
        }
    }

    pub fn codec(&self) -> &StreamingCodec {
        &self.codec
    }

    /// Call `method` and wait for its reply
    pub async fn call<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.ledger().insert(seq, tx);

        if let Err(err) = self
            .codec
            .write_request(&InvocationHeader::new(method, seq), args)
            .await
        {
            self.ledger().remove(&seq);
            return Err(err);
        }

        let body = rx.await.map_err(|_| closed())??;
        BinaryCodec::decode_value(&body)
    }

    /// Number of calls waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.ledger().len()
    }

    /// Stop accepting calls; calls in flight still complete.
    pub fn close(&self) {
        self.codec.close();
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, HashMap<Sequence, oneshot::Sender<Result<Vec<u8>>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PipelinedClient {
    fn drop(&mut self) {
        self.codec.close();
        self.reader.abort();
    }
}

async fn read_loop(codec: Arc<StreamingCodec>, pending: Pending) {
    while let Ok(header) = codec.read_response_header().await {
        let result = match header.error {
            Some(err) => Err(err),
            None => codec.take_body().await,
        };

        let waiter = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&header.seq);
        match waiter {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!(seq = header.seq, "Reply for unknown call {}", header.service_method),
        }
    }

    // Codec closed: nobody will answer what is left.
    for (_, tx) in pending.lock().unwrap_or_else(PoisonError::into_inner).drain() {
        let _ = tx.send(Err(closed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lrpc_common::transport::{InvokeOutput, InvokeRequest};
    use lrpc_common::ReplyHeader;
    use std::time::Duration;

    /// Doubles its argument; earlier calls take longer.
    struct SlowDouble;

    #[async_trait]
    impl Transport for SlowDouble {
        async fn describe(&self, _: &str, _: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutput> {
            let buffer = BinaryCodec::unwrap_request(&request.payload)?;
            let (header, body) = BinaryCodec::decode_request_header(&buffer)?;
            let value: u64 = BinaryCodec::decode_value(body)?;
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(header.seq * 10))).await;

            let payload = BinaryCodec::encode_reply(
                "req",
                &ReplyHeader::success(&header),
                &BinaryCodec::encode_value(&(value * 2))?,
            )?;
            Ok(InvokeOutput::payload(payload))
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_routed_by_sequence() {
        let client = PipelinedClient::new(Arc::new(SlowDouble), "double", ClientConfig::default())
            .await
            .unwrap();

        let (a, b, c) = tokio::join!(
            client.call::<_, u64>("Math.Double", &1u64),
            client.call::<_, u64>("Math.Double", &2u64),
            client.call::<_, u64>("Math.Double", &3u64),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (2, 4, 6));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = PipelinedClient::new(Arc::new(SlowDouble), "double", ClientConfig::default())
            .await
            .unwrap();
        client.close();

        let err = client.call::<_, u64>("Math.Double", &1u64).await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(client.in_flight(), 0);
    }
}
