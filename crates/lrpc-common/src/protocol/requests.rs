use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub type Sequence = u64;
pub type ServiceMethod = String;

static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Header written ahead of every binary invocation.
///
/// `service_method` is the `"Type.Method"` key of the registered method and
/// `seq` correlates pipelined calls from one client with their replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationHeader {
    pub service_method: ServiceMethod,
    pub seq: Sequence,
}

impl InvocationHeader {
    pub fn new(service_method: impl Into<String>, seq: Sequence) -> Self {
        InvocationHeader {
            service_method: service_method.into(),
            seq,
        }
    }
}

/// Process-wide sequence numbers for calls that arrive without one
/// (text-protocol requests).
pub fn next_sequence() -> Sequence {
    SEQUENCE_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}
