pub mod error;
pub mod invocation;
pub mod jsonrpc;
pub mod requests;
pub mod responses;

#[cfg(test)]
mod tests;

pub use error::{LrpcError, PlatformErrorKind, Result, UNKNOWN_REQUEST_ID};
pub use invocation::{InvocationContext, PlatformFault};
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse};
pub use requests::{next_sequence, InvocationHeader, Sequence, ServiceMethod};
pub use responses::{FailureOrigin, ReplyHeader};
