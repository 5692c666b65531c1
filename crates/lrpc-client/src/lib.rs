//! lrpc Client
//!
//! Calls RPC services hosted in serverless functions. Three clients share one
//! encode/decode core:
//!
//! - [`Client`]: one call, one invocation
//! - [`StreamingCodec`]: many calls in flight, replies read in completion order
//! - [`PipelinedClient`]: concurrent calls over a [`StreamingCodec`]
//!
//! Every failure surfaces as one [`LrpcError`](lrpc_common::LrpcError)
//! variant, so callers can tell a failed transport from a failed method from
//! a crashed one.

pub mod client;
pub mod config;
pub mod http;
pub mod pipeline;
pub mod stream;

pub use client::Client;
pub use config::{ClientConfig, FunctionTarget};
pub use http::HttpTransport;
pub use pipeline::PipelinedClient;
pub use stream::{Logger, ResponseHeader, StreamingCodec};
