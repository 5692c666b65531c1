//! lrpc
//!
//! Runs classic request/reply RPC services behind a synchronous,
//! single-invocation-per-call serverless function model, and lets callers
//! reach them through that model as if over a normal RPC transport.
//!
//! - [`common`] - error taxonomy, wire envelopes, transport boundary
//! - [`server`] - method registry, dispatcher, correlation map, hosting endpoint
//! - [`client`] - single-call and pipelined clients, HTTP transport

pub use lrpc_client as client;
pub use lrpc_common as common;
pub use lrpc_server as server;
