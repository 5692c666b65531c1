//! lrpc Common Types and Transport
//!
//! This crate provides the protocol definitions and envelope codecs shared by
//! the lrpc dispatcher and client.
//!
//! # Overview
//!
//! lrpc runs request/reply RPC services behind a serverless, one-invocation-
//! per-call execution model. Each call becomes one platform invocation whose
//! payload carries the method name and argument, and whose output carries the
//! reply or a classified error:
//!
//! - **Protocol Layer**: invocation and reply headers, the invocation
//!   context, the text (JSON-RPC style) envelope and the error taxonomy
//! - **Transport Layer**: the binary envelope codec and the boundary to the
//!   platform's invocation primitive
//!
//! # Wire Format
//!
//! - **Binary request**: `postcard(header) ++ postcard(args)`, base64
//!   encoded inside a JSON string
//! - **Binary reply**: `postcard(request_id) ++ postcard(header) [++ postcard(reply)]`
//! - **Text request/reply**: `{"method","params","id"}` / `{"result"|"error","id"}`
//!
//! # Components
//!
//! - [`protocol`] - Headers, invocation context, text envelope, errors
//! - [`transport`] - Binary codec, `Transport` trait, HTTP boundary helpers
//!
//! # Example
//!
//! ```
//! use lrpc_common::{InvocationHeader, LrpcError, ReplyHeader, FailureOrigin};
//!
//! let request = InvocationHeader::new("Arith.Divide", 1);
//! let reply = ReplyHeader::failure(&request, "divide by zero", FailureOrigin::Method);
//!
//! let err = reply.to_error("req-1").unwrap();
//! assert!(err.is_method_error());
//! assert_eq!(err.request_id(), "req-1");
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
