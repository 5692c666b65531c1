//! Invocation dispatcher
//!
//! The dispatcher is the hosting entry point: it receives one
//! [`InvocationContext`] per invocation and returns the output payload.
//!
//! # Request Flow
//!
//! 1. Pick the envelope from the payload's leading byte
//! 2. Decode the header (binary) or request object (text)
//! 3. Look up the method in the [`Registry`]
//! 4. Run it inside the panic guard, with its argument bound in the
//!    correlation map
//! 5. Encode the reply or the failure with the same envelope
//!
//! Failures up to and including a panic in the method are answered in-band.
//! [`Dispatcher::invoke`] only returns `Err` when no reply could be encoded
//! at all; the hosting endpoint passes that on as a platform fault.

use std::sync::Arc;

use lrpc_common::transport::http::PING_ACK;
use lrpc_common::transport::{BinaryCodec, WireFormat};
use lrpc_common::{
    next_sequence, FailureOrigin, InvocationContext, InvocationHeader, JsonRpcRequest,
    JsonRpcResponse, LrpcError, PlatformErrorKind, PlatformFault, ReplyHeader,
};

use crate::config::DispatcherConfig;
use crate::correlation;
use crate::guard;
use crate::registry::{Args, CallFailure, CallScope, Registry, Reply};

/// A failed call, ready to be written into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure {
    message: String,
    origin: FailureOrigin,
}

impl Failure {
    fn server(message: impl Into<String>) -> Self {
        Failure {
            message: message.into(),
            origin: FailureOrigin::Server,
        }
    }
}

/// Routes invocations to registered methods.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    pub fn with_config(registry: Registry, config: DispatcherConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Keep-alive; never touches registered methods.
    pub fn ping(&self) -> Vec<u8> {
        PING_ACK.to_vec()
    }

    /// Handles one invocation.
    ///
    /// Returns the output payload, which is empty for text notifications.
    pub fn invoke(&self, ctx: InvocationContext) -> Result<Vec<u8>, PlatformFault> {
        let ctx = Arc::new(ctx);
        match WireFormat::detect(&ctx.payload) {
            WireFormat::Binary => self.invoke_binary(&ctx),
            WireFormat::Text => self.invoke_text(&ctx),
        }
    }

    fn invoke_binary(&self, ctx: &Arc<InvocationContext>) -> Result<Vec<u8>, PlatformFault> {
        let buffer = match BinaryCodec::unwrap_request(&ctx.payload) {
            Ok(buffer) => buffer,
            Err(e) => return self.binary_reply(ctx, &undecoded_header(), Err(decode_failure(ctx, &e))),
        };
        let (header, body) = match BinaryCodec::decode_request_header(&buffer) {
            Ok(decoded) => decoded,
            Err(e) => return self.binary_reply(ctx, &undecoded_header(), Err(decode_failure(ctx, &e))),
        };

        tracing::debug!(
            request_id = %ctx.request_id,
            seq = header.seq,
            "Dispatching {}",
            header.service_method
        );

        let outcome = self
            .run(ctx, &header.service_method, Args::Binary(body))
            .and_then(|reply| match reply {
                Reply::Binary(bytes) => Ok(bytes),
                Reply::Text(_) => Err(Failure::server("reply encoded in the wrong envelope")),
            });
        self.binary_reply(ctx, &header, outcome)
    }

    fn binary_reply(
        &self,
        ctx: &InvocationContext,
        request: &InvocationHeader,
        outcome: Result<Vec<u8>, Failure>,
    ) -> Result<Vec<u8>, PlatformFault> {
        let (header, body) = match outcome {
            Ok(body) => (ReplyHeader::success(request), body),
            Err(failure) => (
                ReplyHeader::failure(request, failure.message, failure.origin),
                Vec::new(),
            ),
        };
        BinaryCodec::encode_reply(&ctx.request_id, &header, &body).map_err(|e| encode_fault(ctx, &e))
    }

    fn invoke_text(&self, ctx: &Arc<InvocationContext>) -> Result<Vec<u8>, PlatformFault> {
        let request = match JsonRpcRequest::parse(&ctx.payload) {
            Ok(request) => request,
            Err(e) => {
                let failure = decode_failure(ctx, &e);
                let response = JsonRpcResponse::error(
                    JsonRpcResponse::null_id(),
                    decorate(&ctx.request_id, &failure),
                );
                return response.to_vec().map_err(|e| encode_fault(ctx, &e));
            }
        };

        tracing::debug!(
            request_id = %ctx.request_id,
            seq = next_sequence(),
            notification = request.is_notification(),
            "Dispatching {}",
            request.method
        );

        let outcome = self.run(ctx, &request.method, Args::Text(request.params_json()));

        let Some(id) = request.id else {
            return Ok(Vec::new());
        };

        let response = match outcome {
            Ok(Reply::Text(result)) => JsonRpcResponse::success(id, result),
            Ok(Reply::Binary(_)) => JsonRpcResponse::error(
                id,
                decorate(&ctx.request_id, &Failure::server("reply encoded in the wrong envelope")),
            ),
            Err(failure) => JsonRpcResponse::error(id, decorate(&ctx.request_id, &failure)),
        };
        response.to_vec().map_err(|e| encode_fault(ctx, &e))
    }

    fn run(&self, ctx: &Arc<InvocationContext>, key: &str, args: Args<'_>) -> Result<Reply, Failure> {
        let Some(method) = self.registry.lookup(key) else {
            tracing::warn!(request_id = %ctx.request_id, "Method not found: {}", key);
            return Err(Failure::server(format!("can't find method {}", key)));
        };

        let scope = if self.config.track_invocations {
            CallScope::tracked(correlation::global(), ctx)
        } else {
            CallScope::untracked()
        };

        let result = guard::guarded(|| method.call(args, &scope));

        if self.config.track_invocations {
            correlation::release(Arc::clone(ctx));
        }

        match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(CallFailure::Method(message))) => Err(Failure {
                message,
                origin: FailureOrigin::Method,
            }),
            Ok(Err(CallFailure::Decode(message))) | Ok(Err(CallFailure::Encode(message))) => {
                tracing::warn!(request_id = %ctx.request_id, "{} failed: {}", key, message);
                Err(Failure::server(message))
            }
            Err(fault) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    method = key,
                    "panic: {}\n{}",
                    fault.message,
                    fault.backtrace
                );
                Err(Failure {
                    message: fault.reply_message(),
                    origin: FailureOrigin::Panic,
                })
            }
        }
    }
}

fn undecoded_header() -> InvocationHeader {
    InvocationHeader::new("", 0)
}

fn decode_failure(ctx: &InvocationContext, err: &LrpcError) -> Failure {
    tracing::warn!(request_id = %ctx.request_id, "Undecodable request: {}", err);
    Failure::server(err.message())
}

// Text replies carry no structured request id, so server and panic failures
// are prefixed with it. Method errors are returned as the method wrote them.
fn decorate(request_id: &str, failure: &Failure) -> String {
    match failure.origin {
        FailureOrigin::Method => failure.message.clone(),
        FailureOrigin::Server | FailureOrigin::Panic => {
            format!("{} : {}", request_id, failure.message)
        }
    }
}

fn encode_fault(ctx: &InvocationContext, err: &LrpcError) -> PlatformFault {
    tracing::error!(request_id = %ctx.request_id, "Reply encoding failed: {}", err);
    PlatformFault::new(
        format!("{} : {}", ctx.request_id, err.message()),
        PlatformErrorKind::Error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Methods, Service};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Serialize, Deserialize)]
    struct Operands {
        a: i64,
        b: i64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quotient {
        quo: i64,
        rem: i64,
    }

    struct Arith;

    impl Arith {
        fn divide(&self, args: &Operands) -> Result<Quotient, String> {
            if args.b == 0 {
                return Err("divide by zero".into());
            }
            Ok(Quotient {
                quo: args.a / args.b,
                rem: args.a % args.b,
            })
        }

        fn panic(&self, _: &Operands) -> Result<Quotient, String> {
            panic!("ERROR")
        }
    }

    impl Service for Arith {
        const NAME: &'static str = "Arith";

        fn methods(methods: &mut Methods<Self>) {
            methods.add("Divide", Arith::divide).add("Panic", Arith::panic);
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = Registry::new();
        registry.register(Arith).unwrap();
        Dispatcher::with_config(registry, DispatcherConfig { track_invocations: false })
    }

    fn binary(method: &str, args: &Operands) -> Vec<u8> {
        BinaryCodec::encode_request(&InvocationHeader::new(method, 7), args).unwrap()
    }

    fn text(dispatcher: &Dispatcher, payload: &str) -> Value {
        let out = dispatcher
            .invoke(InvocationContext::new("req-t", payload.as_bytes().to_vec()))
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_binary_success() {
        let out = dispatcher()
            .invoke(InvocationContext::new("req-1", binary("Arith.Divide", &Operands { a: 5, b: 2 })))
            .unwrap();
        let (request_id, header, body) = BinaryCodec::decode_reply(&out).unwrap();
        assert_eq!(request_id, "req-1");
        assert_eq!(header.seq, 7);
        assert_eq!(header.service_method, "Arith.Divide");
        assert!(!header.is_error());
        assert_eq!(
            BinaryCodec::decode_value::<Quotient>(body).unwrap(),
            Quotient { quo: 2, rem: 1 }
        );
    }

    #[test]
    fn test_binary_method_error() {
        let out = dispatcher()
            .invoke(InvocationContext::new("req-2", binary("Arith.Divide", &Operands { a: 5, b: 0 })))
            .unwrap();
        let (request_id, header, body) = BinaryCodec::decode_reply(&out).unwrap();
        assert!(body.is_empty());
        assert_eq!(
            header.to_error(&request_id),
            Some(LrpcError::method("divide by zero", "req-2"))
        );
    }

    #[test]
    fn test_binary_panic_recovered() {
        let out = dispatcher()
            .invoke(InvocationContext::new("req-3", binary("Arith.Panic", &Operands { a: 1, b: 1 })))
            .unwrap();
        let (_, header, _) = BinaryCodec::decode_reply(&out).unwrap();
        assert_eq!(header.origin, FailureOrigin::Panic);
        assert_eq!(header.error.as_deref(), Some("panic: ERROR"));
    }

    #[test]
    fn test_binary_unknown_method() {
        let out = dispatcher()
            .invoke(InvocationContext::new("req-4", binary("Arith.Modulo", &Operands { a: 1, b: 1 })))
            .unwrap();
        let (request_id, header, _) = BinaryCodec::decode_reply(&out).unwrap();
        let err = header.to_error(&request_id).unwrap();
        assert!(err.is_server_error());
        assert_eq!(err.message(), "can't find method Arith.Modulo");
    }

    #[test]
    fn test_binary_garbage_is_server_error() {
        let out = dispatcher()
            .invoke(InvocationContext::new("req-5", b"\"%%%\"".to_vec()))
            .unwrap();
        let (request_id, header, _) = BinaryCodec::decode_reply(&out).unwrap();
        assert_eq!(request_id, "req-5");
        assert_eq!(header.seq, 0);
        assert!(header.to_error(&request_id).unwrap().is_server_error());
    }

    #[test]
    fn test_text_success() {
        let value = text(
            &dispatcher(),
            r#"{"method":"Arith.Divide","params":{"a":7,"b":2},"id":"x"}"#,
        );
        assert_eq!(value, json!({"result": {"quo": 3, "rem": 1}, "id": "x"}));
    }

    #[test]
    fn test_text_errors() {
        let d = dispatcher();

        let method = text(&d, r#"{"method":"Arith.Divide","params":{"a":7,"b":0},"id":1}"#);
        assert_eq!(method, json!({"error": "divide by zero", "id": 1}));

        let panic = text(&d, r#"{"method":"Arith.Panic","params":{"a":7,"b":0},"id":2}"#);
        assert_eq!(panic["error"], "req-t : panic: ERROR");

        let missing = text(&d, r#"{"method":"Nope.Nope","id":3}"#);
        assert_eq!(missing["error"], "req-t : can't find method Nope.Nope");
        assert!(missing.get("result").is_none());
    }

    #[test]
    fn test_text_parse_failure_has_null_id() {
        let value = text(&dispatcher(), "{\"method\": ");
        assert_eq!(value["id"], Value::Null);
        assert!(value["error"].as_str().unwrap().starts_with("req-t : "));
    }

    #[test]
    fn test_notification_has_no_output() {
        let out = dispatcher()
            .invoke(InvocationContext::new(
                "req-n",
                br#"{"method":"Arith.Divide","params":{"a":7,"b":0}}"#.to_vec(),
            ))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_ping() {
        assert_eq!(dispatcher().ping(), b"{}");
    }

    #[test]
    fn test_empty_method_error_is_still_an_error() {
        let mut registry = Registry::new();
        registry
            .register_fn("Arith.Quiet", |_: &Operands| Err::<i64, _>(String::new()))
            .unwrap();
        let out = Dispatcher::new(registry)
            .invoke(InvocationContext::new("req-q", binary("Arith.Quiet", &Operands { a: 1, b: 1 })))
            .unwrap();

        let (request_id, header, body) = BinaryCodec::decode_reply(&out).unwrap();
        assert!(header.is_error());
        assert!(body.is_empty());
        assert_eq!(header.to_error(&request_id), Some(LrpcError::method("", "req-q")));
    }

    #[test]
    fn test_zero_sized_arguments_keep_their_own_context() {
        let gate = Arc::new(std::sync::Barrier::new(2));
        let mut registry = Registry::new();
        let method_gate = Arc::clone(&gate);
        registry
            .register_fn("Clock.Who", move |args: &()| {
                // Both invocations are bound before either looks up, and
                // neither is released until both have looked up.
                method_gate.wait();
                let seen = correlation::context_for(args).map(|ctx| ctx.request_id.clone());
                method_gate.wait();
                Ok::<_, String>(seen)
            })
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(registry));

        let handles: Vec<_> = ["req-A", "req-B"]
            .into_iter()
            .map(|request_id| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    let payload =
                        BinaryCodec::encode_request(&InvocationHeader::new("Clock.Who", 1), &())
                            .unwrap();
                    let out = dispatcher
                        .invoke(InvocationContext::new(request_id, payload))
                        .unwrap();
                    let (_, header, body) = BinaryCodec::decode_reply(&out).unwrap();
                    assert!(!header.is_error());
                    let seen: Option<String> = BinaryCodec::decode_value(body).unwrap();
                    assert_eq!(seen.as_deref(), Some(request_id));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
