// Integration tests for lrpc-server
//
// These tests drive the dispatcher through the process-wide default registry
// and check what registered methods can observe about their own invocation.

use lrpc_common::transport::BinaryCodec;
use lrpc_common::{InvocationContext, InvocationHeader};
use lrpc_server::{context_for, Dispatcher, DispatcherConfig, Methods, Registry, Service};
use serde::{Deserialize, Serialize};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Probe {
    label: String,
}

/// What a method saw of its own invocation.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Observed {
    request_id: Option<String>,
    payload_len: usize,
}

struct Inspector;

impl Inspector {
    fn observe(&self, args: &Probe) -> Result<Observed, String> {
        let ctx = context_for(args);
        Ok(Observed {
            request_id: ctx.as_ref().map(|c| c.request_id.clone()),
            payload_len: ctx.map_or(0, |c| c.payload.len()),
        })
    }
}

impl Service for Inspector {
    const NAME: &'static str = "Inspector";

    fn methods(methods: &mut Methods<Self>) {
        methods.add("Observe", Inspector::observe);
    }
}

fn call(dispatcher: &Dispatcher, request_id: &str) -> (Observed, usize) {
    let payload = BinaryCodec::encode_request(
        &InvocationHeader::new("Inspector.Observe", 1),
        &Probe { label: "x".into() },
    )
    .unwrap();
    let len = payload.len();

    let out = dispatcher
        .invoke(InvocationContext::new(request_id, payload))
        .unwrap();
    let (_, header, body) = BinaryCodec::decode_reply(&out).unwrap();
    assert!(!header.is_error(), "unexpected error: {:?}", header.error);
    (BinaryCodec::decode_value(body).unwrap(), len)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_default_registry_register_and_swap() {
    lrpc_server::set_registry(Registry::new());
    lrpc_server::register(Inspector).unwrap();
    assert!(lrpc_server::register(Inspector).is_err());
    lrpc_server::register_name("Renamed", Inspector).unwrap();

    let dispatcher = lrpc_server::default_dispatcher();
    assert_eq!(
        dispatcher.registry().method_names(),
        vec!["Inspector.Observe", "Renamed.Observe"]
    );

    let (observed, len) = call(&dispatcher, "req-default");
    assert_eq!(observed.request_id.as_deref(), Some("req-default"));
    assert_eq!(observed.payload_len, len);

    // Swapping the table leaves existing dispatchers on their snapshot.
    let mut swapped = Registry::new();
    swapped
        .register_fn("Swap.Me", |n: &u32| Ok::<_, String>(n + 1))
        .unwrap();
    lrpc_server::set_registry(swapped);

    assert!(lrpc_server::default_dispatcher().registry().lookup("Swap.Me").is_some());
    assert!(dispatcher.registry().lookup("Swap.Me").is_none());
}

#[test]
fn test_context_visible_only_during_invocation() {
    let mut registry = Registry::new();
    registry.register(Inspector).unwrap();
    let dispatcher = Dispatcher::new(registry);

    let (first, _) = call(&dispatcher, "req-a");
    let (second, _) = call(&dispatcher, "req-b");
    assert_eq!(first.request_id.as_deref(), Some("req-a"));
    assert_eq!(second.request_id.as_deref(), Some("req-b"));

    // Outside any invocation there is nothing to find.
    let stray = Probe { label: "x".into() };
    assert!(context_for(&stray).is_none());
}

#[test]
fn test_untracked_dispatcher_hides_context() {
    let mut registry = Registry::new();
    registry.register(Inspector).unwrap();
    let dispatcher = Dispatcher::with_config(
        registry,
        DispatcherConfig {
            track_invocations: false,
        },
    );

    let (observed, _) = call(&dispatcher, "req-hidden");
    assert_eq!(
        observed,
        Observed {
            request_id: None,
            payload_len: 0
        }
    );
}
