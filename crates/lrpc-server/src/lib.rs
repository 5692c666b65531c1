//! lrpc Server
//!
//! This crate hosts request/reply RPC services inside a serverless function.
//! Each platform invocation is handed to a [`Dispatcher`], which decodes the
//! payload, runs the registered method and encodes its reply.
//!
//! Services are registered once, before serving begins, either on an explicit
//! [`Registry`] or on the process-wide default used by [`serve`].
//!
//! # Example
//!
//! ```no_run
//! use lrpc_server::{Methods, Service};
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     fn hello(&self, name: &String) -> Result<String, String> {
//!         Ok(format!("hello {}", name))
//!     }
//! }
//!
//! impl Service for Greeter {
//!     const NAME: &'static str = "Greeter";
//!
//!     fn methods(methods: &mut Methods<Self>) {
//!         methods.add("Hello", Greeter::hello);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     lrpc_server::register(Greeter).unwrap();
//!     lrpc_server::serve().await.unwrap();
//! }
//! ```

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod guard;
pub mod http_server;
pub mod local;
pub mod registry;

pub use config::{DispatcherConfig, ServerConfig};
pub use correlation::context_for;
pub use dispatcher::Dispatcher;
pub use http_server::{serve, HttpServer};
pub use local::LocalTransport;
pub use registry::{Methods, Registry, Service};

use std::sync::{LazyLock, PoisonError, RwLock};

use lrpc_common::Result;

static DEFAULT_REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::new()));

/// Registers `service` with the process-wide default registry.
pub fn register<S: Service>(service: S) -> Result<()> {
    DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(service)
}

/// Registers `service` under `name` with the process-wide default registry.
pub fn register_name<S: Service>(name: &str, service: S) -> Result<()> {
    DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_name(name, service)
}

/// Replaces the process-wide default registry.
pub fn set_registry(registry: Registry) {
    *DEFAULT_REGISTRY.write().unwrap_or_else(PoisonError::into_inner) = registry;
}

/// Dispatcher over a snapshot of the process-wide default registry.
pub fn default_dispatcher() -> Dispatcher {
    let registry = DEFAULT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Dispatcher::new(registry)
}
