//! Registered method table
//!
//! Services register their methods once at start-up; the dispatcher looks
//! them up by `"Type.Method"` key for every invocation.
//!
//! # Example
//!
//! ```
//! use lrpc_server::{Methods, Registry, Service};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Args { a: i64, b: i64 }
//!
//! struct Arith;
//!
//! impl Arith {
//!     fn multiply(&self, args: &Args) -> Result<i64, String> {
//!         Ok(args.a * args.b)
//!     }
//! }
//!
//! impl Service for Arith {
//!     const NAME: &'static str = "Arith";
//!
//!     fn methods(methods: &mut Methods<Self>) {
//!         methods.add("Multiply", Arith::multiply);
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register(Arith).unwrap();
//! assert!(registry.lookup("Arith.Multiply").is_some());
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use lrpc_common::{InvocationContext, LrpcError, Result, UNKNOWN_REQUEST_ID};

use crate::correlation::CorrelationMap;

/// Argument bytes in the envelope's encoding.
#[derive(Debug, Clone, Copy)]
pub enum Args<'a> {
    /// Structural binary value
    Binary(&'a [u8]),
    /// Raw JSON text
    Text(&'a str),
}

/// Encoded reply value, in the same encoding as the arguments.
#[derive(Debug)]
pub enum Reply {
    Binary(Vec<u8>),
    Text(Box<RawValue>),
}

/// Why a call produced no reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The argument did not decode into the method's argument type.
    Decode(String),
    /// The method returned an error.
    Method(String),
    /// The reply value could not be encoded.
    Encode(String),
}

/// Binds the decoded argument of one call to its invocation.
pub struct CallScope<'a> {
    tracking: Option<(&'a CorrelationMap, &'a Arc<InvocationContext>)>,
}

impl<'a> CallScope<'a> {
    /// Scope that records nothing.
    pub fn untracked() -> Self {
        CallScope { tracking: None }
    }

    pub fn tracked(map: &'a CorrelationMap, ctx: &'a Arc<InvocationContext>) -> Self {
        CallScope {
            tracking: Some((map, ctx)),
        }
    }

    fn bind<A: 'static>(&self, args: &A) {
        if let Some((map, ctx)) = self.tracking {
            map.set(args, Arc::clone(ctx));
        }
    }
}

/// A type-erased registered method.
pub trait Method: Send + Sync {
    fn call(&self, args: Args<'_>, scope: &CallScope<'_>) -> std::result::Result<Reply, CallFailure>;
}

fn decode_args<A: DeserializeOwned>(args: Args<'_>) -> std::result::Result<A, CallFailure> {
    let decoded = match args {
        Args::Binary(bytes) => postcard::from_bytes(bytes).map_err(|e| e.to_string()),
        Args::Text(json) => serde_json::from_str(json).map_err(|e| e.to_string()),
    };
    decoded.map_err(|e| CallFailure::Decode(format!("decoding arguments: {}", e)))
}

/// Heap slot for a decoded argument.
///
/// The tag keeps the slot non-zero-sized, so every live invocation gets its
/// own allocation even when `A` is `()`. `repr(C)` pins `arg` at the start
/// of that allocation.
#[repr(C)]
struct Slot<A> {
    arg: A,
    _tag: u8,
}

fn encode_reply<R: Serialize>(args: Args<'_>, reply: &R) -> std::result::Result<Reply, CallFailure> {
    let encoded = match args {
        Args::Binary(_) => postcard::to_stdvec(reply)
            .map(Reply::Binary)
            .map_err(|e| e.to_string()),
        Args::Text(_) => serde_json::value::to_raw_value(reply)
            .map(Reply::Text)
            .map_err(|e| e.to_string()),
    };
    encoded.map_err(|e| CallFailure::Encode(format!("encoding reply: {}", e)))
}

// Decodes into a boxed slot so the argument has a stable, distinct address
// for the correlation map while the method runs.
fn invoke<A, R, E>(
    args: Args<'_>,
    scope: &CallScope<'_>,
    f: impl FnOnce(&A) -> std::result::Result<R, E>,
) -> std::result::Result<Reply, CallFailure>
where
    A: DeserializeOwned + 'static,
    R: Serialize,
    E: Display,
{
    let slot = Box::new(Slot {
        arg: decode_args::<A>(args)?,
        _tag: 0,
    });
    scope.bind(&slot.arg);
    let reply = f(&slot.arg).map_err(|e| CallFailure::Method(e.to_string()))?;
    encode_reply(args, &reply)
}

struct ServiceMethod<S, A, R, E, F> {
    service: Arc<S>,
    f: F,
    _marker: PhantomData<fn(A) -> (R, E)>,
}

impl<S, A, R, E, F> Method for ServiceMethod<S, A, R, E, F>
where
    S: Send + Sync + 'static,
    A: DeserializeOwned + 'static,
    R: Serialize,
    E: Display,
    F: Fn(&S, &A) -> std::result::Result<R, E> + Send + Sync,
{
    fn call(&self, args: Args<'_>, scope: &CallScope<'_>) -> std::result::Result<Reply, CallFailure> {
        invoke(args, scope, |a: &A| (self.f)(&*self.service, a))
    }
}

struct FnMethod<A, R, E, F> {
    f: F,
    _marker: PhantomData<fn(A) -> (R, E)>,
}

impl<A, R, E, F> Method for FnMethod<A, R, E, F>
where
    A: DeserializeOwned + 'static,
    R: Serialize,
    E: Display,
    F: Fn(&A) -> std::result::Result<R, E> + Send + Sync,
{
    fn call(&self, args: Args<'_>, scope: &CallScope<'_>) -> std::result::Result<Reply, CallFailure> {
        invoke(args, scope, &self.f)
    }
}

/// A service whose methods can be registered together.
pub trait Service: Send + Sync + Sized + 'static {
    /// Type name used as the prefix of every method key.
    const NAME: &'static str;

    fn methods(methods: &mut Methods<Self>);
}

/// Method list collected from a [`Service`].
pub struct Methods<S> {
    service: Arc<S>,
    entries: Vec<(&'static str, Arc<dyn Method>)>,
}

impl<S: Send + Sync + 'static> Methods<S> {
    /// Adds `f` under `name`; the full key is `"<service>.<name>"`.
    pub fn add<A, R, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
        F: Fn(&S, &A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let method = ServiceMethod {
            service: Arc::clone(&self.service),
            f,
            _marker: PhantomData,
        };
        self.entries.push((name, Arc::new(method)));
        self
    }
}

/// Table of registered methods keyed by `"Type.Method"`.
#[derive(Default, Clone)]
pub struct Registry {
    methods: BTreeMap<String, Arc<dyn Method>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every method of `service` under [`Service::NAME`].
    pub fn register<S: Service>(&mut self, service: S) -> Result<()> {
        self.register_name(S::NAME, service)
    }

    /// Registers every method of `service` under `name`.
    ///
    /// Nothing is registered if any of the keys is already taken.
    pub fn register_name<S: Service>(&mut self, name: &str, service: S) -> Result<()> {
        if name.is_empty() {
            return Err(registration_error("no service name"));
        }

        let mut methods = Methods {
            service: Arc::new(service),
            entries: Vec::new(),
        };
        S::methods(&mut methods);

        if methods.entries.is_empty() {
            return Err(registration_error(format!(
                "type {} has no registered methods",
                name
            )));
        }

        let keyed: Vec<(String, Arc<dyn Method>)> = methods
            .entries
            .into_iter()
            .map(|(method, m)| (format!("{}.{}", name, method), m))
            .collect();

        for (key, _) in &keyed {
            self.check_free(key)?;
        }
        for (key, method) in keyed {
            tracing::debug!("Registered method {}", key);
            self.methods.insert(key, method);
        }
        Ok(())
    }

    /// Registers a single function under a full `"Type.Method"` key.
    pub fn register_fn<A, R, E, F>(&mut self, key: &str, f: F) -> Result<()>
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
        F: Fn(&A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        match key.split_once('.') {
            Some((ty, method)) if !ty.is_empty() && !method.is_empty() => {}
            _ => {
                return Err(registration_error(format!(
                    "method key {:?} is not of the form Type.Method",
                    key
                )))
            }
        }
        self.check_free(key)?;

        let method = FnMethod {
            f,
            _marker: PhantomData,
        };
        tracing::debug!("Registered method {}", key);
        self.methods.insert(key.to_string(), Arc::new(method));
        Ok(())
    }

    fn check_free(&self, key: &str) -> Result<()> {
        if self.methods.contains_key(key) {
            return Err(registration_error(format!("method already defined: {}", key)));
        }
        Ok(())
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<dyn Method>> {
        self.methods.get(key).cloned()
    }

    /// Registered keys in sorted order.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.method_names())
            .finish()
    }
}

fn registration_error(message: impl Into<String>) -> LrpcError {
    LrpcError::server(message, UNKNOWN_REQUEST_ID)
}
