//! Invocation correlation
//!
//! While a registered method runs, the dispatcher associates the method's
//! decoded argument with the [`InvocationContext`] of the current invocation.
//! Code inside the method can then call [`context_for`] with its own argument
//! to read the request id and raw payload of the call in flight.
//!
//! Entries are keyed by the argument's address and type, not its contents.
//! A lookup is only meaningful from inside the method that received the
//! argument; once the invocation completes the entry is removed and the
//! address may be reused. The dispatcher gives every decoded argument its
//! own allocation, zero-sized types included, so concurrent invocations
//! never share a key.
//!
//! # Example
//!
//! ```
//! use lrpc_server::correlation::CorrelationMap;
//! use lrpc_common::InvocationContext;
//! use std::sync::Arc;
//!
//! let map = CorrelationMap::new();
//! let args = Box::new((5i64, 2i64));
//! let ctx = Arc::new(InvocationContext::new("req-1", Vec::new()));
//!
//! map.set(&*args, ctx.clone());
//! assert_eq!(map.get(&*args).unwrap().request_id, "req-1");
//!
//! map.delete(&ctx);
//! assert!(map.get(&*args).is_none());
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use lrpc_common::InvocationContext;

static GLOBAL: LazyLock<CorrelationMap> = LazyLock::new(CorrelationMap::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ArgKey {
    addr: usize,
    ty: TypeId,
}

impl ArgKey {
    fn of<A: 'static>(arg: &A) -> Self {
        ArgKey {
            addr: arg as *const A as usize,
            ty: TypeId::of::<A>(),
        }
    }
}

/// Table from argument identity to the invocation using it.
#[derive(Debug, Default)]
pub struct CorrelationMap {
    entries: Mutex<HashMap<ArgKey, Arc<InvocationContext>>>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ArgKey, Arc<InvocationContext>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Associates `arg` with `ctx`, replacing any previous association.
    pub fn set<A: 'static>(&self, arg: &A, ctx: Arc<InvocationContext>) {
        self.entries().insert(ArgKey::of(arg), ctx);
    }

    pub fn get<A: 'static>(&self, arg: &A) -> Option<Arc<InvocationContext>> {
        self.entries().get(&ArgKey::of(arg)).cloned()
    }

    /// Removes the association bound to `ctx`.
    ///
    /// Only the context is known when an invocation completes, so this scans
    /// for the entry holding that exact context.
    pub fn delete(&self, ctx: &Arc<InvocationContext>) {
        self.entries().retain(|_, v| !Arc::ptr_eq(v, ctx));
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// The process-wide correlation map used by every dispatcher.
pub fn global() -> &'static CorrelationMap {
    &GLOBAL
}

/// Context of the invocation currently using `args`.
///
/// Intended to be called only from inside a registered method, with the
/// argument that method received. Returns `None` outside an invocation or
/// when the dispatcher does not track invocations.
pub fn context_for<A: 'static>(args: &A) -> Option<Arc<InvocationContext>> {
    GLOBAL.get(args)
}

/// Removes `ctx` from the global map off the calling path when a tokio
/// runtime is available, inline otherwise.
pub(crate) fn release(ctx: Arc<InvocationContext>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { GLOBAL.delete(&ctx) });
        }
        Err(_) => GLOBAL.delete(&ctx),
    }
}
