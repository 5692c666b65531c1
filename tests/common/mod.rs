//! Shared fixtures for the lrpc end-to-end tests.

#![allow(dead_code)]

use std::time::UNIX_EPOCH;

use lrpc::server::{context_for, Dispatcher, Methods, Registry, Service};
use serde::{Deserialize, Serialize};

/// Function name the fixtures are hosted under.
pub const FUNCTION: &str = "arith";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operands {
    #[serde(rename = "A")]
    pub a: i64,
    #[serde(rename = "B")]
    pub b: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotient {
    #[serde(rename = "Quo")]
    pub quo: i64,
    #[serde(rename = "Rem")]
    pub rem: i64,
}

/// Argument of `Arith.BadIdea`; the label is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    pub label: String,
}

/// Arithmetic service with a few deliberately misbehaving methods.
pub struct Arith;

impl Arith {
    fn multiply(&self, args: &Operands) -> Result<i64, String> {
        Ok(args.a * args.b)
    }

    fn divide(&self, args: &Operands) -> Result<Quotient, String> {
        if args.b == 0 {
            return Err("divide by zero".to_string());
        }
        Ok(Quotient {
            quo: args.a / args.b,
            rem: args.a % args.b,
        })
    }

    fn error(&self, _: &String) -> Result<String, String> {
        Err("this is an error".to_string())
    }

    fn panic(&self, _: &String) -> Result<String, String> {
        panic!("this is a panic")
    }

    /// Returns the request id of the invocation it runs in.
    fn bad_idea(&self, args: &Probe) -> Result<String, String> {
        context_for(args)
            .map(|ctx| ctx.request_id.clone())
            .ok_or_else(|| "invocation context appears to be missing".to_string())
    }

    /// Deadline of the current invocation in milliseconds since the epoch.
    fn deadline(&self, args: &Probe) -> Result<Option<u64>, String> {
        let ctx = context_for(args).ok_or("invocation context appears to be missing")?;
        Ok(ctx
            .deadline
            .and_then(|d| d.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64))
    }
}

impl Service for Arith {
    const NAME: &'static str = "Arith";

    fn methods(methods: &mut Methods<Self>) {
        methods
            .add("Multiply", Arith::multiply)
            .add("Divide", Arith::divide)
            .add("Error", Arith::error)
            .add("Panic", Arith::panic)
            .add("BadIdea", Arith::bad_idea)
            .add("Deadline", Arith::deadline);
    }
}

pub fn arith_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Arith).unwrap();
    registry
}

pub fn arith_dispatcher() -> Dispatcher {
    Dispatcher::new(arith_registry())
}
