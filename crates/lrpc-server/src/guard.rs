//! Panic isolation around method execution.
//!
//! [`guarded`] runs a closure and turns an unwinding panic into a [`Fault`]
//! carrying the panic message and the backtrace captured at the panic site.
//! Panics raised outside a guarded region still reach the previously
//! installed hook.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

static INSTALL: Once = Once::new();

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static CAPTURED: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A recovered panic.
#[derive(Debug, Clone)]
pub struct Fault {
    pub message: String,
    pub backtrace: String,
}

impl Fault {
    /// Message reported to the caller, `panic: <payload>`.
    pub fn reply_message(&self) -> String {
        format!("panic: {}", self.message)
    }
}

fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARDED.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                CAPTURED.with(|c| *c.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `f`, converting a panic into a [`Fault`].
pub fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    install_hook();

    let outer = GUARDED.with(|g| g.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|g| g.set(outer));

    result.map_err(|payload| Fault {
        message: payload_message(payload.as_ref()),
        backtrace: CAPTURED
            .with(|c| c.borrow_mut().take())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_value_through() {
        assert_eq!(guarded(|| 6 * 7).unwrap(), 42);
    }

    #[test]
    fn test_str_panic() {
        let fault = guarded(|| -> () { panic!("boom") }).unwrap_err();
        assert_eq!(fault.message, "boom");
        assert_eq!(fault.reply_message(), "panic: boom");
    }

    #[test]
    fn test_formatted_panic() {
        let divisor = 0;
        let fault = guarded(|| -> () { panic!("bad divisor {}", divisor) }).unwrap_err();
        assert_eq!(fault.message, "bad divisor 0");
    }

    #[test]
    fn test_non_string_payload() {
        let fault = guarded(|| -> () { std::panic::panic_any(17u8) }).unwrap_err();
        assert_eq!(fault.message, "unknown panic");
    }

    #[test]
    fn test_nested_guard_restores_state() {
        let outer = guarded(|| {
            let inner = guarded(|| -> () { panic!("inner") });
            assert!(inner.is_err());
            GUARDED.with(Cell::get)
        });
        assert!(outer.unwrap());
        assert!(!GUARDED.with(Cell::get));
    }
}
