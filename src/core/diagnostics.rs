//! Out-of-band error reporting
//!
//! Setup failures never reach the `log` call that triggered them. They are
//! handed to an [`ErrorHandler`] instead; the default one writes to stderr.
//! User callbacks run with panic isolation so a misbehaving callback cannot
//! take the publisher task down with it.

use super::error::TransportError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receives errors that cannot be returned to a caller
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Handler that prints errors to stderr
pub fn stderr_error_handler() -> ErrorHandler {
    Arc::new(|err: &TransportError| {
        eprintln!("[AMQP TRANSPORT ERROR] {}", err);
    })
}

/// Print a warning line that is not tied to a specific error value
pub(crate) fn warn(message: &str) {
    eprintln!("[AMQP TRANSPORT WARNING] {}", message);
}

/// Run a user callback, reporting a panic instead of propagating it
///
/// Returns `false` if the callback panicked.
pub(crate) fn run_isolated<F: FnOnce()>(label: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            eprintln!(
                "[AMQP TRANSPORT CRITICAL] {} panicked: {}. Publishing continues.",
                label, panic_msg
            );
            false
        }
    }
}

/// Hand an error to the configured handler
pub(crate) fn report(handler: &ErrorHandler, err: &TransportError) {
    run_isolated("error handler", || handler(err));
}
