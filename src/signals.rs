//! Signal Handling for Graceful Shutdown
//!
//! SIGINT/SIGTERM/SIGQUIT set a shutdown flag. The executor polls the flag
//! while it waits on a test process, kills that process, and aborts the run.
//!
//! ## Architecture
//!
//! Signal thread is spawned as a daemon - it dies with the main thread.
//! Test processes inherit the runner's handlers across fork, so the child
//! restores the defaults before any test code runs.

use nix::sys::signal::{signal, SigHandler, Signal};
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::thread;

/// Global flag to signal shutdown was requested
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

static INSTALL: Once = Once::new();

/// Install signal handlers for graceful shutdown (idempotent)
pub fn install_signal_handlers() -> std::io::Result<()> {
    let mut result = Ok(());
    INSTALL.call_once(|| {
        let mut signals = match Signals::new([SIGINT, SIGTERM, SIGQUIT]) {
            Ok(s) => s,
            Err(e) => {
                result = Err(e);
                return;
            }
        };

        thread::spawn(move || {
            for sig in signals.forever() {
                eprintln!("\n[forktest] Received signal {}, shutting down...", sig);
                SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
            }
        });
    });
    result
}

/// Check if shutdown was requested (polled while waiting on a test)
#[inline]
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Restore default dispositions in a freshly forked test process.
///
/// SIGPIPE is included: the Rust runtime ignores it in the runner, but test
/// code should see the default behaviour.
pub fn reset_in_child() {
    for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT, Signal::SIGPIPE] {
        // Best effort: a failure leaves the inherited disposition in place
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
