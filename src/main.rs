//! Sample suites: one passing, failing, and crashing test in `suite1`,
//! captured stderr in `suite2`. Run with `cargo run -- --help` for options.

use forktest::registry::{Registry, Suite};
use forktest::{check_eq, check_some};
use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, Ordering};

/// Set by `suite1`'s setup; each test sees a fresh copy in its own process
static WILL_BE_FIVE: AtomicI32 = AtomicI32::new(0);

fn suite1() -> Result<Suite, forktest::error::RegistryError> {
    Suite::builder("suite1")
        .setup(|| {
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 0);
            WILL_BE_FIVE.store(5, Ordering::SeqCst);
        })
        .teardown(|| WILL_BE_FIVE.store(0, Ordering::SeqCst))
        .test("suite1_test1", || {
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 5);
        })
        .test("suite1_test2", || {
            // Will fail
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 3);
        })
        .test("suite1_test3", || {
            // Seg fault
            let variable = 8usize as *mut u8;
            unsafe { std::ptr::write_volatile(variable, b'c') };
        })
        .build()
}

fn suite2() -> Result<Suite, forktest::error::RegistryError> {
    Suite::builder("suite2")
        .test("suite2_test1", || {
            let mut s = Vec::with_capacity(5);
            s.resize(5, 0u8);
            s[4] = b'a';
            check_some!(s.get(4));
            check_eq!(b'a', s[4]);
        })
        .test("suite2_test2", || {
            eprintln!("Output this in summary");
        })
        .build()
}

fn main() -> ExitCode {
    let mut registry = Registry::new();
    for suite in [suite1(), suite2()] {
        if let Err(e) = suite.and_then(|s| registry.register(s)) {
            eprintln!("[forktest] Registration error: {}", e);
            return ExitCode::from(2);
        }
    }
    forktest::app::main(registry)
}
