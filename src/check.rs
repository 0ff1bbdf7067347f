//! Assertions for test bodies
//!
//! A failed check writes `'<expr>' FAILED <file>:<line>` to stderr (the
//! diagnostic stream captured by the runner) and terminates the test's process
//! with status 1. The runner reports that as an exit-status failure.

use nix::errno::Errno;
use std::os::fd::BorrowedFd;

/// Exit status used by every failed check
pub const CHECK_FAILED_STATUS: i32 = 1;

/// Write `bytes` straight to fd 2.
///
/// Never takes the lock behind `std::io::stderr()`: a forked test process
/// may have inherited that lock held by a runner thread that does not exist
/// on its side of the fork.
pub fn write_stderr(bytes: &[u8]) {
    let fd = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
    let mut rest = bytes;
    while !rest.is_empty() {
        match nix::unistd::write(fd, rest) {
            Ok(0) => break,
            Ok(n) => rest = &rest[n..],
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }
    }
}

/// Terminate the current (isolated) process immediately with `code`.
///
/// Calls `_exit`, so no at-exit handlers or stdio locks inherited from the
/// runner are touched in the child. Stderr is unbuffered; nothing is lost.
pub fn exit(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Report a failed check and terminate. Called by the `check*!` macros.
#[doc(hidden)]
pub fn fail(expr: &str, file: &str, line: u32) -> ! {
    write_stderr(format!("'{}' FAILED {}:{}\n", expr, file, line).as_bytes());
    exit(CHECK_FAILED_STATUS)
}

/// Panic messages in a test process go to fd 2 through [`write_stderr`]
pub(crate) fn install_child_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        write_stderr(format!("{}\n", info).as_bytes());
    }));
}

#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !($cond) {
            $crate::check::fail(stringify!($cond), file!(), line!());
        }
    };
}

#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr) => {
        if !($left == $right) {
            $crate::check::fail(
                concat!(stringify!($left), " == ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_ne {
    ($left:expr, $right:expr) => {
        if !($left != $right) {
            $crate::check::fail(
                concat!(stringify!($left), " != ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_lt {
    ($left:expr, $right:expr) => {
        if !($left < $right) {
            $crate::check::fail(
                concat!(stringify!($left), " < ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_le {
    ($left:expr, $right:expr) => {
        if !($left <= $right) {
            $crate::check::fail(
                concat!(stringify!($left), " <= ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_gt {
    ($left:expr, $right:expr) => {
        if !($left > $right) {
            $crate::check::fail(
                concat!(stringify!($left), " > ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_ge {
    ($left:expr, $right:expr) => {
        if !($left >= $right) {
            $crate::check::fail(
                concat!(stringify!($left), " >= ", stringify!($right)),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_some {
    ($opt:expr) => {
        if ($opt).is_none() {
            $crate::check::fail(
                concat!(stringify!($opt), " is Some"),
                file!(),
                line!(),
            );
        }
    };
}

#[macro_export]
macro_rules! check_none {
    ($opt:expr) => {
        if ($opt).is_some() {
            $crate::check::fail(
                concat!(stringify!($opt), " is None"),
                file!(),
                line!(),
            );
        }
    };
}

#[cfg(test)]
mod tests {
    // Passing checks must fall through without touching the process
    #[test]
    fn test_passing_checks_do_not_exit() {
        let v: Option<u8> = Some(1);
        let none: Option<u8> = None;
        crate::check!(1 + 1 == 2);
        crate::check_eq!(2, 2);
        crate::check_ne!(2, 3);
        crate::check_lt!(1, 2);
        crate::check_le!(2, 2);
        crate::check_gt!(3, 2);
        crate::check_ge!(3, 3);
        crate::check_some!(v);
        crate::check_none!(none);
    }

    #[test]
    fn test_empty_write_is_noop() {
        super::write_stderr(b"");
    }
}
