//! Diagnostic output capture
//!
//! Design:
//! 1. Executor creates a pipe BEFORE forking the test process
//! 2. Test process calls dup2(write_end, STDERR) and drops the original fd
//! 3. Runner drains the read end on a reader thread until EOF
//! 4. Output is kept as ordered chunks, since its length is not known up front

use serde::{Serialize, Serializer};
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd};

/// Size of each read from the diagnostic pipe
pub const READ_BLOCK_SIZE: usize = 512;

/// Everything a test wrote to its diagnostic stream, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    chunks: Vec<Vec<u8>>,
}

impl CapturedOutput {
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Total captured bytes
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate all chunks
    pub fn to_bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl Serialize for CapturedOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// Drain `reader` to end-of-stream.
///
/// Every non-empty read becomes one chunk. A zero-length read ends the stream;
/// so does a hard read error, in which case whatever was read so far is kept.
/// Returns `None` when nothing was written at all.
pub fn drain<R: Read>(mut reader: R) -> Option<CapturedOutput> {
    let mut output = CapturedOutput::default();
    let mut block = [0u8; READ_BLOCK_SIZE];

    loop {
        match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => output.chunks.push(block[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "diagnostic stream closed by read error");
                break;
            }
        }
    }

    if output.is_empty() {
        None
    } else {
        Some(output)
    }
}

/// Redirect stderr to the pipe's write end (called in the test process after fork)
pub fn redirect_stderr(write_end: OwnedFd) -> nix::Result<()> {
    nix::unistd::dup2(write_end.as_raw_fd(), libc::STDERR_FILENO)?;
    // fd 2 now holds the only copy this process needs
    drop(write_end);
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
