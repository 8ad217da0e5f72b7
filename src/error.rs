//! Crate-level error type.
//!
//! Transient `WouldBlock` conditions never surface here: the socket operation
//! layer absorbs them by registering interest and suspending. What remains is
//! genuine I/O failure (carried through the future/task chain to whoever
//! awaits it) and loop-level faults.

use std::io;

use thiserror::Error;

/// Failure carried by a failed future or returned by the event loop.
///
/// The I/O variant stores the kind and rendered message rather than the
/// original [`io::Error`] so it stays cloneable: a single failure may fan out
/// to several completion listeners.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An I/O operation failed with something other than would-block.
    #[error("{kind}: {message}")]
    Io {
        /// The [`io::ErrorKind`] of the underlying failure.
        kind: io::ErrorKind,
        /// The rendered OS error message.
        message: String,
    },

    /// The loop has pending tasks but no ready callbacks and no watched
    /// descriptors, so no progress can ever be made.
    #[error("event loop stalled: pending tasks with no ready callbacks or watched descriptors")]
    Stalled,
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
