//! Deferred callback invocations.
//!
//! A [`Handle`] pairs a callback with its arguments (bound by closure capture)
//! so the event loop can decide *when* to run it independently of *what* it
//! runs. Handles sit in the loop's ready queue or in the poller's interest
//! table and are consumed exactly once.

/// A callback bound with its arguments, awaiting execution by the event loop.
///
/// Created by [`EventLoop::call_soon`](crate::EventLoop::call_soon) and the
/// reader/writer registration methods. Running a handle consumes it.
pub struct Handle {
    callback: Box<dyn FnOnce()>,
}

impl Handle {
    /// Wraps a callback for deferred execution.
    ///
    /// Arguments are captured by the closure, so a handle carries everything
    /// its callback needs.
    pub fn new(callback: impl FnOnce() + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Invokes the callback, consuming the handle.
    pub(crate) fn run(self) {
        (self.callback)();
    }
}
