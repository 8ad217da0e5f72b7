//! One-shot deferred results with completion listeners.
//!
//! A [`Future`] is the suspension currency of the runtime: socket operations
//! hand one to the caller's coroutine, the task driver registers its wakeup as
//! a completion listener on it, and the readiness callback eventually resolves
//! it. Completion listeners never run inline; they are always scheduled
//! through the owning loop's ready queue so ordering stays FIFO-with-scheduler
//! regardless of when a listener was registered.

use crate::error::Error;
use crate::event_loop::{EventLoop, Shared};
use crate::handle::Handle;

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

/// The result value a future carries once resolved.
///
/// The runtime produces a closed set of shapes: `None` for connect, `Size`
/// for send byte counts, `Bytes` for received data and caller payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// No meaningful value (connect completion, bare signals).
    None,
    /// A byte count (send completion).
    Size(usize),
    /// A byte sequence (recv / recv_all results, caller payloads).
    Bytes(Vec<u8>),
}

/// Completion state of a [`Future`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not yet resolved; listeners queue until completion.
    Pending,
    /// Resolved with a value.
    Finished,
    /// Resolved with an error.
    Failed,
}

type DoneCallback = Box<dyn FnOnce(Future)>;

struct Inner {
    event_loop: Weak<Shared>,
    outcome: Option<Result<Value, Error>>,
    callbacks: Vec<DoneCallback>,
}

/// A one-shot deferred result with an ordered list of completion listeners.
///
/// Cheap to clone; all clones observe the same result slot. Created through
/// [`EventLoop::create_future`](crate::EventLoop::create_future) so the future
/// knows which loop schedules its listeners. The future holds the loop weakly,
/// never the reverse, so no reference cycle runs through the loop itself.
#[derive(Clone)]
pub struct Future {
    inner: Rc<RefCell<Inner>>,
}

impl Future {
    pub(crate) fn new(event_loop: Weak<Shared>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                event_loop,
                outcome: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Registers `callback` to run once this future completes.
    ///
    /// While pending, the callback is appended to the listener list and will
    /// be scheduled (in registration order) when the future resolves. If the
    /// future is already complete, the callback is scheduled for the next
    /// dispatch cycle instead of being invoked synchronously.
    pub fn add_done_callback(&self, callback: impl FnOnce(Future) + 'static) {
        let mut inner = self.inner.borrow_mut();

        if inner.outcome.is_none() {
            inner.callbacks.push(Box::new(callback));
            return;
        }

        let event_loop = inner.event_loop.clone();
        drop(inner);

        let future = self.clone();
        schedule(&event_loop, Handle::new(move || callback(future)));
    }

    /// Resolves the future with `value` and schedules every listener.
    ///
    /// # Panics
    /// Panics if the future was already completed; double completion is a
    /// programming error, not a recoverable condition.
    pub fn set_result(&self, value: Value) {
        self.complete(Ok(value));
    }

    /// Fails the future with `error` and schedules every listener.
    ///
    /// # Panics
    /// Panics if the future was already completed.
    pub fn set_error(&self, error: Error) {
        self.complete(Err(error));
    }

    /// Returns the stored outcome.
    ///
    /// # Panics
    /// Panics if the future is still pending. Callers must only read the
    /// result after completion, e.g. from a done callback.
    pub fn result(&self) -> Result<Value, Error> {
        self.inner
            .borrow()
            .outcome
            .clone()
            .expect("result() called on a pending future")
    }

    /// Returns the current completion state.
    pub fn state(&self) -> State {
        match self.inner.borrow().outcome {
            None => State::Pending,
            Some(Ok(_)) => State::Finished,
            Some(Err(_)) => State::Failed,
        }
    }

    /// Whether the future has resolved, successfully or not.
    pub fn is_done(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// The loop this future schedules its listeners on, if still alive.
    pub(crate) fn event_loop(&self) -> Option<EventLoop> {
        self.inner
            .borrow()
            .event_loop
            .upgrade()
            .map(EventLoop::from_shared)
    }

    fn complete(&self, outcome: Result<Value, Error>) {
        let mut inner = self.inner.borrow_mut();

        assert!(
            inner.outcome.is_none(),
            "future completed twice: set_result/set_error called on a resolved future"
        );
        inner.outcome = Some(outcome);

        // Drained before scheduling, so listeners registered while the
        // notification batch runs do not join this batch.
        let callbacks = mem::take(&mut inner.callbacks);
        let event_loop = inner.event_loop.clone();
        drop(inner);

        for callback in callbacks {
            let future = self.clone();
            schedule(&event_loop, Handle::new(move || callback(future)));
        }
    }
}

fn schedule(event_loop: &Weak<Shared>, handle: Handle) {
    match event_loop.upgrade() {
        Some(shared) => shared.push_ready(handle),
        None => log::warn!("completion listener dropped: event loop is gone"),
    }
}
