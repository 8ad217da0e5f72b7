//! The suspendable-computation driver.
//!
//! A [`Task`] wraps a [`Coroutine`] and is itself a deferred result: it pumps
//! the coroutine one suspension point at a time, feeding it the outcome of
//! whatever future it last suspended on, until the coroutine completes or
//! fails. Only the loop's dispatch cycle ever drives a coroutine — the first
//! step is enqueued at creation, never run synchronously — so a coroutine body
//! runs uninterrupted between suspension points.
//!
//! # Writing a coroutine
//!
//! A coroutine is an explicit state machine with a single [`resume`] method:
//!
//! ```ignore
//! use miniloop::{Coroutine, Error, StepOutcome, Value};
//!
//! struct CountDown(u32);
//!
//! impl Coroutine for CountDown {
//!     fn resume(&mut self, _input: Result<Value, Error>) -> StepOutcome {
//!         if self.0 == 0 {
//!             StepOutcome::Complete(Value::None)
//!         } else {
//!             self.0 -= 1;
//!             StepOutcome::Yield
//!         }
//!     }
//! }
//! ```
//!
//! [`resume`]: Coroutine::resume

use crate::error::Error;
use crate::future::{Future, State, Value};

use std::cell::RefCell;
use std::rc::Rc;

/// What a coroutine does with its turn.
pub enum StepOutcome {
    /// Wait for the given future; the coroutine is resumed with its outcome.
    Suspend(Future),
    /// Bare suspension with no I/O wait; the driver reschedules the next
    /// step for the following dispatch cycle.
    Yield,
    /// Normal completion with a final value.
    Complete(Value),
    /// Failure; the owning task resolves as failed with this error.
    Fail(Error),
}

/// A suspendable computation driven by a [`Task`].
///
/// `resume` advances the computation by exactly one suspension point. The
/// first call receives `Ok(Value::None)`; later calls receive the outcome of
/// the future the coroutine suspended on. An `Err` input re-injects a failure
/// from the awaited future: the coroutine may recover from it or return
/// [`StepOutcome::Fail`] to propagate it.
pub trait Coroutine {
    /// Advances to the next suspension point.
    fn resume(&mut self, input: Result<Value, Error>) -> StepOutcome;
}

struct DriverState {
    coroutine: Option<Box<dyn Coroutine>>,
    waiting_on: Option<Future>,
}

/// A future that owns and drives a coroutine to completion.
///
/// Created via [`EventLoop::create_task`](crate::EventLoop::create_task),
/// which schedules the task's first step. Cheap to clone; a task can itself be
/// suspended on (see [`Task::future`]), which is how one coroutine awaits
/// another.
#[derive(Clone)]
pub struct Task {
    future: Future,
    driver: Rc<RefCell<DriverState>>,
}

impl Task {
    pub(crate) fn new(future: Future, coroutine: Box<dyn Coroutine>) -> Self {
        Self {
            future,
            driver: Rc::new(RefCell::new(DriverState {
                coroutine: Some(coroutine),
                waiting_on: None,
            })),
        }
    }

    /// The task's own deferred result, suitable for suspending on.
    pub fn future(&self) -> Future {
        self.future.clone()
    }

    /// The final outcome of the driven coroutine.
    ///
    /// # Panics
    /// Panics if the task has not completed yet.
    pub fn result(&self) -> Result<Value, Error> {
        self.future.result()
    }

    /// Current completion state of the task.
    pub fn state(&self) -> State {
        self.future.state()
    }

    /// Whether the coroutine has run to completion or failed.
    pub fn is_done(&self) -> bool {
        self.future.is_done()
    }

    /// Advances the coroutine by exactly one suspension point.
    ///
    /// Invoked only from handles on the loop's ready queue.
    pub(crate) fn step(&self, input: Result<Value, Error>) {
        let mut coroutine = {
            let mut driver = self.driver.borrow_mut();
            driver.waiting_on = None;
            driver
                .coroutine
                .take()
                .expect("task stepped after completion")
        };

        // The coroutine runs outside the borrow so it may freely create
        // futures, schedule callbacks or spawn further tasks.
        match coroutine.resume(input) {
            StepOutcome::Complete(value) => {
                log::trace!("task finished");
                self.future.set_result(value);
                self.notify_finished();
            }
            StepOutcome::Fail(error) => {
                log::debug!("task failed: {error}");
                self.future.set_error(error);
                self.notify_finished();
            }
            StepOutcome::Suspend(awaited) => {
                {
                    let mut driver = self.driver.borrow_mut();
                    driver.coroutine = Some(coroutine);
                    driver.waiting_on = Some(awaited.clone());
                }
                // The clone captured here is consumed when the awaited future
                // completes, which breaks the task <-> future cycle.
                let task = self.clone();
                awaited.add_done_callback(move |future| task.wakeup(future));
            }
            StepOutcome::Yield => {
                self.driver.borrow_mut().coroutine = Some(coroutine);
                if let Some(event_loop) = self.future.event_loop() {
                    let task = self.clone();
                    event_loop.call_soon(move || task.step(Ok(Value::None)));
                } else {
                    log::warn!("task suspended on a dead event loop");
                }
            }
        }
    }

    /// Resumes the coroutine with the outcome of the future it suspended on.
    fn wakeup(&self, awaited: Future) {
        self.step(awaited.result());
    }

    fn notify_finished(&self) {
        if let Some(event_loop) = self.future.event_loop() {
            event_loop.task_finished();
        }
    }
}
