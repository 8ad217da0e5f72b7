//! The event loop: ready-callback queue, readiness poller and task registry.
//!
//! One dispatch cycle polls the readiness primitive, moves the fired handles
//! onto the ready queue, then drains exactly the handles that were queued when
//! the drain started. The snapshot bounds each cycle to one generation of
//! work: a callback that schedules further callbacks cannot monopolize the
//! cycle, which keeps pending I/O from starving.
//!
//! The loop is an explicit context object — construct as many independent
//! loops as needed (one per test, for instance) and pass the handle to
//! whatever creates futures and tasks on it. Clones share the same loop.

use crate::error::Error;
use crate::future::{Future, Value};
use crate::handle::Handle;
use crate::poller::Poller;
use crate::task::{Coroutine, Task};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

pub(crate) struct Shared {
    ready: RefCell<VecDeque<Handle>>,
    poller: RefCell<Poller>,
    tasks: RefCell<Vec<Task>>,
    unfinished: Cell<usize>,
    stopped: Cell<bool>,
}

impl Shared {
    pub(crate) fn push_ready(&self, handle: Handle) {
        self.ready.borrow_mut().push_back(handle);
    }
}

/// A single-threaded cooperative event loop.
///
/// Cheap to clone; all clones drive the same loop. Every future and task is
/// created through one of the loop's factory methods so completion callbacks
/// always schedule through this loop's ready queue.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

impl EventLoop {
    /// Creates a fresh loop with its own readiness poller.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            shared: Rc::new(Shared {
                ready: RefCell::new(VecDeque::new()),
                poller: RefCell::new(Poller::new()?),
                tasks: RefCell::new(Vec::new()),
                unfinished: Cell::new(0),
                stopped: Cell::new(false),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> std::rc::Weak<Shared> {
        Rc::downgrade(&self.shared)
    }

    /// Enqueues `callback` for execution on an upcoming dispatch cycle.
    ///
    /// Handles run in FIFO submission order relative to other `call_soon`
    /// submissions.
    pub fn call_soon(&self, callback: impl FnOnce() + 'static) {
        self.shared.push_ready(Handle::new(callback));
    }

    /// Registers `callback` to run once when `fd` becomes readable.
    ///
    /// A reader interest already pending on `fd` is overwritten.
    pub fn add_reader(&self, fd: RawFd, callback: impl FnOnce() + 'static) -> Result<(), Error> {
        self.shared
            .poller
            .borrow_mut()
            .register_reader(fd, Handle::new(callback))
            .map_err(Error::from)
    }

    /// Registers `callback` to run once when `fd` becomes writable.
    ///
    /// A writer interest already pending on `fd` is overwritten.
    pub fn add_writer(&self, fd: RawFd, callback: impl FnOnce() + 'static) -> Result<(), Error> {
        self.shared
            .poller
            .borrow_mut()
            .register_writer(fd, Handle::new(callback))
            .map_err(Error::from)
    }

    /// Drops all interest on `fd`, both directions.
    ///
    /// The poller treats a descriptor's registration as one atomic entry;
    /// callers needing both directions afterwards must re-register both.
    pub fn remove_reader(&self, fd: RawFd) {
        self.shared.poller.borrow_mut().unregister(fd);
    }

    /// Drops all interest on `fd`, both directions.
    pub fn remove_writer(&self, fd: RawFd) {
        self.shared.poller.borrow_mut().unregister(fd);
    }

    /// Creates a pending future owned by this loop.
    pub fn create_future(&self) -> Future {
        Future::new(self.downgrade())
    }

    /// Wraps `coroutine` in a task and schedules its first step.
    ///
    /// The task never runs synchronously here: the first resumption, like all
    /// later ones, happens inside a dispatch cycle.
    pub fn create_task(&self, coroutine: impl Coroutine + 'static) -> Task {
        self.spawn_boxed(Box::new(coroutine))
    }

    /// Fire-and-forget scheduling of several coroutines as independent tasks.
    pub fn wait(&self, coroutines: impl IntoIterator<Item = Box<dyn Coroutine>>) {
        for coroutine in coroutines {
            self.spawn_boxed(coroutine);
        }
    }

    /// Runs one dispatch cycle: poll readiness, then drain the ready snapshot.
    ///
    /// Polling blocks only when no ready work exists; it is skipped entirely
    /// when no descriptor is registered. An interrupted poll is treated as an
    /// empty one; any other polling failure is logged and returned.
    pub fn run_once(&self) -> Result<(), Error> {
        self.poll_readiness()?;
        self.drain_ready();
        Ok(())
    }

    /// Repeats dispatch cycles until [`stop`](Self::stop) is observed.
    ///
    /// Errors with [`Error::Stalled`] when no callback is ready and no
    /// descriptor is watched, since no work could ever arrive.
    pub fn run_forever(&self) -> Result<(), Error> {
        self.shared.stopped.set(false);

        loop {
            if self.is_idle() {
                return Err(Error::Stalled);
            }

            self.run_once()?;

            if self.shared.stopped.get() {
                return Ok(());
            }
        }
    }

    /// Repeats dispatch cycles until every task created on this loop is done.
    ///
    /// Termination is tracked with a count of unfinished tasks, decremented as
    /// each task completes. Errors with [`Error::Stalled`] if tasks remain but
    /// no work can ever arrive.
    pub fn run_until_complete(&self) -> Result<(), Error> {
        while self.shared.unfinished.get() > 0 {
            if self.is_idle() {
                log::error!(
                    "event loop stalled with {} unfinished task(s)",
                    self.shared.unfinished.get()
                );
                return Err(Error::Stalled);
            }

            self.run_once()?;
        }

        Ok(())
    }

    /// Requests [`run_forever`](Self::run_forever) to exit after the current
    /// cycle.
    pub fn stop(&self) {
        self.shared.stopped.set(true);
    }

    pub(crate) fn task_finished(&self) {
        let unfinished = self.shared.unfinished.get();
        debug_assert!(unfinished > 0, "task finished with no unfinished count");
        self.shared.unfinished.set(unfinished.saturating_sub(1));
    }

    fn spawn_boxed(&self, coroutine: Box<dyn Coroutine>) -> Task {
        let task = Task::new(self.create_future(), coroutine);

        self.shared.tasks.borrow_mut().push(task.clone());
        self.shared.unfinished.set(self.shared.unfinished.get() + 1);
        log::trace!("task created, {} unfinished", self.shared.unfinished.get());

        let step = task.clone();
        self.call_soon(move || step.step(Ok(Value::None)));

        task
    }

    fn is_idle(&self) -> bool {
        self.shared.ready.borrow().is_empty() && self.shared.poller.borrow().is_empty()
    }

    fn poll_readiness(&self) -> Result<(), Error> {
        let block = self.shared.ready.borrow().is_empty();

        let fired = {
            let mut poller = self.shared.poller.borrow_mut();

            if poller.is_empty() {
                return Ok(());
            }

            match poller.select(block) {
                Ok(fired) => fired,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {
                    log::debug!("readiness poll interrupted, continuing");
                    Vec::new()
                }
                Err(error) => {
                    log::error!("readiness poll failed: {error}");
                    return Err(error.into());
                }
            }
        };

        let mut ready = self.shared.ready.borrow_mut();
        for handle in fired {
            ready.push_back(handle);
        }

        Ok(())
    }

    /// Drains exactly the handles present when the drain starts.
    fn drain_ready(&self) {
        let snapshot = self.shared.ready.borrow().len();

        for _ in 0..snapshot {
            let handle = self.shared.ready.borrow_mut().pop_front();
            match handle {
                Some(handle) => handle.run(),
                None => break,
            }
        }
    }
}
