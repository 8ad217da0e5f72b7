use miniloop::{Coroutine, Error, EventLoop, State, StepOutcome, Value};

use std::cell::Cell;
use std::io;
use std::rc::Rc;

/// Suspends on `suspensions` already-completed futures, counting resumptions,
/// then completes with the number of suspensions it performed.
struct YieldsFutures {
    event_loop: EventLoop,
    suspensions: usize,
    taken: usize,
    resumed: Rc<Cell<usize>>,
}

impl Coroutine for YieldsFutures {
    fn resume(&mut self, input: Result<Value, Error>) -> StepOutcome {
        input.expect("no failure expected");
        self.resumed.set(self.resumed.get() + 1);

        if self.taken == self.suspensions {
            return StepOutcome::Complete(Value::Size(self.taken));
        }

        self.taken += 1;
        let future = self.event_loop.create_future();
        future.set_result(Value::None);
        StepOutcome::Suspend(future)
    }
}

#[test]
fn task_finishes_after_each_suspension_is_resumed() {
    let event_loop = EventLoop::new().unwrap();
    let resumed = Rc::new(Cell::new(0));

    let task = event_loop.create_task(YieldsFutures {
        event_loop: event_loop.clone(),
        suspensions: 3,
        taken: 0,
        resumed: resumed.clone(),
    });

    assert!(!task.is_done());
    event_loop.run_until_complete().unwrap();

    // Initial step plus one resumption per suspension.
    assert_eq!(resumed.get(), 4);
    assert_eq!(task.result(), Ok(Value::Size(3)));
    assert_eq!(task.state(), State::Finished);
}

/// Performs `remaining` bare suspensions (no future) before completing.
struct BareYields {
    remaining: usize,
}

impl Coroutine for BareYields {
    fn resume(&mut self, _input: Result<Value, Error>) -> StepOutcome {
        if self.remaining == 0 {
            return StepOutcome::Complete(Value::None);
        }

        self.remaining -= 1;
        StepOutcome::Yield
    }
}

#[test]
fn bare_yield_reschedules_an_immediate_next_step() {
    let event_loop = EventLoop::new().unwrap();
    let task = event_loop.create_task(BareYields { remaining: 2 });

    event_loop.run_once().unwrap();
    assert!(!task.is_done());

    event_loop.run_once().unwrap();
    assert!(!task.is_done());

    event_loop.run_once().unwrap();
    assert!(task.is_done());
    assert_eq!(task.result(), Ok(Value::None));
}

/// Suspends on a future that fails, and propagates the failure.
struct Propagates {
    event_loop: EventLoop,
    suspended: bool,
}

impl Coroutine for Propagates {
    fn resume(&mut self, input: Result<Value, Error>) -> StepOutcome {
        if let Err(error) = input {
            return StepOutcome::Fail(error);
        }

        if self.suspended {
            return StepOutcome::Complete(Value::None);
        }

        self.suspended = true;
        let future = self.event_loop.create_future();
        future.set_error(Error::from(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "peer reset",
        )));
        StepOutcome::Suspend(future)
    }
}

#[test]
fn failed_future_fails_the_task_when_unhandled() {
    let event_loop = EventLoop::new().unwrap();
    let task = event_loop.create_task(Propagates {
        event_loop: event_loop.clone(),
        suspended: false,
    });

    event_loop.run_until_complete().unwrap();

    assert_eq!(task.state(), State::Failed);
    match task.result() {
        Err(Error::Io { kind, .. }) => assert_eq!(kind, io::ErrorKind::ConnectionReset),
        other => panic!("expected an I/O failure, got {other:?}"),
    }
}

/// Suspends on a failing future but recovers with a fallback value.
struct Recovers {
    event_loop: EventLoop,
    suspended: bool,
}

impl Coroutine for Recovers {
    fn resume(&mut self, input: Result<Value, Error>) -> StepOutcome {
        if input.is_err() {
            return StepOutcome::Complete(Value::Bytes(b"fallback".to_vec()));
        }

        if self.suspended {
            return StepOutcome::Complete(Value::None);
        }

        self.suspended = true;
        let future = self.event_loop.create_future();
        future.set_error(Error::from(io::Error::new(
            io::ErrorKind::TimedOut,
            "gone",
        )));
        StepOutcome::Suspend(future)
    }
}

#[test]
fn coroutine_may_recover_from_an_injected_failure() {
    let event_loop = EventLoop::new().unwrap();
    let task = event_loop.create_task(Recovers {
        event_loop: event_loop.clone(),
        suspended: false,
    });

    event_loop.run_until_complete().unwrap();

    assert_eq!(task.state(), State::Finished);
    assert_eq!(task.result(), Ok(Value::Bytes(b"fallback".to_vec())));
}

/// Awaits a task spawned on the same loop by suspending on its future.
struct AwaitsInner {
    event_loop: EventLoop,
    spawned: bool,
}

impl Coroutine for AwaitsInner {
    fn resume(&mut self, input: Result<Value, Error>) -> StepOutcome {
        if self.spawned {
            return StepOutcome::Complete(input.expect("inner task succeeded"));
        }

        self.spawned = true;
        let inner = self.event_loop.create_task(BareYieldsThenBytes {
            yielded: false,
        });
        StepOutcome::Suspend(inner.future())
    }
}

struct BareYieldsThenBytes {
    yielded: bool,
}

impl Coroutine for BareYieldsThenBytes {
    fn resume(&mut self, _input: Result<Value, Error>) -> StepOutcome {
        if self.yielded {
            StepOutcome::Complete(Value::Bytes(b"inner".to_vec()))
        } else {
            self.yielded = true;
            StepOutcome::Yield
        }
    }
}

#[test]
fn a_task_can_await_another_task() {
    let event_loop = EventLoop::new().unwrap();
    let outer = event_loop.create_task(AwaitsInner {
        event_loop: event_loop.clone(),
        spawned: false,
    });

    event_loop.run_until_complete().unwrap();

    assert_eq!(outer.result(), Ok(Value::Bytes(b"inner".to_vec())));
}

#[test]
fn run_until_complete_waits_for_every_task() {
    let event_loop = EventLoop::new().unwrap();

    let slow = event_loop.create_task(BareYields { remaining: 5 });
    let fast = event_loop.create_task(BareYields { remaining: 0 });

    event_loop.run_until_complete().unwrap();

    assert!(slow.is_done());
    assert!(fast.is_done());
}

/// Suspends on a future nobody ever resolves.
struct WaitsForever {
    event_loop: EventLoop,
    suspended: bool,
}

impl Coroutine for WaitsForever {
    fn resume(&mut self, _input: Result<Value, Error>) -> StepOutcome {
        if self.suspended {
            return StepOutcome::Complete(Value::None);
        }

        self.suspended = true;
        StepOutcome::Suspend(self.event_loop.create_future())
    }
}

#[test]
fn deadlocked_loop_reports_stalled_instead_of_spinning() {
    let event_loop = EventLoop::new().unwrap();
    let task = event_loop.create_task(WaitsForever {
        event_loop: event_loop.clone(),
        suspended: false,
    });

    assert_eq!(event_loop.run_until_complete(), Err(Error::Stalled));
    assert!(!task.is_done());
}

#[test]
fn run_forever_exits_once_stop_is_observed() {
    let event_loop = EventLoop::new().unwrap();

    let stopper = event_loop.clone();
    event_loop.call_soon(move || stopper.stop());

    event_loop.run_forever().unwrap();
}

#[test]
fn run_forever_on_an_empty_loop_reports_stalled() {
    let event_loop = EventLoop::new().unwrap();

    assert_eq!(event_loop.run_forever(), Err(Error::Stalled));
}
