//! Single-threaded cooperative event loop with readiness-based socket I/O.
//!
//! Caller-supplied suspendable computations ([`Coroutine`]s) perform
//! non-blocking socket operations, suspending at each I/O boundary and
//! resuming only when the underlying descriptor becomes ready, all driven by
//! one polling loop on one thread.
//!
//! # Architecture
//!
//! - **EventLoop**: owns the ready-callback queue, the readiness poller and
//!   the task registry; runs the poll/dispatch cycle
//! - **Future**: one-shot deferred result with completion listeners, always
//!   notified through the scheduler
//! - **Task**: a future that owns a coroutine and drives it one suspension
//!   point at a time
//! - **Handle**: a callback bound with its arguments, consumed once
//! - **net**: the non-blocking [`TcpSocket`] collaborator and the socket
//!   operations (`sock_connect`, `sock_send`, `sock_recv`, `sock_recv_all`)
//!   built as suspension points on the loop
//!
//! # Example
//!
//! ```ignore
//! use miniloop::{Coroutine, Error, EventLoop, StepOutcome, Value};
//!
//! struct Greeter;
//!
//! impl Coroutine for Greeter {
//!     fn resume(&mut self, _input: Result<Value, Error>) -> StepOutcome {
//!         StepOutcome::Complete(Value::Bytes(b"hello".to_vec()))
//!     }
//! }
//!
//! let event_loop = EventLoop::new().unwrap();
//! let task = event_loop.create_task(Greeter);
//! event_loop.run_until_complete().unwrap();
//! assert_eq!(task.result(), Ok(Value::Bytes(b"hello".to_vec())));
//! ```

mod error;
mod event_loop;
mod future;
mod handle;
pub mod net;
mod poller;
mod task;

pub use error::Error;
pub use event_loop::EventLoop;
pub use future::{Future, State, Value};
pub use handle::Handle;
pub use net::TcpSocket;
pub use task::{Coroutine, StepOutcome, Task};
