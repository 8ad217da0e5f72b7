//! Non-blocking TCP networking.
//!
//! - [`tcp`]: the [`TcpSocket`] collaborator — a non-blocking IPv4 socket over
//!   raw `libc` calls, exposing the would-block semantics the event loop's
//!   socket operations are built on
//! - [`ops`]: the socket operations themselves (`sock_connect`, `sock_send`,
//!   `sock_recv`, `sock_recv_all`), implemented as suspension points on
//!   [`EventLoop`](crate::EventLoop)
//!
//! [`TcpSocket`]: tcp::TcpSocket

pub(crate) mod ops;
pub mod tcp;

pub use tcp::TcpSocket;
