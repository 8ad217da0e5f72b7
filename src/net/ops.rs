//! Socket operations as suspension points.
//!
//! Each operation attempts the non-blocking call, and on would-block registers
//! a readiness callback with the loop that deregisters, retries and resolves
//! the returned future. The transient would-block condition never reaches the
//! coroutine author; a genuine I/O failure fails the future and propagates
//! through the task chain.

use crate::event_loop::EventLoop;
use crate::future::{Future, Value};
use crate::net::tcp::TcpSocket;

use std::io;
use std::net::SocketAddr;

/// Chunk size used by `sock_recv_all`.
const RECV_CHUNK: usize = 4096;

impl EventLoop {
    /// Connects `socket` to `addr`, suspending until the connection settles.
    ///
    /// Resolves with [`Value::None`]. A connect that completes synchronously
    /// resolves immediately with no suspension; otherwise a writer interest is
    /// registered and the pending socket error decides the outcome once the
    /// descriptor becomes writable.
    pub fn sock_connect(&self, socket: &TcpSocket, addr: SocketAddr) -> Future {
        let future = self.create_future();

        match socket.connect(addr) {
            Ok(()) => future.set_result(Value::None),
            Err(error) if is_in_progress(&error) => {
                let event_loop = self.clone();
                let socket = socket.clone();
                let fd = socket.raw_fd();
                let out = future.clone();

                let registered = self.add_writer(fd, move || {
                    event_loop.remove_writer(fd);
                    match socket.take_error() {
                        Ok(None) => out.set_result(Value::None),
                        Ok(Some(error)) => out.set_error(error.into()),
                        Err(error) => out.set_error(error.into()),
                    }
                });

                if let Err(error) = registered {
                    future.set_error(error);
                }
            }
            Err(error) => future.set_error(error.into()),
        }

        future
    }

    /// Sends `data` on `socket`, suspending until the socket buffer accepts it.
    ///
    /// Resolves with [`Value::Size`] holding the byte count the successful
    /// attempt actually wrote, which may be less than `data.len()`.
    pub fn sock_send(&self, socket: &TcpSocket, data: &[u8]) -> Future {
        let future = self.create_future();

        match socket.send(data) {
            Ok(sent) => future.set_result(Value::Size(sent)),
            Err(error) if is_would_block(&error) => {
                schedule_send(self.clone(), socket.clone(), data.to_vec(), future.clone());
            }
            Err(error) => future.set_error(error.into()),
        }

        future
    }

    /// Receives up to `max_bytes` from `socket`.
    ///
    /// Always suspends until the descriptor reports read readiness, then
    /// resolves with [`Value::Bytes`]; empty bytes signal end of stream.
    pub fn sock_recv(&self, socket: &TcpSocket, max_bytes: usize) -> Future {
        let future = self.create_future();
        schedule_recv(self.clone(), socket.clone(), max_bytes, future.clone());
        future
    }

    /// Receives from `socket` until the peer closes, concatenating all chunks.
    ///
    /// Resolves with [`Value::Bytes`] holding the accumulated data; a peer
    /// that closes without sending yields empty bytes, not an error.
    pub fn sock_recv_all(&self, socket: &TcpSocket) -> Future {
        let future = self.create_future();
        recv_all_step(self.clone(), socket.clone(), Vec::new(), future.clone());
        future
    }
}

fn schedule_send(event_loop: EventLoop, socket: TcpSocket, data: Vec<u8>, out: Future) {
    let fd = socket.raw_fd();
    let lp = event_loop.clone();
    let resolve = out.clone();

    let registered = event_loop.add_writer(fd, move || {
        lp.remove_writer(fd);
        match socket.send(&data) {
            Ok(sent) => resolve.set_result(Value::Size(sent)),
            // Spurious wakeup; wait for the next write-readiness report.
            Err(error) if is_would_block(&error) => schedule_send(lp, socket, data, resolve),
            Err(error) => resolve.set_error(error.into()),
        }
    });

    if let Err(error) = registered {
        out.set_error(error);
    }
}

fn schedule_recv(event_loop: EventLoop, socket: TcpSocket, max_bytes: usize, out: Future) {
    let fd = socket.raw_fd();
    let lp = event_loop.clone();
    let resolve = out.clone();

    let registered = event_loop.add_reader(fd, move || {
        lp.remove_reader(fd);
        let mut buffer = vec![0u8; max_bytes];
        match socket.recv(&mut buffer) {
            Ok(received) => {
                buffer.truncate(received);
                resolve.set_result(Value::Bytes(buffer));
            }
            Err(error) if is_would_block(&error) => schedule_recv(lp, socket, max_bytes, resolve),
            Err(error) => resolve.set_error(error.into()),
        }
    });

    if let Err(error) = registered {
        out.set_error(error);
    }
}

fn recv_all_step(event_loop: EventLoop, socket: TcpSocket, mut accumulated: Vec<u8>, out: Future) {
    let chunk = event_loop.sock_recv(&socket, RECV_CHUNK);

    chunk.add_done_callback(move |future| match future.result() {
        Ok(Value::Bytes(bytes)) if bytes.is_empty() => {
            out.set_result(Value::Bytes(accumulated));
        }
        Ok(Value::Bytes(bytes)) => {
            accumulated.extend_from_slice(&bytes);
            recv_all_step(event_loop, socket, accumulated, out);
        }
        Ok(_) => unreachable!("sock_recv resolves with bytes"),
        Err(error) => out.set_error(error),
    });
}

fn is_would_block(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK)
    )
}

fn is_in_progress(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(libc::EINPROGRESS)) || is_would_block(error)
}
