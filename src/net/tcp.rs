//! The non-blocking socket collaborator.
//!
//! [`TcpSocket`] is the only thing the event loop requires of a socket: a
//! pollable descriptor plus connect/send/recv variants that fail with a
//! distinguishable would-block condition instead of blocking the thread.

use libc::{
    AF_INET, F_GETFL, F_SETFL, MSG_NOSIGNAL, O_NONBLOCK, SO_ERROR, SOCK_STREAM, SOL_SOCKET, close,
    connect, fcntl, getsockopt, recv, send, sockaddr, sockaddr_in, socket, socklen_t,
};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::rc::Rc;

struct Inner {
    fd: RawFd,
}

impl Drop for Inner {
    fn drop(&mut self) {
        unsafe {
            close(self.fd);
        }
    }
}

/// A non-blocking IPv4 TCP socket.
///
/// Cheap to clone: clones share one descriptor, which is closed when the last
/// clone is dropped. Sharing matters because a readiness callback retries the
/// operation later, after the registering coroutine has already suspended.
///
/// Every method is non-blocking; when the kernel cannot make progress the
/// call fails with a would-block error, which the socket operations on
/// [`EventLoop`](crate::EventLoop) absorb by registering interest and
/// suspending.
#[derive(Clone)]
pub struct TcpSocket {
    inner: Rc<Inner>,
}

impl TcpSocket {
    /// Creates a fresh non-blocking IPv4 stream socket.
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { socket(AF_INET, SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        set_nonblocking(fd)?;

        Ok(Self {
            inner: Rc::new(Inner { fd }),
        })
    }

    /// The pollable descriptor backing this socket.
    pub fn raw_fd(&self) -> RawFd {
        self.inner.fd
    }

    /// Starts a connection attempt to `addr`.
    ///
    /// Returns `EINPROGRESS` as an error when the connect cannot complete
    /// immediately; the caller is expected to wait for write readiness and
    /// then check [`take_error`](Self::take_error).
    pub fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        let SocketAddr::V4(addr) = addr else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "only IPv4 addresses are supported",
            ));
        };

        let raw = sockaddr_in {
            sin_family: AF_INET as u16,
            sin_port: addr.port().to_be(),
            sin_addr: libc::in_addr {
                s_addr: u32::from_ne_bytes(addr.ip().octets()),
            },
            sin_zero: [0; 8],
        };

        let res = unsafe {
            connect(
                self.inner.fd,
                &raw as *const sockaddr_in as *const sockaddr,
                mem::size_of::<sockaddr_in>() as socklen_t,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Sends as many bytes of `data` as the socket buffer accepts.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        let res = unsafe {
            send(
                self.inner.fd,
                data.as_ptr() as *const _,
                data.len(),
                MSG_NOSIGNAL,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Receives up to `buffer.len()` bytes; `Ok(0)` signals end of stream.
    pub fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let res = unsafe {
            recv(
                self.inner.fd,
                buffer.as_mut_ptr() as *mut _,
                buffer.len(),
                0,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    /// Reads and clears the pending socket error (`SO_ERROR`).
    ///
    /// Used to finalize a deferred connect once the descriptor reports write
    /// readiness.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut raw: i32 = 0;
        let mut len = mem::size_of::<i32>() as socklen_t;

        let res = unsafe {
            getsockopt(
                self.inner.fd,
                SOL_SOCKET,
                SO_ERROR,
                &mut raw as *mut i32 as *mut _,
                &mut len,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        if raw == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(raw)))
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let res = unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
