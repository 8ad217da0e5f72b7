//! Thin wrapper over the Linux epoll syscalls.

use super::Interest;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, close, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::mem;
use std::os::unix::io::RawFd;

/// Maximum readiness events collected per wait call.
pub(crate) const EVENT_BATCH: usize = 64;

/// A readiness notification reported by [`Epoll::wait`].
pub(crate) struct ReadyEvent {
    pub(crate) fd: RawFd,
    pub(crate) readiness: Interest,
}

/// An epoll instance holding the kernel-side descriptor registrations.
pub(crate) struct Epoll {
    epoll_fd: RawFd,
}

impl Epoll {
    pub(crate) fn new() -> io::Result<Self> {
        let epoll_fd = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { epoll_fd })
    }

    pub(crate) fn add(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_ADD, fd, Some(interest))
    }

    pub(crate) fn modify(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_MOD, fd, Some(interest))
    }

    pub(crate) fn delete(&self, fd: RawFd) -> io::Result<()> {
        self.control(EPOLL_CTL_DEL, fd, None)
    }

    /// Waits for readiness, blocking indefinitely or returning immediately.
    ///
    /// Interruption by a signal surfaces as `ErrorKind::Interrupted`; the
    /// caller decides whether to treat it as an empty poll.
    pub(crate) fn wait(&self, block: bool, ready: &mut Vec<ReadyEvent>) -> io::Result<()> {
        let mut events: [epoll_event; EVENT_BATCH] = unsafe { mem::zeroed() };
        let timeout_ms = if block { -1 } else { 0 };

        let count = unsafe {
            epoll_wait(
                self.epoll_fd,
                events.as_mut_ptr(),
                events.len() as i32,
                timeout_ms,
            )
        };

        if count < 0 {
            return Err(io::Error::last_os_error());
        }

        for event in events.iter().take(count as usize) {
            ready.push(ReadyEvent {
                fd: event.u64 as RawFd,
                readiness: readiness_from_events(event.events),
            });
        }

        Ok(())
    }

    fn control(&self, op: i32, fd: RawFd, interest: Option<Interest>) -> io::Result<()> {
        let mut event = epoll_event {
            events: interest.map(events_from_interest).unwrap_or(0),
            u64: fd as u64,
        };

        let res = unsafe { epoll_ctl(self.epoll_fd, op, fd, &mut event) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            close(self.epoll_fd);
        }
    }
}

fn events_from_interest(interest: Interest) -> u32 {
    let mut events = 0;

    if interest.contains(Interest::READABLE) {
        events |= EPOLLIN as u32;
    }
    if interest.contains(Interest::WRITABLE) {
        events |= EPOLLOUT as u32;
    }

    events
}

fn readiness_from_events(events: u32) -> Interest {
    let mut readiness = Interest::empty();

    if events & EPOLLIN as u32 != 0 {
        readiness |= Interest::READABLE;
    }
    if events & EPOLLOUT as u32 != 0 {
        readiness |= Interest::WRITABLE;
    }

    // Error and hang-up conditions wake every registered direction so the
    // retrying callback performs the operation and surfaces the real error.
    if events & (EPOLLERR as u32 | EPOLLHUP as u32) != 0 {
        readiness |= Interest::READABLE | Interest::WRITABLE;
    }

    readiness
}
