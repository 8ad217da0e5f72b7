//! Readiness polling over registered descriptors.
//!
//! The [`Poller`] pairs the kernel-side epoll instance with the loop's
//! descriptor interest table: one entry per descriptor, holding at most one
//! pending reader handle and one pending writer handle. Handles are *moved*
//! out when their direction fires (one-shot delivery) and the kernel mask is
//! trimmed to the directions that still hold a handle, so a level-triggered
//! descriptor cannot re-fire a handle that was already consumed.

mod epoll;

use crate::handle::Handle;

use bitflags::bitflags;
use epoll::{Epoll, ReadyEvent};
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;

bitflags! {
    /// Readiness directions a descriptor is registered for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Interest: u8 {
        const READABLE = 0b01;
        const WRITABLE = 0b10;
    }
}

struct FdEntry {
    registered: Interest,
    reader: Option<Handle>,
    writer: Option<Handle>,
}

impl FdEntry {
    fn pending(&self) -> Interest {
        let mut interest = Interest::empty();

        if self.reader.is_some() {
            interest |= Interest::READABLE;
        }
        if self.writer.is_some() {
            interest |= Interest::WRITABLE;
        }

        interest
    }
}

/// The loop's readiness-polling primitive plus its interest table.
pub(crate) struct Poller {
    epoll: Epoll,
    entries: HashMap<RawFd, FdEntry>,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            epoll: Epoll::new()?,
            entries: HashMap::new(),
        })
    }

    /// Whether no descriptor is currently registered.
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers `handle` as the pending reader interest for `fd`.
    ///
    /// An existing reader interest on the same descriptor is overwritten.
    pub(crate) fn register_reader(&mut self, fd: RawFd, handle: Handle) -> io::Result<()> {
        self.register(fd, handle, Interest::READABLE)
    }

    /// Registers `handle` as the pending writer interest for `fd`.
    ///
    /// An existing writer interest on the same descriptor is overwritten.
    pub(crate) fn register_writer(&mut self, fd: RawFd, handle: Handle) -> io::Result<()> {
        self.register(fd, handle, Interest::WRITABLE)
    }

    /// Removes the descriptor's whole entry, both directions.
    ///
    /// No-op if the descriptor is not registered.
    pub(crate) fn unregister(&mut self, fd: RawFd) {
        if self.entries.remove(&fd).is_some() {
            log::trace!("poller: unregister fd {fd}");
            if let Err(error) = self.epoll.delete(fd) {
                // The descriptor may already be closed; nothing to recover.
                log::debug!("poller: delete of fd {fd} failed: {error}");
            }
        }
    }

    /// Polls for readiness and moves the fired handles out of the table.
    ///
    /// Blocks indefinitely when `block` is set, otherwise returns whatever is
    /// ready right now. Handles are returned in poller report order, reader
    /// before writer for a descriptor ready in both directions.
    pub(crate) fn select(&mut self, block: bool) -> io::Result<Vec<Handle>> {
        let mut events: Vec<ReadyEvent> = Vec::new();
        self.epoll.wait(block, &mut events)?;

        let mut fired = Vec::new();

        for event in events {
            let Some(entry) = self.entries.get_mut(&event.fd) else {
                continue;
            };

            if event.readiness.contains(Interest::READABLE)
                && let Some(reader) = entry.reader.take()
            {
                fired.push(reader);
            }
            if event.readiness.contains(Interest::WRITABLE)
                && let Some(writer) = entry.writer.take()
            {
                fired.push(writer);
            }

            self.trim(event.fd);
        }

        Ok(fired)
    }

    fn register(&mut self, fd: RawFd, handle: Handle, direction: Interest) -> io::Result<()> {
        log::trace!("poller: register fd {fd} for {direction:?}");

        let entry = self.entries.entry(fd).or_insert(FdEntry {
            registered: Interest::empty(),
            reader: None,
            writer: None,
        });

        if direction.contains(Interest::READABLE) {
            entry.reader = Some(handle);
        } else {
            entry.writer = Some(handle);
        }

        let wanted = entry.pending();
        let result = if entry.registered.is_empty() {
            self.epoll.add(fd, wanted)
        } else if entry.registered != wanted {
            self.epoll.modify(fd, wanted)
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                self.entries.get_mut(&fd).expect("entry just inserted").registered = wanted;
                Ok(())
            }
            Err(error) => {
                self.entries.remove(&fd);
                Err(error)
            }
        }
    }

    /// Shrinks or drops the kernel registration after handles were consumed.
    fn trim(&mut self, fd: RawFd) {
        let Some(entry) = self.entries.get_mut(&fd) else {
            return;
        };

        let wanted = entry.pending();
        if wanted == entry.registered {
            return;
        }

        if wanted.is_empty() {
            self.entries.remove(&fd);
            if let Err(error) = self.epoll.delete(fd) {
                log::debug!("poller: delete of fd {fd} failed: {error}");
            }
        } else {
            match self.epoll.modify(fd, wanted) {
                Ok(()) => entry.registered = wanted,
                Err(error) => {
                    log::debug!("poller: modify of fd {fd} failed: {error}");
                    self.entries.remove(&fd);
                }
            }
        }
    }
}
