//! Minimal single-threaded host loop built on `zmq_poll`.
//!
//! Hosts that already own an event loop implement [`Reactor`] for it and
//! never touch this type. Everyone else can drive connections with
//! [`PollReactor::turn`] or [`PollReactor::run_until`].

use std::cell::{Cell, RefCell};
use std::io;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use subdrain_core::bridge::{Reactor, ReadyHandler, Token};
use subdrain_core::transport::RawFd;
use tracing::{debug, trace};

struct Entry {
    fd: RawFd,
    // `None` while the handler is running.
    handler: Option<ReadyHandler>,
}

/// Readiness loop over the descriptors registered with it.
///
/// Handlers run on the thread calling [`turn`](Self::turn). A handler may
/// register or deregister anything, itself included.
#[derive(Default)]
pub struct PollReactor {
    next_token: Cell<u64>,
    entries: RefCell<HashMap<Token, Entry>>,
}

impl PollReactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Wait up to `timeout` (forever with `None`) for any registered
    /// descriptor to become readable, then run the handlers of the ready ones.
    ///
    /// Returns the number of handlers that ran. An interrupted wait counts as
    /// a turn in which nothing was ready.
    ///
    /// # Errors
    ///
    /// Returns the `zmq_poll` failure for anything other than an interrupt.
    pub fn turn(&self, timeout: Option<Duration>) -> io::Result<usize> {
        let watched: Vec<(Token, RawFd)> = self
            .entries
            .borrow()
            .iter()
            .map(|(token, entry)| (*token, entry.fd))
            .collect();

        if watched.is_empty() {
            if let Some(timeout) = timeout {
                std::thread::sleep(timeout);
            }
            return Ok(0);
        }

        let mut items: Vec<zmq::PollItem<'static>> = watched
            .iter()
            .map(|(_, fd)| zmq::PollItem::from_fd(*fd, zmq::POLLIN))
            .collect();

        let timeout_ms = timeout.map_or(-1, |t| i64::try_from(t.as_millis()).unwrap_or(i64::MAX));
        match zmq::poll(&mut items, timeout_ms) {
            Ok(0) => return Ok(0),
            Ok(_) => {}
            Err(zmq::Error::EINTR) => {
                trace!("[SUB] Poll interrupted");
                return Ok(0);
            }
            Err(e) => return Err(io::Error::other(e)),
        }

        let mut ran = 0;
        for ((token, _), item) in watched.iter().zip(&items) {
            if item.is_readable() && self.dispatch(*token) {
                ran += 1;
            }
        }
        Ok(ran)
    }

    /// Turn until `done` returns true or `limit` elapses.
    ///
    /// Returns whether `done` was satisfied.
    ///
    /// # Errors
    ///
    /// Propagates the first failed [`turn`](Self::turn).
    pub fn run_until(&self, limit: Duration, mut done: impl FnMut() -> bool) -> io::Result<bool> {
        let deadline = Instant::now() + limit;
        loop {
            if done() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            // Short slices so a predicate satisfied from outside a handler is
            // noticed promptly.
            self.turn(Some((deadline - now).min(Duration::from_millis(10))))?;
        }
    }

    fn dispatch(&self, token: Token) -> bool {
        let taken = self
            .entries
            .borrow_mut()
            .get_mut(&token)
            .and_then(|entry| entry.handler.take());
        let Some(mut handler) = taken else {
            return false;
        };

        handler();

        // Deregistered from inside the handler: drop it here.
        if let Some(entry) = self.entries.borrow_mut().get_mut(&token) {
            entry.handler = Some(handler);
        }
        true
    }
}

impl Reactor for PollReactor {
    fn register(&self, fd: RawFd, handler: ReadyHandler) -> io::Result<Token> {
        let token = Token(self.next_token.get() + 1);
        self.next_token.set(token.0);
        self.entries.borrow_mut().insert(
            token,
            Entry {
                fd,
                handler: Some(handler),
            },
        );
        debug!(fd, token = token.0, "[SUB] Registered readiness handler");
        Ok(token)
    }

    fn deregister(&self, token: Token) -> io::Result<()> {
        match self.entries.borrow_mut().remove(&token) {
            Some(entry) => {
                debug!(fd = entry.fd, token = token.0, "[SUB] Deregistered readiness handler");
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown reactor token {}", token.0),
            )),
        }
    }
}

impl std::fmt::Debug for PollReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollReactor")
            .field("registrations", &self.len())
            .finish()
    }
}
