//! Readiness bridge between the transport and the host event loop.
//!
//! The host loop watches the transport's readiness descriptor and calls back
//! on read readiness. The descriptor signals "something may have happened",
//! not "one message is ready", so every notification must drain the socket
//! until it reports no more data.

use crate::transport::RawFd;
use std::cell::Cell;
use std::io;
use std::rc::Rc;
use tracing::debug;

/// Handler invoked by the host loop on read readiness.
pub type ReadyHandler = Box<dyn FnMut()>;

/// Registration token handed out by a [`Reactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub u64);

/// A single-threaded host event loop.
///
/// Implementations must tolerate `deregister` being called from inside a
/// handler they are currently running, including for that handler's own
/// token, and must not invoke a handler after its token was deregistered.
pub trait Reactor: 'static {
    /// Watch `fd` for read readiness and run `handler` on every notification.
    fn register(&self, fd: RawFd, handler: ReadyHandler) -> io::Result<Token>;

    /// Stop watching a previously registered descriptor.
    fn deregister(&self, token: Token) -> io::Result<()>;
}

impl<R: Reactor + ?Sized> Reactor for Rc<R> {
    fn register(&self, fd: RawFd, handler: ReadyHandler) -> io::Result<Token> {
        (**self).register(fd, handler)
    }

    fn deregister(&self, token: Token) -> io::Result<()> {
        (**self).deregister(token)
    }
}

/// Owns at most one reactor registration for a connection.
#[derive(Debug)]
pub struct ReadinessBridge<R> {
    reactor: R,
    token: Cell<Option<Token>>,
}

impl<R: Reactor> ReadinessBridge<R> {
    pub const fn new(reactor: R) -> Self {
        Self {
            reactor,
            token: Cell::new(None),
        }
    }

    /// Register `fd` with the reactor.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyExists` when the bridge is already attached, or with
    /// whatever the reactor reports.
    pub fn attach(&self, fd: RawFd, handler: ReadyHandler) -> io::Result<()> {
        if self.token.get().is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "readiness descriptor already registered",
            ));
        }
        let token = self.reactor.register(fd, handler)?;
        debug!(fd = ?fd, token = token.0, "[SUB] Readiness registered");
        self.token.set(Some(token));
        Ok(())
    }

    /// Remove the registration. A no-op when not attached.
    ///
    /// The token is forgotten even if the reactor reports an error, so a
    /// failed deregistration is never retried against a stale token.
    pub fn detach(&self) -> io::Result<()> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };
        debug!(token = token.0, "[SUB] Readiness deregistered");
        self.reactor.deregister(token)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.token.get().is_some()
    }

    #[must_use]
    pub const fn reactor(&self) -> &R {
        &self.reactor
    }
}
