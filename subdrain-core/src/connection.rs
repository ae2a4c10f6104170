//! The SUB connection object.
//!
//! # Lifecycle
//!
//! ```text
//! Unconnected --connect--> Connecting --ok--> Connected --close--> Closed
//!                               |                                    ^
//!                               +--------------error-----------------+
//! ```
//!
//! - `connect` is only valid from `Unconnected`. A second `connect` fails with
//!   [`ConnectionError::AlreadyConnected`]; `connect` after close fails with
//!   [`ConnectionError::Closed`]. Reconnecting means creating a new connection.
//! - A failed `connect` tears down whatever transport it built and leaves the
//!   connection `Closed`.
//! - `close` is idempotent. Closing an unconnected connection moves it straight
//!   to `Closed`.
//!
//! # Threading
//!
//! Everything runs on the host event loop's thread. State lives behind
//! `Rc`/`RefCell`, so connections are `!Send` and never need a lock.
//!
//! # Closing from the callback
//!
//! The consumer may call [`ConnectionHandle::close`] (or [`Connection::close`]
//! through an `Rc`) while a message is being dispatched. Teardown is deferred:
//! the drain pass stops after the callback returns, unwinds, and only then is
//! the socket released. Errors from a deferred teardown are reported through
//! the monitor.

use crate::bridge::{ReadinessBridge, Reactor};
use crate::dispatch::{CallbackSlot, Delivery};
use crate::drain::{self, DrainReport, PassGuard, Sink};
use crate::error::{ConnectionError, Operation, Result};
use crate::message::Message;
use crate::monitor::{create_monitor, ConnectionEvent, ConnectionEventSender, ConnectionMonitor};
use crate::options::ConnectOptions;
use crate::transport::{self, TransportFactory};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unconnected => "Unconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Closed => "Closed",
        };
        f.write_str(s)
    }
}

struct Shared<F: TransportFactory, R: Reactor> {
    factory: RefCell<F>,
    options: ConnectOptions,
    state: Cell<ConnectionState>,
    transport: RefCell<Option<F::Transport>>,
    bridge: ReadinessBridge<R>,
    callback: CallbackSlot,
    endpoint: RefCell<Option<String>>,
    monitor: RefCell<Option<ConnectionEventSender>>,
    draining: Cell<bool>,
    close_requested: Cell<bool>,
}

/// Sink used by drain passes: dispatch to the callback slot, stop early once
/// a close was requested from inside the callback.
struct Dispatcher<'a, F: TransportFactory, R: Reactor> {
    shared: &'a Shared<F, R>,
}

impl<F: TransportFactory, R: Reactor> Sink for Dispatcher<'_, F, R> {
    fn deliver(&mut self, message: Message) -> Delivery {
        let delivery = self.shared.callback.dispatch(message);
        if let Delivery::Dropped { frames } = delivery {
            self.shared.emit(ConnectionEvent::MessageDropped { frames });
        }
        delivery
    }

    fn should_stop(&self) -> bool {
        self.shared.close_requested.get()
    }
}

impl<F: TransportFactory, R: Reactor> Shared<F, R> {
    fn emit(&self, event: ConnectionEvent) {
        if let Some(monitor) = self.monitor.borrow().as_ref() {
            let _ = monitor.send(event);
        }
    }

    fn connect(self: &Rc<Self>, endpoint: &str) -> Result<()> {
        match self.state.get() {
            ConnectionState::Unconnected => {}
            ConnectionState::Connecting | ConnectionState::Connected => {
                return Err(ConnectionError::AlreadyConnected);
            }
            ConnectionState::Closed => return Err(ConnectionError::Closed),
        }
        self.options.validate()?;

        self.state.set(ConnectionState::Connecting);
        debug!(endpoint, "[SUB] Connecting");

        match self.establish(endpoint) {
            Ok(()) => {
                *self.endpoint.borrow_mut() = Some(endpoint.to_owned());
                self.state.set(ConnectionState::Connected);
                debug!(endpoint, "[SUB] Connected");
                self.emit(ConnectionEvent::Connected(endpoint.to_owned()));
                Ok(())
            }
            Err(e) => {
                self.state.set(ConnectionState::Closed);
                warn!(endpoint, error = %e, "[SUB] Connect failed");
                self.emit(ConnectionEvent::ConnectFailed {
                    endpoint: endpoint.to_owned(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Build the transport and register it. On error nothing is left behind.
    fn establish(self: &Rc<Self>, endpoint: &str) -> Result<()> {
        let mut handle = self
            .factory
            .borrow_mut()
            .open(&self.options)
            .map_err(|e| ConnectionError::transport(Operation::Open, e))?;

        let fd = match transport::establish(&mut handle, endpoint) {
            Ok(fd) => fd,
            Err(e) => {
                Self::discard(handle);
                return Err(e);
            }
        };

        *self.transport.borrow_mut() = Some(handle);

        let weak = Rc::downgrade(self);
        let handler = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_readable();
            }
        });
        if let Err(e) = self.bridge.attach(fd, handler) {
            if let Some(handle) = self.transport.borrow_mut().take() {
                Self::discard(handle);
            }
            return Err(ConnectionError::Reactor(e));
        }
        Ok(())
    }

    fn discard(handle: F::Transport) {
        if let Err(e) = transport::teardown(handle) {
            warn!(error = %e, "[SUB] Teardown of partial transport failed");
        }
    }

    /// Readiness notification from the host loop.
    fn on_readable(&self) {
        if self.state.get() != ConnectionState::Connected {
            debug!(state = %self.state.get(), "[SUB] Ignoring readiness, not connected");
            return;
        }
        if let Err(e) = self.run_drain() {
            error!(error = %e, "[SUB] Drain pass failed");
            self.emit(ConnectionEvent::DrainFailed {
                reason: e.to_string(),
            });
        }
    }

    /// One drain pass, followed by any close requested during it.
    fn run_drain(&self) -> Result<DrainReport> {
        let Some(pass) = PassGuard::enter(&self.draining) else {
            debug!("[SUB] Drain already running, skipping nested pass");
            return Ok(DrainReport::default());
        };

        let mut sink = Dispatcher { shared: self };
        let result = drain::drain_pass(&self.transport, &mut sink);
        drop(pass);

        if self.close_requested.get() {
            debug!("[SUB] Running close requested during dispatch");
            if let Err(e) = self.shutdown() {
                error!(error = %e, "[SUB] Deferred close failed");
                self.emit(ConnectionEvent::DrainFailed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    fn drain_now(&self) -> Result<DrainReport> {
        match self.state.get() {
            ConnectionState::Connected => self.run_drain(),
            ConnectionState::Closed => Err(ConnectionError::Closed),
            ConnectionState::Unconnected | ConnectionState::Connecting => {
                Err(ConnectionError::NotConnected)
            }
        }
    }

    fn shutdown(&self) -> Result<()> {
        match self.state.get() {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Unconnected => {
                self.state.set(ConnectionState::Closed);
                debug!("[SUB] Closed before connect");
                return Ok(());
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
        }

        if self.draining.get() {
            debug!("[SUB] Close requested during dispatch, deferring");
            self.close_requested.set(true);
            return Ok(());
        }
        self.close_requested.set(false);
        self.state.set(ConnectionState::Closed);

        // Deregister first so no notification can reach a half-closed socket.
        let detached = self.bridge.detach().map_err(ConnectionError::Reactor);
        if let Err(e) = &detached {
            warn!(error = %e, "[SUB] Readiness deregistration failed");
        }

        let handle = self.transport.borrow_mut().take();
        let released = handle.map_or(Ok(()), transport::teardown);

        debug!(endpoint = ?self.endpoint.borrow(), "[SUB] Closed");
        self.emit(ConnectionEvent::Closed);
        detached.and(released)
    }
}

/// A SUB connection delivering every message to one callback.
///
/// `F` builds the transport handle at `connect` time; `R` is the host event
/// loop the readiness descriptor is registered with.
pub struct Connection<F: TransportFactory, R: Reactor> {
    shared: Rc<Shared<F, R>>,
}

impl<F: TransportFactory, R: Reactor> Connection<F, R> {
    /// Create an unconnected connection with default options.
    pub fn new(factory: F, reactor: R) -> Self {
        Self::with_options(factory, reactor, ConnectOptions::default())
    }

    /// Create an unconnected connection with custom options.
    pub fn with_options(factory: F, reactor: R, options: ConnectOptions) -> Self {
        Self {
            shared: Rc::new(Shared {
                factory: RefCell::new(factory),
                options,
                state: Cell::new(ConnectionState::Unconnected),
                transport: RefCell::new(None),
                bridge: ReadinessBridge::new(reactor),
                callback: CallbackSlot::new(),
                endpoint: RefCell::new(None),
                monitor: RefCell::new(None),
                draining: Cell::new(false),
                close_requested: Cell::new(false),
            }),
        }
    }

    /// Connect to `endpoint`, subscribe to every message and start listening
    /// for readiness.
    ///
    /// Interrupted transport calls are retried transparently.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::AlreadyConnected`] / [`ConnectionError::Closed`] if
    ///   the connection is not `Unconnected`.
    /// - [`ConnectionError::InvalidOption`] if the options fail validation; the
    ///   connection stays `Unconnected`.
    /// - [`ConnectionError::Transport`] with the transport's own message, or
    ///   [`ConnectionError::Reactor`]; the connection is then `Closed`.
    pub fn connect(&self, endpoint: &str) -> Result<()> {
        self.shared.connect(endpoint)
    }

    /// Register the message callback, replacing any previous one.
    pub fn on_message<C>(&self, callback: C)
    where
        C: FnMut(Message) + 'static,
    {
        self.shared.callback.set(callback);
    }

    /// Remove the message callback. Later messages are dropped and released.
    pub fn clear_on_message(&self) -> bool {
        self.shared.callback.clear()
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.shared.callback.is_set()
    }

    /// Deregister from the event loop, close the socket, terminate the context.
    ///
    /// Idempotent. When called from inside the message callback the teardown
    /// runs as soon as the current drain pass returns.
    ///
    /// # Errors
    ///
    /// Reports the first failure; the connection is `Closed` regardless.
    pub fn close(&self) -> Result<()> {
        self.shared.shutdown()
    }

    /// Run one drain pass now, without waiting for a readiness notification.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] / [`ConnectionError::Closed`] outside
    /// the `Connected` state, otherwise whatever the drain pass reports.
    pub fn drain_now(&self) -> Result<DrainReport> {
        self.shared.drain_now()
    }

    /// Enable monitoring for this connection.
    ///
    /// Returns a receiver for lifecycle events and drain failures. Calling it
    /// again replaces the previous receiver.
    pub fn monitor(&self) -> ConnectionMonitor {
        let (sender, receiver) = create_monitor();
        *self.shared.monitor.borrow_mut() = Some(sender);
        receiver
    }

    /// A weak handle usable from inside the callback without creating a cycle.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle<F, R> {
        ConnectionHandle {
            shared: Rc::downgrade(&self.shared),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Endpoint of the last successful `connect`.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.shared.endpoint.borrow().clone()
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.shared.options
    }

    /// The event loop this connection registers with.
    #[must_use]
    pub fn reactor(&self) -> &R {
        self.shared.bridge.reactor()
    }
}

impl<F: TransportFactory, R: Reactor> Drop for Connection<F, R> {
    fn drop(&mut self) {
        self.shared.callback.clear();
        if let Err(e) = self.shared.shutdown() {
            warn!(error = %e, "[SUB] Close on drop failed");
        }
    }
}

impl<F: TransportFactory, R: Reactor> fmt::Debug for Connection<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .field("registered", &self.shared.bridge.is_attached())
            .field("callback", &self.shared.callback)
            .finish()
    }
}

/// Weak reference to a [`Connection`].
///
/// Every method is a no-op (or reports `Closed`) once the connection is gone.
pub struct ConnectionHandle<F: TransportFactory, R: Reactor> {
    shared: Weak<Shared<F, R>>,
}

impl<F: TransportFactory, R: Reactor> ConnectionHandle<F, R> {
    /// Close the connection. Deferred when called during dispatch.
    ///
    /// # Errors
    ///
    /// See [`Connection::close`].
    pub fn close(&self) -> Result<()> {
        self.shared.upgrade().map_or(Ok(()), |shared| shared.shutdown())
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared
            .upgrade()
            .map_or(ConnectionState::Closed, |shared| shared.state.get())
    }

    /// Replace the message callback.
    pub fn on_message<C>(&self, callback: C)
    where
        C: FnMut(Message) + 'static,
    {
        if let Some(shared) = self.shared.upgrade() {
            shared.callback.set(callback);
        }
    }
}

impl<F: TransportFactory, R: Reactor> Clone for ConnectionHandle<F, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}
