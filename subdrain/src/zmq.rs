//! libzmq-backed SUB connections.
//!
//! [`SubConnection`] pairs the core [`Connection`] with [`ZmqFactory`] and a
//! shared [`PollReactor`]. Hosts with their own event loop can instead build a
//! `Connection<ZmqFactory, R>` for any `R: Reactor`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use subdrain::zmq::{PollReactor, SubConnection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reactor = Rc::new(PollReactor::new());
//! let sub = SubConnection::open(&reactor, "tcp://127.0.0.1:5556")?;
//! sub.on_message(|msg| {
//!     for frame in &msg {
//!         println!("{:?}", String::from_utf8_lossy(frame));
//!     }
//! });
//!
//! reactor.run_until(Duration::from_secs(5), || false)?;
//! sub.close()?;
//! # Ok(())
//! # }
//! ```

use std::rc::Rc;

use subdrain_core::connection::{Connection, ConnectionHandle, ConnectionState};
use subdrain_core::drain::DrainReport;
use subdrain_core::error::Result;
use subdrain_core::message::Message;
use subdrain_core::monitor::ConnectionMonitor;
use subdrain_core::options::ConnectOptions;

pub use subdrain_zmq::{PollReactor, ZmqFactory, ZmqTransport};

/// The core connection type this module wraps.
pub type ZmqConnection = Connection<ZmqFactory, Rc<PollReactor>>;

/// A SUB connection to a libzmq PUB peer, subscribed to every message.
///
/// Messages are delivered to the registered callback from
/// [`PollReactor::turn`] on the thread that owns the reactor.
///
/// ## ZeroMQ Compatibility
///
/// Compatible with `zmq::PUB` and `zmq::XPUB` peers over any transport libzmq
/// accepts (`tcp://`, `ipc://`, `inproc://` within the same context only).
pub struct SubConnection {
    inner: ZmqConnection,
}

impl SubConnection {
    /// Create an unconnected SUB connection watched by `reactor`.
    pub fn new(reactor: &Rc<PollReactor>) -> Self {
        Self::with_options(reactor, ConnectOptions::default())
    }

    /// Create an unconnected SUB connection with custom socket options.
    pub fn with_options(reactor: &Rc<PollReactor>, options: ConnectOptions) -> Self {
        Self {
            inner: Connection::with_options(ZmqFactory, Rc::clone(reactor), options),
        }
    }

    /// Create a SUB connection and connect it to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the connect failure, carrying libzmq's own message.
    pub fn open(reactor: &Rc<PollReactor>, endpoint: &str) -> Result<Self> {
        Self::open_with_options(reactor, endpoint, ConnectOptions::default())
    }

    /// [`open`](Self::open) with custom socket options.
    ///
    /// # Errors
    ///
    /// Returns option validation or connect failures.
    pub fn open_with_options(
        reactor: &Rc<PollReactor>,
        endpoint: &str,
        options: ConnectOptions,
    ) -> Result<Self> {
        let sub = Self::with_options(reactor, options);
        sub.connect(endpoint)?;
        Ok(sub)
    }

    /// Connect to `endpoint` and subscribe to every message.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub fn connect(&self, endpoint: &str) -> Result<()> {
        self.inner.connect(endpoint)
    }

    /// Register the message callback, replacing any previous one.
    pub fn on_message<C>(&self, callback: C)
    where
        C: FnMut(Message) + 'static,
    {
        self.inner.on_message(callback);
    }

    /// Remove the message callback. Returns whether one was set.
    pub fn clear_on_message(&self) -> bool {
        self.inner.clear_on_message()
    }

    /// Stop watching for readiness and release the socket and context.
    ///
    /// # Errors
    ///
    /// See [`Connection::close`].
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    /// Run one drain pass now instead of waiting for readiness.
    ///
    /// # Errors
    ///
    /// See [`Connection::drain_now`].
    pub fn drain_now(&self) -> Result<DrainReport> {
        self.inner.drain_now()
    }

    pub fn monitor(&self) -> ConnectionMonitor {
        self.inner.monitor()
    }

    pub fn handle(&self) -> ConnectionHandle<ZmqFactory, Rc<PollReactor>> {
        self.inner.handle()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn endpoint(&self) -> Option<String> {
        self.inner.endpoint()
    }

    pub fn reactor(&self) -> &Rc<PollReactor> {
        self.inner.reactor()
    }

    /// Access the underlying core connection.
    pub fn connection(&self) -> &ZmqConnection {
        &self.inner
    }

    pub fn into_inner(self) -> ZmqConnection {
        self.inner
    }
}

impl std::fmt::Debug for SubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubConnection")
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

/// Convenient imports for libzmq SUB connections.
///
/// # Example
///
/// ```rust
/// use subdrain::zmq::prelude::*;
///
/// // Now you have:
/// // - SubConnection, PollReactor
/// // - Message, Frame, ConnectOptions, ConnectionError
/// ```
pub mod prelude {
    pub use super::{PollReactor, SubConnection};
    pub use subdrain_core::prelude::{
        ConnectOptions, ConnectionError, ConnectionEvent, ConnectionState, Frame, Message,
    };
}
