//! libzmq transport handle.
//!
//! Wraps a `zmq::Context` and a `ZMQ_SUB` socket created in it. Received
//! `zmq::Message`s are handed to the consumer as frame storage without
//! copying; `zmq_msg_close` runs when the consumer drops the frame.

use subdrain_core::error::TransportError;
use subdrain_core::frame::{Frame, FrameStorage};
use subdrain_core::options::{millis_i32, ConnectOptions};
use subdrain_core::transport::{RawFd, Transport, TransportFactory};
use tracing::{debug, trace};

/// Map a libzmq errno onto the retry / empty / fatal classes.
pub(crate) fn map_error(e: zmq::Error) -> TransportError {
    match e {
        zmq::Error::EINTR => TransportError::Interrupted,
        zmq::Error::EAGAIN => TransportError::WouldBlock,
        other => TransportError::failed(other.to_raw(), other.message()),
    }
}

/// A received libzmq message used as frame storage.
///
/// Release is `zmq::Message`'s own `Drop` (`zmq_msg_close`), which asserts
/// success instead of returning an error.
struct ZmqFrame(zmq::Message);

impl FrameStorage for ZmqFrame {
    fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn release(self: Box<Self>) {
        trace!(len = self.0.len(), "[SUB] Releasing zmq frame");
        drop(self);
    }
}

/// A libzmq context and the SUB socket bound to it.
pub struct ZmqTransport {
    // Declared before the context: the socket must go first.
    socket: Option<zmq::Socket>,
    context: Option<zmq::Context>,
}

impl ZmqTransport {
    /// Create a context and an unconnected SUB socket.
    ///
    /// # Errors
    ///
    /// Returns the libzmq error if the socket cannot be created or configured.
    pub fn open(options: &ConnectOptions) -> Result<Self, TransportError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB).map_err(map_error)?;
        apply_options(&socket, options).map_err(map_error)?;
        debug!("[SUB] Created libzmq context and socket");
        Ok(Self {
            socket: Some(socket),
            context: Some(context),
        })
    }

    fn socket(&self) -> Result<&zmq::Socket, TransportError> {
        self.socket
            .as_ref()
            .ok_or_else(|| map_error(zmq::Error::ENOTSOCK))
    }
}

fn apply_options(socket: &zmq::Socket, options: &ConnectOptions) -> zmq::Result<()> {
    if let Some(linger) = options.linger.and_then(millis_i32) {
        socket.set_linger(linger)?;
    }
    if let Some(hwm) = options.recv_hwm {
        socket.set_rcvhwm(hwm)?;
    }
    if let Some(size) = options.rcvbuf {
        socket.set_rcvbuf(size)?;
    }
    if let Some(ivl) = options.reconnect_ivl.and_then(millis_i32) {
        socket.set_reconnect_ivl(ivl)?;
    }
    if let Some(max) = options.reconnect_ivl_max.and_then(millis_i32) {
        socket.set_reconnect_ivl_max(max)?;
    }
    if let Some(size) = options.max_msg_size {
        socket.set_maxmsgsize(size)?;
    }
    Ok(())
}

impl Transport for ZmqTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.socket()?.connect(endpoint).map_err(map_error)
    }

    fn subscribe(&mut self, prefix: &[u8]) -> Result<(), TransportError> {
        self.socket()?.set_subscribe(prefix).map_err(map_error)
    }

    fn recv_frame(&mut self) -> Result<Frame, TransportError> {
        let mut msg = zmq::Message::new();
        self.socket()?
            .recv(&mut msg, zmq::DONTWAIT)
            .map_err(map_error)?;
        Ok(Frame::new(ZmqFrame(msg)))
    }

    fn has_more(&mut self) -> Result<bool, TransportError> {
        self.socket()?.get_rcvmore().map_err(map_error)
    }

    fn readiness_fd(&mut self) -> Result<RawFd, TransportError> {
        self.socket()?.get_fd().map_err(map_error)
    }

    fn close_socket(&mut self) -> Result<(), TransportError> {
        // zmq_close runs in the socket's Drop.
        drop(self.socket.take());
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        let Some(context) = self.context.as_mut() else {
            return Ok(());
        };
        // zmq_ctx_term; EINTR comes back as `Interrupted` and is retried by
        // the caller with the context still in place. Linger defaults to zero,
        // so this does not block on undelivered subscriptions.
        context.destroy().map_err(map_error)?;
        self.context = None;
        Ok(())
    }
}

/// Factory producing a fresh [`ZmqTransport`] per `connect`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqFactory;

impl TransportFactory for ZmqFactory {
    type Transport = ZmqTransport;

    fn open(&mut self, options: &ConnectOptions) -> Result<ZmqTransport, TransportError> {
        ZmqTransport::open(options)
    }
}
