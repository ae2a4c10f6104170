//! Transport handle contract.
//!
//! A [`Transport`] owns one messaging context and one SUB socket created in
//! it. The connection drives it through a small set of calls; everything
//! protocol-specific (framing, reconnects, subscription propagation) stays
//! inside the transport library.
//!
//! Contract every implementation must honor:
//!
//! - [`Transport::recv_frame`] never blocks. With nothing queued it returns
//!   [`TransportError::WouldBlock`]. The drain loop retries
//!   [`TransportError::Interrupted`] without limit, so a transport that keeps
//!   reporting interruptions would spin; this layer trusts the transport here.
//! - [`Transport::has_more`] reports the "more frames follow" flag of the frame
//!   most recently returned by `recv_frame`.
//! - Teardown is two explicit steps, socket first, context second.

use crate::error::{ConnectionError, Operation, TransportError};
use crate::frame::Frame;
use crate::options::ConnectOptions;
use tracing::{debug, trace};

/// OS-level descriptor a host event loop can watch for read readiness.
#[cfg(unix)]
pub type RawFd = std::os::fd::RawFd;

/// OS-level descriptor a host event loop can watch for read readiness.
#[cfg(windows)]
pub type RawFd = std::os::windows::io::RawSocket;

/// A messaging context plus the SUB socket bound to it.
pub trait Transport: 'static {
    /// Connect the socket to `endpoint` (e.g. `tcp://127.0.0.1:5555`).
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError>;

    /// Add a subscription prefix. An empty prefix matches every message.
    fn subscribe(&mut self, prefix: &[u8]) -> Result<(), TransportError>;

    /// Non-blocking receive of one frame.
    fn recv_frame(&mut self) -> Result<Frame, TransportError>;

    /// Whether more frames of the current message follow the last one received.
    fn has_more(&mut self) -> Result<bool, TransportError>;

    /// Descriptor signalling pending socket activity.
    fn readiness_fd(&mut self) -> Result<RawFd, TransportError>;

    /// Close the socket. Called exactly once, before [`Transport::terminate`].
    fn close_socket(&mut self) -> Result<(), TransportError>;

    /// Terminate the context. Called after the socket is closed.
    fn terminate(&mut self) -> Result<(), TransportError>;
}

/// Creates a fresh [`Transport`] for every `connect`.
pub trait TransportFactory: 'static {
    type Transport: Transport;

    /// Create a context and an unconnected SUB socket configured from `options`.
    fn open(&mut self, options: &ConnectOptions) -> Result<Self::Transport, TransportError>;
}

/// Adapter turning a closure `FnMut(&ConnectOptions) -> Result<T, TransportError>`
/// into a [`TransportFactory`].
pub struct FnFactory<F>(pub F);

impl<F, T> TransportFactory for FnFactory<F>
where
    F: FnMut(&ConnectOptions) -> Result<T, TransportError> + 'static,
    T: Transport,
{
    type Transport = T;

    fn open(&mut self, options: &ConnectOptions) -> Result<T, TransportError> {
        (self.0)(options)
    }
}

/// Run `op` until it returns something other than [`TransportError::Interrupted`].
///
/// Each retry is added to `retries`.
pub fn retry_interrupted<T>(
    retries: &mut u32,
    mut op: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    loop {
        match op() {
            Err(TransportError::Interrupted) => {
                *retries = retries.saturating_add(1);
                trace!(retries = *retries, "[SUB] Interrupted, retrying");
            }
            other => return other,
        }
    }
}

/// Connect, subscribe to everything, and fetch the readiness descriptor.
pub(crate) fn establish<T: Transport>(
    transport: &mut T,
    endpoint: &str,
) -> Result<RawFd, ConnectionError> {
    let mut retries = 0;

    retry_interrupted(&mut retries, || transport.connect(endpoint))
        .map_err(|e| ConnectionError::transport(Operation::Connect, e))?;

    retry_interrupted(&mut retries, || transport.subscribe(b""))
        .map_err(|e| ConnectionError::transport(Operation::Subscribe, e))?;

    let fd = retry_interrupted(&mut retries, || transport.readiness_fd())
        .map_err(|e| ConnectionError::transport(Operation::ReadinessFd, e))?;

    debug!(endpoint, fd = ?fd, retries, "[SUB] Transport ready");
    Ok(fd)
}

/// Close the socket, then terminate the context, retrying interruptions.
///
/// Termination is attempted even when closing the socket failed; the first
/// error is returned. The handle is consumed either way.
pub(crate) fn teardown<T: Transport>(mut transport: T) -> Result<(), ConnectionError> {
    let mut retries = 0;

    let closed = retry_interrupted(&mut retries, || transport.close_socket())
        .map_err(|e| ConnectionError::transport(Operation::CloseSocket, e));

    let terminated = retry_interrupted(&mut retries, || transport.terminate())
        .map_err(|e| ConnectionError::transport(Operation::Terminate, e));

    debug!(retries, ok = closed.is_ok() && terminated.is_ok(), "[SUB] Transport released");
    closed.and(terminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_interrupted_counts() {
        let mut attempts = 0;
        let mut retries = 0;
        let result = retry_interrupted(&mut retries, || {
            attempts += 1;
            if attempts < 4 {
                Err(TransportError::Interrupted)
            } else {
                Ok(attempts)
            }
        });

        assert_eq!(result, Ok(4));
        assert_eq!(retries, 3);
    }

    #[test]
    fn test_retry_interrupted_passes_other_errors() {
        let mut retries = 0;
        let result: Result<(), _> =
            retry_interrupted(&mut retries, || Err(TransportError::WouldBlock));

        assert_eq!(result, Err(TransportError::WouldBlock));
        assert_eq!(retries, 0);
    }
}
