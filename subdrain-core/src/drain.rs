//! The drain loop.
//!
//! One pass runs per readiness notification:
//!
//! ```text
//! loop:
//!   recv_frame (non-blocking)
//!     Interrupted -> retry immediately
//!     WouldBlock  -> stop; the pass is done
//!     other error -> abort the pass, drop any partial message
//!     frame       -> assembler.push(frame, has_more())
//!                    message complete? -> sink.deliver(message)
//! ```
//!
//! A pass never suspends: every receive is non-blocking, and the consumer runs
//! synchronously inside the pass. Messages are delivered in the order their
//! final frame arrived.

use crate::assembler::Assembler;
use crate::dispatch::{CallbackSlot, Delivery};
use crate::error::{ConnectionError, ErrorClass, Operation, Result};
use crate::frame::Frame;
use crate::message::Message;
use crate::transport::{retry_interrupted, Transport};
use std::cell::{Cell, RefCell};
use tracing::{debug, trace, warn};

/// Destination for assembled messages.
pub trait Sink {
    /// Take one complete message.
    fn deliver(&mut self, message: Message) -> Delivery;

    /// Checked after every delivery; returning true ends the pass early.
    fn should_stop(&self) -> bool {
        false
    }
}

impl Sink for &CallbackSlot {
    fn deliver(&mut self, message: Message) -> Delivery {
        self.dispatch(message)
    }
}

impl Sink for Vec<Message> {
    fn deliver(&mut self, message: Message) -> Delivery {
        self.push(message);
        Delivery::Delivered
    }
}

/// What one drain pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Complete messages handed to the sink.
    pub messages: usize,
    /// Frames received.
    pub frames: usize,
    /// Messages the sink released undelivered.
    pub dropped: usize,
    /// Interrupted transport calls that were retried.
    pub retries: u32,
}

impl DrainReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

/// Marks a drain pass as running; cleared on drop, even on unwind.
pub(crate) struct PassGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> PassGuard<'a> {
    /// Returns `None` if a pass is already running on this flag.
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Receive one frame and its "more" flag.
///
/// `Ok(None)` means the transport has nothing queued.
fn receive_frame<T: Transport>(
    transport: &mut T,
    retries: &mut u32,
) -> Result<Option<(Frame, bool)>> {
    let frame = loop {
        match transport.recv_frame() {
            Ok(frame) => break frame,
            Err(e) => match e.class() {
                ErrorClass::Retry => {
                    *retries = retries.saturating_add(1);
                    trace!(retries = *retries, "[SUB] Receive interrupted, retrying");
                }
                ErrorClass::Empty => return Ok(None),
                ErrorClass::Fatal => {
                    return Err(ConnectionError::transport(Operation::Receive, e));
                }
            },
        }
    };

    let more = retry_interrupted(retries, || transport.has_more())
        .map_err(|e| ConnectionError::transport(Operation::ReceiveMore, e))?;

    trace!(len = frame.len(), more, "[SUB] Received frame");
    Ok(Some((frame, more)))
}

/// Drain every message currently queued on `transport` into `sink`.
///
/// The transport cell is borrowed only around each receive; it is free while
/// the sink runs, so the consumer may inspect or close the connection.
///
/// # Errors
///
/// - [`ConnectionError::NotConnected`] if there is no transport.
/// - [`ConnectionError::Transport`] on a fatal receive failure.
/// - [`ConnectionError::PartialMessage`] if the transport runs dry in the
///   middle of a multipart message.
///
/// In the error cases any partially assembled message is released without
/// being delivered. Messages completed earlier in the pass were already
/// delivered.
pub fn drain_pass<T, S>(transport: &RefCell<Option<T>>, sink: &mut S) -> Result<DrainReport>
where
    T: Transport,
    S: Sink + ?Sized,
{
    let mut report = DrainReport::default();
    let mut assembler = Assembler::new();

    loop {
        let received = {
            let mut guard = transport.borrow_mut();
            let transport = guard.as_mut().ok_or(ConnectionError::NotConnected)?;
            receive_frame(transport, &mut report.retries)
        };

        match received {
            Ok(Some((frame, more))) => {
                report.frames += 1;
                let Some(message) = assembler.push(frame, more) else {
                    continue;
                };
                report.messages += 1;
                if let Delivery::Dropped { .. } = sink.deliver(message) {
                    report.dropped += 1;
                }
                if sink.should_stop() {
                    debug!(messages = report.messages, "[SUB] Drain stopped by consumer");
                    break;
                }
            }
            Ok(None) => {
                if !assembler.is_idle() {
                    let frames = assembler.discard();
                    warn!(frames, "[SUB] Transport ran dry mid-message");
                    return Err(ConnectionError::PartialMessage { frames });
                }
                break;
            }
            Err(e) => {
                let discarded = assembler.discard();
                warn!(error = %e, discarded, "[SUB] Drain aborted");
                return Err(e);
            }
        }
    }

    trace!(
        messages = report.messages,
        frames = report.frames,
        dropped = report.dropped,
        retries = report.retries,
        "[SUB] Drain pass complete"
    );
    Ok(report)
}
