//! Error types for transport calls and connection operations.
//!
//! Every transport failure falls into one of three classes:
//!
//! | Class | Transport condition | Treatment |
//! |---|---|---|
//! | [`ErrorClass::Retry`] | interrupted system call | retried in place, never surfaced |
//! | [`ErrorClass::Empty`] | no data available on a non-blocking receive | ends a drain pass normally |
//! | [`ErrorClass::Fatal`] | anything else | aborts the current operation and is surfaced |

use std::fmt;
use std::io;
use thiserror::Error;

/// Classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Try the same call again.
    Retry,
    /// Nothing to receive right now.
    Empty,
    /// The operation in progress failed.
    Fatal,
}

/// Error reported by a [`Transport`](crate::transport::Transport) call.
///
/// `Failed` keeps the transport's native error code and description so the
/// caller sees exactly what the messaging library reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call was interrupted by a signal (EINTR).
    #[error("Interrupted system call")]
    Interrupted,

    /// A non-blocking call found nothing to do (EAGAIN).
    #[error("Resource temporarily unavailable")]
    WouldBlock,

    /// Any other failure.
    #[error("{message}")]
    Failed { code: i32, message: String },
}

impl TransportError {
    /// Create a fatal transport error with a native code and description.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            code,
            message: message.into(),
        }
    }

    /// Classify this error for the retry / stop / fatal decision.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Interrupted => ErrorClass::Retry,
            Self::WouldBlock => ErrorClass::Empty,
            Self::Failed { .. } => ErrorClass::Fatal,
        }
    }

    /// Native error code, if the transport supplied one.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// The connection operation a fatal transport error interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Connect,
    Subscribe,
    ReadinessFd,
    Receive,
    ReceiveMore,
    CloseSocket,
    Terminate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Connect => "connect",
            Self::Subscribe => "subscribe",
            Self::ReadinessFd => "readiness fd query",
            Self::Receive => "receive",
            Self::ReceiveMore => "more-frames query",
            Self::CloseSocket => "socket close",
            Self::Terminate => "context terminate",
        };
        f.write_str(name)
    }
}

/// Main error type for connection operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A transport call failed with a non-retryable error.
    #[error("{op} failed: {source}")]
    Transport {
        op: Operation,
        #[source]
        source: TransportError,
    },

    /// `connect` was called on a connection that already holds a socket.
    #[error("Connection is already connected")]
    AlreadyConnected,

    /// The operation requires a connected socket.
    #[error("Connection is not connected")]
    NotConnected,

    /// The connection was closed and cannot be reused.
    #[error("Connection is closed")]
    Closed,

    /// The transport ran dry between frames of one logical message.
    #[error("Partial message: no data after {frames} frame(s) flagged as having more")]
    PartialMessage { frames: usize },

    /// Connection options rejected before any transport was created.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The host event loop refused a registration change.
    #[error("Reactor error: {0}")]
    Reactor(#[from] io::Error),
}

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

impl ConnectionError {
    /// Tag a transport error with the operation it interrupted.
    pub const fn transport(op: Operation, source: TransportError) -> Self {
        Self::Transport { op, source }
    }

    /// Create an invalid option error.
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }

    /// Check whether a later readiness notification can succeed after this error.
    ///
    /// Drain failures leave the connection usable; lifecycle misuse does not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { op, .. } => {
                matches!(op, Operation::Receive | Operation::ReceiveMore)
            }
            Self::PartialMessage { .. } => true,
            Self::AlreadyConnected
            | Self::NotConnected
            | Self::Closed
            | Self::InvalidOption(_)
            | Self::Reactor(_) => false,
        }
    }

    /// The underlying transport error, if any.
    #[must_use]
    pub const fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
