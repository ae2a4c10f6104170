//! Connection event monitoring.
//!
//! Provides an event stream for connection lifecycle changes and for failures
//! that happen inside readiness-triggered drain passes, where there is no
//! caller to return an error to.

use std::fmt;

/// Connection lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connected and registered with the event loop.
    Connected(String),

    /// Connection attempt failed.
    ConnectFailed { endpoint: String, reason: String },

    /// A message arrived with no callback registered and was released.
    MessageDropped { frames: usize },

    /// A readiness-triggered drain pass failed.
    DrainFailed { reason: String },

    /// Transport resources released.
    Closed,
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "Connected to {ep}"),
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "Connect failed for {endpoint}: {reason}")
            }
            Self::MessageDropped { frames } => {
                write!(f, "Dropped {frames}-frame message (no callback)")
            }
            Self::DrainFailed { reason } => write!(f, "Drain failed: {reason}"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Handle for receiving connection events.
pub type ConnectionMonitor = flume::Receiver<ConnectionEvent>;

/// Sending half kept by the connection.
pub type ConnectionEventSender = flume::Sender<ConnectionEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (ConnectionEventSender, ConnectionMonitor) {
    flume::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = ConnectionEvent::Connected("tcp://127.0.0.1:5555".into());
        assert_eq!(event.to_string(), "Connected to tcp://127.0.0.1:5555");

        let event = ConnectionEvent::DrainFailed {
            reason: "receive failed: Context was terminated".into(),
        };
        assert_eq!(
            event.to_string(),
            "Drain failed: receive failed: Context was terminated"
        );
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        sender.send(ConnectionEvent::Closed).unwrap();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event, ConnectionEvent::Closed);
    }
}
