//! Connection configuration options
//!
//! These map onto the transport's socket options (zmq_setsockopt) and are
//! applied by the transport factory when a fresh socket is created during
//! `connect`.

use crate::error::{ConnectionError, Result};
use std::time::Duration;

/// Options for a SUB connection.
///
/// # Examples
///
/// ```
/// use subdrain_core::options::ConnectOptions;
/// use std::time::Duration;
///
/// let opts = ConnectOptions::default()
///     .with_recv_hwm(5000)
///     .with_reconnect_ivl(Duration::from_millis(250));
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Linger period (ZMQ_LINGER)
    ///
    /// How long context termination may wait on unsent data.
    /// - `Some(Duration::ZERO)` (default): never wait; a SUB socket only
    ///   sends subscriptions, so there is nothing worth waiting for
    /// - `None`: keep the transport default (may block termination)
    pub linger: Option<Duration>,

    /// High water mark for receiving (ZMQ_RCVHWM)
    ///
    /// - `None` (default): transport default (1000 messages for libzmq)
    pub recv_hwm: Option<i32>,

    /// Kernel receive buffer size in bytes (ZMQ_RCVBUF)
    ///
    /// - `None` (default): transport default
    /// - `Some(-1)`: OS default
    pub rcvbuf: Option<i32>,

    /// Reconnect interval (ZMQ_RECONNECT_IVL)
    pub reconnect_ivl: Option<Duration>,

    /// Maximum reconnect interval for exponential backoff (ZMQ_RECONNECT_IVL_MAX)
    pub reconnect_ivl_max: Option<Duration>,

    /// Maximum inbound message size in bytes (ZMQ_MAXMSGSIZE)
    ///
    /// Peers sending larger messages are disconnected by the transport.
    pub max_msg_size: Option<i64>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            linger: Some(Duration::ZERO),
            recv_hwm: None,
            rcvbuf: None,
            reconnect_ivl: None,
            reconnect_ivl_max: None,
            max_msg_size: None,
        }
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    #[must_use]
    pub const fn with_recv_hwm(mut self, hwm: i32) -> Self {
        self.recv_hwm = Some(hwm);
        self
    }

    #[must_use]
    pub const fn with_rcvbuf(mut self, size: i32) -> Self {
        self.rcvbuf = Some(size);
        self
    }

    #[must_use]
    pub const fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = Some(ivl);
        self
    }

    #[must_use]
    pub const fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = Some(max);
        self
    }

    #[must_use]
    pub const fn with_max_msg_size(mut self, size: i64) -> Self {
        self.max_msg_size = Some(size);
        self
    }

    /// Check option values before any transport is created.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidOption`] for negative sizes, values
    /// that do not fit the transport's millisecond integers, or a reconnect
    /// maximum below the reconnect interval.
    pub fn validate(&self) -> Result<()> {
        if let Some(hwm) = self.recv_hwm {
            if hwm < 0 {
                return Err(ConnectionError::invalid_option(format!(
                    "recv_hwm must be >= 0, got {hwm}"
                )));
            }
        }
        if let Some(size) = self.rcvbuf {
            if size < -1 {
                return Err(ConnectionError::invalid_option(format!(
                    "rcvbuf must be >= -1, got {size}"
                )));
            }
        }
        if let Some(size) = self.max_msg_size {
            if size < -1 {
                return Err(ConnectionError::invalid_option(format!(
                    "max_msg_size must be >= -1, got {size}"
                )));
            }
        }
        for (name, value) in [
            ("linger", self.linger),
            ("reconnect_ivl", self.reconnect_ivl),
            ("reconnect_ivl_max", self.reconnect_ivl_max),
        ] {
            if let Some(d) = value {
                millis_i32(d).ok_or_else(|| {
                    ConnectionError::invalid_option(format!("{name} too large: {d:?}"))
                })?;
            }
        }
        if let (Some(ivl), Some(max)) = (self.reconnect_ivl, self.reconnect_ivl_max) {
            if !max.is_zero() && max < ivl {
                return Err(ConnectionError::invalid_option(format!(
                    "reconnect_ivl_max ({max:?}) is below reconnect_ivl ({ivl:?})"
                )));
            }
        }
        Ok(())
    }
}

/// Convert a duration to the `int` milliseconds socket options take.
#[must_use]
pub fn millis_i32(d: Duration) -> Option<i32> {
    i32::try_from(d.as_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConnectOptions::default();
        assert_eq!(opts.linger, Some(Duration::ZERO));
        assert_eq!(opts.recv_hwm, None);
        assert_eq!(opts.rcvbuf, None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let opts = ConnectOptions::new()
            .with_linger(None)
            .with_recv_hwm(10)
            .with_rcvbuf(65536)
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(5))
            .with_max_msg_size(1 << 20);

        assert_eq!(opts.linger, None);
        assert_eq!(opts.recv_hwm, Some(10));
        assert_eq!(opts.rcvbuf, Some(65536));
        assert_eq!(opts.max_msg_size, Some(1 << 20));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ConnectOptions::new().with_recv_hwm(-1).validate().is_err());
        assert!(ConnectOptions::new().with_rcvbuf(-5).validate().is_err());
        assert!(ConnectOptions::new().with_max_msg_size(-2).validate().is_err());
        assert!(ConnectOptions::new()
            .with_linger(Some(Duration::from_secs(u64::MAX / 2)))
            .validate()
            .is_err());
        assert!(ConnectOptions::new()
            .with_reconnect_ivl(Duration::from_secs(2))
            .with_reconnect_ivl_max(Duration::from_secs(1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_accepts_os_default_rcvbuf() {
        assert!(ConnectOptions::new().with_rcvbuf(-1).validate().is_ok());
        assert!(ConnectOptions::new().with_rcvbuf(-2).validate().is_err());
    }

    #[test]
    fn test_millis_i32() {
        assert_eq!(millis_i32(Duration::from_millis(1500)), Some(1500));
        assert_eq!(millis_i32(Duration::from_secs(u64::from(u32::MAX))), None);
    }
}
