//! Subdrain Core
//!
//! This crate contains the transport-agnostic building blocks of a SUB
//! connection driven by a readiness-based event loop:
//! - Transport handle contract (`transport`)
//! - Readiness bridge and host loop contract (`bridge`)
//! - Non-blocking drain loop (`drain`)
//! - Multipart message assembly (`assembler`)
//! - Callback slot and dispatch (`dispatch`)
//! - Frame buffers with deferred release (`frame`, `message`)
//! - The connection object tying it together (`connection`)
//! - Options, monitoring and error types (`options`, `monitor`, `error`)

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

pub mod assembler;
pub mod bridge;
pub mod connection;
pub mod dispatch;
pub mod drain;
pub mod error;
pub mod frame;
pub mod message;
pub mod monitor;
pub mod options;
pub mod transport;

// Small prelude for downstream crates. Keep it minimal.
pub mod prelude {
    pub use crate::bridge::{Reactor, ReadyHandler, Token};
    pub use crate::connection::{Connection, ConnectionHandle, ConnectionState};
    pub use crate::drain::DrainReport;
    pub use crate::error::{ConnectionError, ErrorClass, TransportError};
    pub use crate::frame::{Frame, FrameStorage};
    pub use crate::message::Message;
    pub use crate::monitor::{ConnectionEvent, ConnectionMonitor};
    pub use crate::options::ConnectOptions;
    pub use crate::transport::{RawFd, Transport, TransportFactory};
}
