//! # Subdrain
//!
//! Callback-driven ZeroMQ SUB connections for single-threaded event loops.
//!
//! ## Architecture
//!
//! - **`subdrain-core`**: transport and reactor seams, frame ownership,
//!   multi-frame assembly, the drain loop and the connection lifecycle
//! - **Transport crates**: native socket backends (`subdrain-zmq` for libzmq)
//! - **`subdrain`**: Public API surface (this crate)
//!
//! A connection registers its socket's readiness descriptor with the host's
//! event loop. Each notification drains every pending message, assembles
//! multi-frame messages and hands each one to the registered callback. Frame
//! buffers are never copied; the native buffer is released when the
//! consumer drops the frame.
//!
//! ## Backends (opt-in via features)
//!
//! - **`zmq`** - libzmq via the `zmq` crate
//!
//! ```toml
//! [dependencies]
//! subdrain = { version = "0.1", features = ["zmq"] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::rc::Rc;
//! use std::time::Duration;
//! use subdrain::zmq::prelude::*;
//!
//! let reactor = Rc::new(PollReactor::new());
//! let sub = SubConnection::open(&reactor, "tcp://127.0.0.1:5556")?;
//! sub.on_message(|msg: Message| println!("{} frame(s)", msg.len()));
//!
//! reactor.run_until(Duration::from_secs(1), || false)?;
//! sub.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom event loops
//!
//! Implement [`Reactor`] for the host loop and build a [`Connection`]
//! directly with any [`TransportFactory`].

#![warn(clippy::all)]

pub mod dev_tracing;

// Re-export core types
pub use bytes::Bytes;
pub use subdrain_core::prelude::*;

// Backends (opt-in via features)
#[cfg(feature = "zmq")]
pub mod zmq;
