//! # Subdrain ZMQ
//!
//! libzmq backend for `subdrain-core`.
//!
//! ## Overview
//!
//! - [`ZmqTransport`]: a context plus a `ZMQ_SUB` socket, receiving frames
//!   with `ZMQ_DONTWAIT` and exposing `ZMQ_FD` for readiness
//! - [`ZmqFactory`]: builds a fresh transport for every `connect`
//! - [`PollReactor`]: a `zmq_poll` loop for hosts without an event loop of
//!   their own
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use subdrain_core::connection::Connection;
//! use subdrain_zmq::{PollReactor, ZmqFactory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reactor = Rc::new(PollReactor::new());
//! let conn = Connection::new(ZmqFactory, Rc::clone(&reactor));
//! conn.on_message(|msg| println!("{} frame(s)", msg.len()));
//! conn.connect("tcp://127.0.0.1:5556")?;
//!
//! reactor.run_until(Duration::from_secs(1), || false)?;
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod reactor;
pub mod transport;

pub use reactor::PollReactor;
pub use transport::{ZmqFactory, ZmqTransport};
