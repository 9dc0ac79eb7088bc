#![deny(missing_docs)]

//! This crate wraps a serial port transport in a small connect/disconnect/send/receive interface.
//!
//! The transport is anything implementing [`transport::Transport`].
//! A real serial port transport is available, as well as a mock which lets tests decide when
//! and how each transport operation completes.
//!
//! A connect may be canceled by disconnecting before the transport has finished opening.
//! The connect's callback is then never called, and if the open succeeds anyway
//! the port is closed again in the background.
//!
//! Sends are written one at a time in the order they were made.
//! The queue of pending sends is bounded, and sends over the bound are dropped newest first.
//!
//! Received data and read errors are fanned out to listeners,
//! see [`adapter::SerialAdapter::on_receive`] and [`adapter::SerialAdapter::on_receive_error`].

/// The adapter and the operations it exposes.
pub mod adapter;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Listener registers for data and errors arriving from the wire.
pub mod events;

/// Logging/tracing setup.
pub mod logging;

/// The queue of pending writes.
pub mod queue;

/// Connect attempts and their cancellation.
pub mod request;

/// What the adapter wraps.
pub mod transport;

pub use adapter::{ConnectionId, ConnectionInfo, SerialAdapter};
pub use config::{Config, DrainPolicy};
pub use error::Error;
pub use request::ConnectOptions;
