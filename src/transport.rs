use std::fmt::Display;

use bytes::Bytes;
use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};

/// Transport related errors.
pub mod error;

/// A scriptable transport for tests.
pub mod mock;

/// A transport backed by a real serial port.
pub mod serial;

pub use error::TransportError;

/// The options the adapter hands to [`Transport::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Bits per second.
    pub baud_rate: u32,

    /// Whether the host may let the port sleep while the app is paused.
    pub sleep_on_pause: bool,
}

impl Display for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "baud: {}, sleep on pause: {}",
            self.baud_rate, self.sleep_on_pause
        )
    }
}

/// What a transport produces once a read subscription is registered.
/// Each item is either a chunk of bytes from the wire or a read error.
pub type Inbox = BoxStream<'static, Result<Bytes, TransportError>>;

/// The byte-stream provider the adapter wraps.
///
/// The transport owns at most one port at a time.
/// Operations complete whenever the transport is done with them,
/// and the adapter makes no assumption about how long that takes.
pub trait Transport: Send + Sync + 'static {
    /// Open the port.
    fn open(&self, options: OpenOptions) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Close the port.
    fn close(&self) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Write a payload, see [`encode_payload`] for the encoding.
    fn write(&self, hex_payload: String) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Register for reads from the open port.
    fn inbox(&self) -> Result<Inbox, TransportError>;
}

/// Encode bytes the way transports expect them on [`Transport::write`]:
/// two lowercase hex characters per byte.
pub fn encode_payload(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
