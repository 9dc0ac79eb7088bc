use std::io;

use thiserror::Error;

/// Any error a [`Transport`](super::Transport) might report.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO related errors.
    #[error("Underlying IO problem")]
    IO(#[from] io::Error),

    /// The serial port could not be opened or configured.
    #[error("Serial port problem: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// A payload handed to the transport was not valid hex.
    #[error("Payload is not valid hex")]
    Hex(#[from] hex::FromHexError),

    /// An operation needed an open port, but there was none.
    #[error("The port is not open")]
    NotOpen,

    /// The transport refused the operation.
    #[error("The transport rejected the operation: {0}")]
    Rejected(String),

    /// The transport went away before the operation completed.
    #[error("Transport disconnected")]
    Disconnected,
}

impl TransportError {
    /// Shorthand for a [`TransportError::Rejected`].
    pub fn rejected<S: AsRef<str>>(reason: S) -> Self {
        Self::Rejected(reason.as_ref().into())
    }
}
