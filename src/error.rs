use thiserror::Error;

use crate::transport::TransportError;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport reported a problem.
    #[error("Transport problem: {0}")]
    Transport(#[from] TransportError),

    /// The configuration is not valid.
    #[error("Bad configuration. Problem: {0}")]
    BadConfig(String),

    /// The configuration file could not be read.
    #[error("Could not read the configuration file")]
    ConfigIO(#[from] std::io::Error),

    /// The configuration file is not valid RON.
    #[error("Could not parse the configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// The adapter task is no longer running.
    #[error("The adapter has stopped")]
    AdapterStopped,
}

impl Error {
    /// Returns the problem description if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(problem) = self {
            Ok(problem)
        } else {
            Err(self)
        }
    }
}
