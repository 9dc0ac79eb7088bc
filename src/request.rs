use std::{
    fmt::Display,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The options a caller may connect with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bits per second.
    pub bitrate: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self { bitrate: 115_200 }
    }
}

impl ConnectOptions {
    /// Connect with the given bitrate.
    pub fn with_bitrate(bitrate: u32) -> Self {
        Self { bitrate }
    }
}

/// One attempt at connecting.
///
/// Cancelling only has an effect while the request is pending:
/// once it is fulfilled there is nothing left to cancel.
#[derive(Debug)]
pub(crate) struct ConnectionRequest {
    id: Uuid,
    path: String,
    options: ConnectOptions,
    cancellation: CancellationToken,
    fulfilled: AtomicBool,
}

impl Display for ConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} @ {})", self.id, self.path(), self.options.bitrate)
    }
}

impl ConnectionRequest {
    pub(crate) fn new(path: &str, options: ConnectOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.to_string(),
            options,
            cancellation: CancellationToken::new(),
            fulfilled: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn options(&self) -> ConnectOptions {
        self.options
    }

    /// Withdraw interest in the outcome.
    /// Returns false if the request was already fulfilled.
    pub(crate) fn cancel(&self) -> bool {
        if self.is_fulfilled() {
            return false;
        }

        self.cancellation.cancel();
        true
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn fulfil(&self) {
        self.fulfilled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.fulfilled.load(Ordering::SeqCst)
    }

    /// Neither fulfilled nor canceled yet.
    pub(crate) fn is_pending(&self) -> bool {
        !self.is_fulfilled() && !self.is_canceled()
    }
}
