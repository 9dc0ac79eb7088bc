use serde::{Deserialize, Serialize};

use super::ConnectionId;

/// A snapshot of the adapter's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// The current connection, if any.
    pub connection_id: Option<ConnectionId>,

    /// The bitrate of the current connection, if any.
    pub bitrate: Option<u32>,

    /// Bytes written since the last successful open.
    pub bytes_sent: u64,

    /// Bytes received since the last successful open.
    pub bytes_received: u64,

    /// Failed opens and writes since the last success.
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionState {
    stats: ConnectionStats,
}

impl ConnectionState {
    pub(crate) fn connection_id(&self) -> Option<ConnectionId> {
        self.stats.connection_id
    }

    /// A new connection is up. Counters start over.
    pub(crate) fn establish(&mut self, connection_id: ConnectionId, bitrate: u32) {
        self.stats = ConnectionStats {
            connection_id: Some(connection_id),
            bitrate: Some(bitrate),
            ..Default::default()
        };
    }

    /// The connection is gone. Counters are kept until the next [`Self::establish`].
    pub(crate) fn reset(&mut self) {
        self.stats.connection_id = None;
        self.stats.bitrate = None;
    }

    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.stats.bytes_sent += bytes as u64;
        self.stats.consecutive_failures = 0;
    }

    pub(crate) fn record_received(&mut self, bytes: usize) {
        self.stats.bytes_received += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self) {
        self.stats.consecutive_failures += 1;
    }

    pub(crate) fn stats(&self) -> ConnectionStats {
        self.stats
    }
}
