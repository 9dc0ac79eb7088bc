use std::fmt::Display;

use bytes::Bytes;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    config::Config,
    error::Error,
    events::{EventChannel, ReceiveError, ReceivedData},
    queue::{SendCallback, SendInfo},
    request::ConnectOptions,
    transport::Transport,
};

use self::{lifecycle::Lifecycle, state::ConnectionStats};

/// The task owning the adapter's state.
pub(crate) mod lifecycle;

/// Connection state and counters.
pub mod state;

/// The device path reported by [`SerialAdapter::get_devices`].
pub const PLACEHOLDER_DEVICE: &str = "DevicePath";

/// Identifies a successful connection on a single adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u32);

impl ConnectionId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

/// What a connect callback receives on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// The new connection.
    pub connection_id: ConnectionId,

    /// The bitrate it was opened with.
    pub bitrate: u32,
}

/// A device which may be connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// The path to pass to [`SerialAdapter::connect`].
    pub path: String,
}

/// Port information as reported by [`SerialAdapter::get_info`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortInfo {
    /// Whether the port is paused.
    pub paused: bool,

    /// Whether the port stays open across app restarts.
    pub persistent: bool,

    /// A name for the port.
    pub name: String,
}

/// Modem control signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlSignals {
    /// Data carrier detect.
    pub dcd: bool,

    /// Clear to send.
    pub cts: bool,

    /// Ring indicator.
    pub ri: bool,

    /// Data set ready.
    pub dsr: bool,
}

pub(crate) type ConnectCallback = Box<dyn FnOnce(Result<ConnectionInfo, Error>) + Send>;
pub(crate) type DisconnectCallback = Box<dyn FnOnce(bool) + Send>;
pub(crate) type StatsCallback = Box<dyn FnOnce(ConnectionStats) + Send>;

pub(crate) enum AdapterMessage {
    Connect {
        path: String,
        options: ConnectOptions,
        callback: ConnectCallback,
    },
    Disconnect {
        callback: DisconnectCallback,
    },
    Send {
        data: Bytes,
        callback: SendCallback,
    },
    EmptyOutputBuffer,
    Stats {
        callback: StatsCallback,
    },
}

/// A handle to a running adapter.
///
/// Cloning the handle is cheap, and clones talk to the same adapter.
/// The adapter stops once every handle is dropped.
///
/// Callbacks are called from the adapter's task.
/// Some callbacks are never called, see the individual operations.
#[derive(Clone)]
pub struct SerialAdapter {
    messages: mpsc::UnboundedSender<AdapterMessage>,
    on_receive: EventChannel<ReceivedData>,
    on_receive_error: EventChannel<ReceiveError>,
}

impl std::fmt::Debug for SerialAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialAdapter")
            .field("on_receive", &self.on_receive)
            .field("on_receive_error", &self.on_receive_error)
            .finish()
    }
}

impl SerialAdapter {
    /// Start an adapter over the given transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<T: Transport>(transport: T, config: Config) -> Result<Self, Error> {
        config.validate()?;

        let (messages_tx, messages_rx) = mpsc::unbounded();
        let on_receive = EventChannel::new("receive");
        let on_receive_error = EventChannel::new("receive-error");

        let lifecycle = Lifecycle::new(
            transport,
            config,
            messages_rx,
            on_receive.clone(),
            on_receive_error.clone(),
        );

        tokio::spawn(lifecycle.run());

        Ok(Self {
            messages: messages_tx,
            on_receive,
            on_receive_error,
        })
    }

    fn post(&self, message: AdapterMessage) {
        if self.messages.unbounded_send(message).is_err() {
            error!("{}, request dropped", Error::AdapterStopped);
        }
    }

    /// Connect to the device at `path`.
    ///
    /// The callback receives the connection info, or the reason the open failed.
    /// It is never called if the connect is canceled by [`Self::disconnect`] before the open completes.
    ///
    /// Connecting again before a previous connect completed makes the previous one irrelevant to
    /// [`Self::disconnect`], which only cancels the newest request.
    pub fn connect<F>(&self, path: &str, options: ConnectOptions, callback: F)
    where
        F: FnOnce(Result<ConnectionInfo, Error>) + Send + 'static,
    {
        self.post(AdapterMessage::Connect {
            path: path.to_string(),
            options,
            callback: Box::new(callback),
        })
    }

    /// Disconnect.
    ///
    /// If connected, pending sends are dropped, every listener is removed, and the connection is closed.
    /// The callback then receives whether the close succeeded.
    /// Either way the adapter considers itself disconnected afterwards.
    ///
    /// If not connected, a connect in flight is canceled and the callback is never called.
    pub fn disconnect<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.post(AdapterMessage::Disconnect {
            callback: Box::new(callback),
        })
    }

    /// Queue bytes for writing.
    ///
    /// The callback receives the number of bytes written once this chunk is on the wire.
    /// It is not called if writing fails or the queue is emptied before then.
    pub fn send<B, F>(&self, data: B, callback: F)
    where
        B: Into<Bytes>,
        F: FnOnce(SendInfo) + Send + 'static,
    {
        self.post(AdapterMessage::Send {
            data: data.into(),
            callback: Box::new(callback),
        })
    }

    /// Drop every pending send.
    pub fn empty_output_buffer(&self) {
        self.post(AdapterMessage::EmptyOutputBuffer)
    }

    /// A snapshot of the connection state and counters.
    pub fn stats<F>(&self, callback: F)
    where
        F: FnOnce(ConnectionStats) + Send + 'static,
    {
        self.post(AdapterMessage::Stats {
            callback: Box::new(callback),
        })
    }

    /// Received data. Data listeners are not called for empty reads.
    pub fn on_receive(&self) -> &EventChannel<ReceivedData> {
        &self.on_receive
    }

    /// Read errors.
    pub fn on_receive_error(&self) -> &EventChannel<ReceiveError> {
        &self.on_receive_error
    }

    /// The devices available. Always a single placeholder.
    pub fn get_devices<F>(&self, callback: F)
    where
        F: FnOnce(Vec<DeviceInfo>),
    {
        callback(vec![DeviceInfo {
            path: PLACEHOLDER_DEVICE.into(),
        }])
    }

    /// Port information. Always a placeholder.
    pub fn get_info<F>(&self, callback: F)
    where
        F: FnOnce(PortInfo),
    {
        callback(PortInfo::default())
    }

    /// Control signals. Always reported as unset.
    pub fn get_control_signals<F>(&self, callback: F)
    where
        F: FnOnce(ControlSignals),
    {
        callback(ControlSignals::default())
    }

    /// Control signals are not forwarded to the transport. Always reports success.
    pub fn set_control_signals<F>(&self, _signals: ControlSignals, callback: F)
    where
        F: FnOnce(bool),
    {
        callback(true)
    }
}
