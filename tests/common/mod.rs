#![allow(dead_code)]

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serial_adapter::{
    adapter::state::ConnectionStats,
    transport::{
        mock::{MockController, MockTransport, Operation},
        OpenOptions,
    },
    Config, ConnectOptions, ConnectionInfo, Error, SerialAdapter,
};
use tokio::{sync::mpsc, time::timeout};

/// How long to wait for something which should happen.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// How long to wait before concluding something did not happen.
pub const QUIET: Duration = Duration::from_millis(100);

pub type ConnectResult = Result<ConnectionInfo, Error>;

pub fn start_adapter() -> (SerialAdapter, MockController) {
    start_adapter_with_config(Config::default())
}

pub fn start_adapter_with_config(config: Config) -> (SerialAdapter, MockController) {
    let (transport, controller) = MockTransport::new();
    let adapter = SerialAdapter::new(transport, config).expect("Config should be valid");

    (adapter, controller)
}

/// A callback which forwards whatever it is called with.
/// The receiver yields nothing if the callback is dropped without being called.
pub fn callback<T: Send + 'static>() -> (impl FnOnce(T) + Send + 'static, Callback<T>) {
    let (tx, rx) = mpsc::unbounded_channel();

    (
        move |value| {
            let _ = tx.send(value);
        },
        Callback(rx),
    )
}

/// The receiving end of [`callback`].
pub struct Callback<T>(mpsc::UnboundedReceiver<T>);

impl<T> Callback<T> {
    /// Wait for the callback to be called.
    pub async fn called(&mut self) -> Result<T> {
        timeout(PATIENCE, self.0.recv())
            .await?
            .ok_or_else(|| eyre!("Callback dropped without being called"))
    }

    /// Check the callback is not called any time soon.
    pub async fn not_called(&mut self) -> Result<()> {
        match timeout(QUIET, self.0.recv()).await {
            Ok(Some(_)) => Err(eyre!("Callback was called")),
            // Dropped, or still waiting: either way not called.
            Ok(None) | Err(_) => Ok(()),
        }
    }
}

/// Forwards every call of a repeatedly called closure.
pub struct Calls<T>(mpsc::UnboundedReceiver<T>);

pub fn calls<T: Send + 'static>() -> (mpsc::UnboundedSender<T>, Calls<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Calls(rx))
}

impl<T> Calls<T> {
    pub async fn next(&mut self) -> Result<T> {
        timeout(PATIENCE, self.0.recv())
            .await?
            .ok_or_else(|| eyre!("All senders dropped"))
    }

    pub async fn none(&mut self) -> Result<()> {
        match timeout(QUIET, self.0.recv()).await {
            Ok(Some(_)) => Err(eyre!("Unexpected call")),
            Ok(None) | Err(_) => Ok(()),
        }
    }
}

pub async fn next_operation(controller: &mut MockController) -> Result<Operation> {
    timeout(PATIENCE, controller.next_operation())
        .await?
        .ok_or_else(|| eyre!("Transport dropped"))
}

/// Check no transport operation shows up any time soon.
pub async fn no_operation(controller: &mut MockController) -> Result<()> {
    match timeout(QUIET, controller.next_operation()).await {
        Ok(Some(operation)) => Err(eyre!("Unexpected operation: {operation}")),
        Ok(None) | Err(_) => Ok(()),
    }
}

/// Connect and let the open succeed.
pub async fn connect(
    adapter: &SerialAdapter,
    controller: &mut MockController,
    bitrate: u32,
) -> Result<ConnectionInfo> {
    let (cb, mut connected) = callback::<ConnectResult>();
    adapter.connect("/dev/ttyMock", ConnectOptions::with_bitrate(bitrate), cb);

    let (options, responder) = next_operation(controller).await?.into_open();
    assert_eq!(
        options,
        OpenOptions {
            baud_rate: bitrate,
            sleep_on_pause: false
        }
    );
    responder.succeed();

    Ok(connected.called().await??)
}

/// Disconnect and let the close succeed.
pub async fn disconnect(adapter: &SerialAdapter, controller: &mut MockController) -> Result<bool> {
    let (cb, mut disconnected) = callback::<bool>();
    adapter.disconnect(cb);

    next_operation(controller).await?.into_close().succeed();

    disconnected.called().await
}

pub async fn stats(adapter: &SerialAdapter) -> Result<ConnectionStats> {
    let (cb, mut stats) = callback::<ConnectionStats>();
    adapter.stats(cb);

    stats.called().await
}
