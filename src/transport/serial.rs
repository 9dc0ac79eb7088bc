//! A transport over an actual serial port.

use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use bytes::BytesMut;
use futures::{future::BoxFuture, FutureExt, StreamExt, TryStreamExt};
use tokio::{
    io::{AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, info, warn};

use super::{Inbox, OpenOptions, Transport, TransportError};

type Reader = Arc<SyncMutex<Option<ReadHalf<SerialStream>>>>;
type Writer = Arc<Mutex<Option<WriteHalf<SerialStream>>>>;

/// A [`Transport`] bound to a single serial port.
/// The tty should likely be along the lines of `/dev/ttyACMx` on unix, and `COMx` on Windows.
///
/// The halves are locked separately: a write in flight holds the writer across awaits,
/// while the reader is only ever taken or replaced.
#[derive(Clone)]
pub struct SerialTransport {
    path: String,
    reader: Reader,
    writer: Writer,
}

fn set_reader(reader: &Reader, half: Option<ReadHalf<SerialStream>>) {
    *reader.lock().unwrap_or_else(PoisonError::into_inner) = half;
}

impl SerialTransport {
    /// A transport for the port at `path`. Nothing is opened until [`Transport::open`].
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            reader: Arc::default(),
            writer: Arc::default(),
        }
    }

    /// The path of the port.
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn try_open(path: &str, options: OpenOptions) -> Result<SerialStream, TransportError> {
    if options.sleep_on_pause {
        debug!("Serial ports do not sleep on pause here, ignoring");
    }

    let stream = tokio_serial::new(path, options.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()?;

    Ok(stream)
}

impl Transport for SerialTransport {
    fn open(&self, options: OpenOptions) -> BoxFuture<'static, Result<(), TransportError>> {
        let path = self.path.clone();
        let reader = self.reader.clone();
        let writer = self.writer.clone();

        async move {
            let stream = try_open(&path, options)?;
            let (read_half, write_half) = tokio::io::split(stream);

            let mut writer = writer.lock().await;
            if writer.is_some() {
                warn!(%path, "Port was already open, replacing it");
            }
            *writer = Some(write_half);
            set_reader(&reader, Some(read_half));

            info!(%path, %options, "Serial port open");
            Ok(())
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let path = self.path.clone();
        let reader = self.reader.clone();
        let writer = self.writer.clone();

        async move {
            // The reader may already have been handed out as an inbox,
            // in which case it closes when that inbox is dropped.
            set_reader(&reader, None);

            match writer.lock().await.take() {
                Some(mut writer) => {
                    writer.shutdown().await?;
                    info!(%path, "Serial port closed");
                    Ok(())
                }
                None => Err(TransportError::NotOpen),
            }
        }
        .boxed()
    }

    fn write(&self, hex_payload: String) -> BoxFuture<'static, Result<(), TransportError>> {
        let writer = self.writer.clone();

        async move {
            let bytes = hex::decode(hex_payload)?;

            let mut writer = writer.lock().await;
            let writer = writer.as_mut().ok_or(TransportError::NotOpen)?;

            writer.write_all(&bytes).await?;
            writer.flush().await?;

            Ok(())
        }
        .boxed()
    }

    fn inbox(&self) -> Result<Inbox, TransportError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TransportError::NotOpen)?;

        Ok(FramedRead::new(reader, BytesCodec::new())
            .map_ok(BytesMut::freeze)
            .map_err(TransportError::from)
            .boxed())
    }
}
