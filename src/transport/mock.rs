//! A mock transport, useful to test the adapter without an actual serial port.
//!
//! Nothing completes on its own.
//! Every call made on the [`MockTransport`] shows up as an [`Operation`] on the
//! paired [`MockController`], and stays pending until the controller responds.
//! This makes it possible to act on the adapter while an operation is in flight.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use bytes::Bytes;
use futures::{
    channel::{mpsc, oneshot},
    FutureExt, StreamExt,
};
use tokio::sync::mpsc as inbox_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};

use super::{Inbox, OpenOptions, Transport, TransportError};

type Reply = Result<(), TransportError>;
type InboxSender = inbox_channel::UnboundedSender<Result<Bytes, TransportError>>;

/// Completes a single pending [`Operation`].
///
/// Dropping it without responding fails the operation with [`TransportError::Disconnected`].
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Reply>);

impl Responder {
    /// Let the operation succeed.
    pub fn succeed(self) {
        self.respond(Ok(()))
    }

    /// Let the operation fail.
    pub fn fail(self, error: TransportError) {
        self.respond(Err(error))
    }

    /// Respond with the given result.
    pub fn respond(self, reply: Reply) {
        if self.0.send(reply).is_err() {
            debug!("Nobody waits for this operation anymore");
        }
    }
}

/// A call made on the [`MockTransport`].
#[derive(Debug)]
pub enum Operation {
    /// [`Transport::open`].
    Open {
        /// The options passed along.
        options: OpenOptions,

        /// Completes the open.
        responder: Responder,
    },

    /// [`Transport::close`].
    Close {
        /// Completes the close.
        responder: Responder,
    },

    /// [`Transport::write`].
    Write {
        /// The hex encoded payload.
        payload: String,

        /// Completes the write.
        responder: Responder,
    },
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Open { options, .. } => write!(f, "open ({options})"),
            Operation::Close { .. } => write!(f, "close"),
            Operation::Write { payload, .. } => write!(f, "write `{payload}`"),
        }
    }
}

impl Operation {
    /// Is this an open?
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Is this a close?
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close { .. })
    }

    /// Is this a write?
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Unwrap an open.
    ///
    /// Panics if it's not.
    pub fn into_open(self) -> (OpenOptions, Responder) {
        match self {
            Operation::Open { options, responder } => (options, responder),
            other => panic!("Expected open, got {other}"),
        }
    }

    /// Unwrap a close.
    ///
    /// Panics if it's not.
    pub fn into_close(self) -> Responder {
        match self {
            Operation::Close { responder } => responder,
            other => panic!("Expected close, got {other}"),
        }
    }

    /// Unwrap a write.
    ///
    /// Panics if it's not.
    pub fn into_write(self) -> (String, Responder) {
        match self {
            Operation::Write { payload, responder } => (payload, responder),
            other => panic!("Expected write, got {other}"),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    inbox: Mutex<Option<InboxSender>>,
    registrations: AtomicUsize,
    refuse_inbox: Mutex<bool>,
}

impl Shared {
    fn inbox(&self) -> std::sync::MutexGuard<'_, Option<InboxSender>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refuse_inbox(&self) -> std::sync::MutexGuard<'_, bool> {
        self.refuse_inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The transport half. Hand this to the adapter.
#[derive(Debug)]
pub struct MockTransport {
    operations: mpsc::UnboundedSender<Operation>,
    shared: Arc<Shared>,
}

/// The controlling half. Keep this in the test.
#[derive(Debug)]
pub struct MockController {
    operations: mpsc::UnboundedReceiver<Operation>,
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a transport and the controller for it.
    pub fn new() -> (Self, MockController) {
        let (operations_tx, operations_rx) = mpsc::unbounded();
        let shared = Arc::new(Shared::default());

        (
            Self {
                operations: operations_tx,
                shared: shared.clone(),
            },
            MockController {
                operations: operations_rx,
                shared,
            },
        )
    }

    fn issue(
        &self,
        make_operation: impl FnOnce(Responder) -> Operation,
    ) -> futures::future::BoxFuture<'static, Reply> {
        let (tx, rx) = oneshot::channel();
        let operation = make_operation(Responder(tx));
        trace!(%operation, "Mock operation issued");

        if self.operations.unbounded_send(operation).is_err() {
            warn!("Mock controller is gone");
        }

        async move { rx.await.unwrap_or(Err(TransportError::Disconnected)) }.boxed()
    }
}

impl Transport for MockTransport {
    fn open(&self, options: OpenOptions) -> futures::future::BoxFuture<'static, Reply> {
        self.issue(|responder| Operation::Open { options, responder })
    }

    fn close(&self) -> futures::future::BoxFuture<'static, Reply> {
        self.issue(|responder| Operation::Close { responder })
    }

    fn write(&self, hex_payload: String) -> futures::future::BoxFuture<'static, Reply> {
        self.issue(|responder| Operation::Write {
            payload: hex_payload,
            responder,
        })
    }

    fn inbox(&self) -> Result<Inbox, TransportError> {
        if *self.shared.refuse_inbox() {
            return Err(TransportError::rejected("inbox refused by mock"));
        }

        let (tx, rx) = inbox_channel::unbounded_channel();

        // A newer registration replaces the previous one.
        *self.shared.inbox() = Some(tx);
        self.shared.registrations.fetch_add(1, Ordering::SeqCst);

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

impl MockController {
    /// Wait for the next operation.
    /// Returns `None` if the transport was dropped.
    pub async fn next_operation(&mut self) -> Option<Operation> {
        self.operations.next().await
    }

    /// The next operation, if one is already pending.
    pub fn try_next_operation(&mut self) -> Option<Operation> {
        self.operations.try_recv().ok()
    }

    /// Put bytes on the current inbox, as if read from the wire.
    ///
    /// Returns false if no inbox is registered or the reader went away.
    pub fn inject_data<B: Into<Bytes>>(&self, data: B) -> bool {
        self.inject(Ok(data.into()))
    }

    /// Put an error on the current inbox, as if reading failed.
    ///
    /// Returns false if no inbox is registered or the reader went away.
    pub fn inject_error(&self, error: TransportError) -> bool {
        self.inject(Err(error))
    }

    fn inject(&self, item: Result<Bytes, TransportError>) -> bool {
        match self.shared.inbox().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// How many times an inbox was registered on the transport.
    pub fn inbox_registrations(&self) -> usize {
        self.shared.registrations.load(Ordering::SeqCst)
    }

    /// Make future inbox registrations fail.
    pub fn refuse_inbox(&self, refuse: bool) {
        *self.shared.refuse_inbox() = refuse;
    }
}
