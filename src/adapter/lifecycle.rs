//! The task which owns an adapter's state.
//!
//! Requests from [`SerialAdapter`](super::SerialAdapter) handles and completions of transport
//! operations both arrive here, and are handled one at a time.
//! A transport operation is issued in one step and its completion is handled in a later one,
//! so anything read before issuing may be stale by the time it completes.
//! The exception is a [`ConnectionRequest`]'s cancellation, which is what the open completion checks.

use std::sync::Arc;

use bytes::Bytes;
use futures::{channel::mpsc, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use super::{
    state::ConnectionState, AdapterMessage, ConnectCallback, ConnectionId, ConnectionInfo,
    DisconnectCallback,
};
use crate::{
    config::{Config, DrainPolicy},
    events::{EventChannel, ReceiveError, ReceivedData},
    queue::{CompletedWrite, OutputItem, PendingWrite, SendCallback, SendInfo, SendQueue},
    request::{ConnectOptions, ConnectionRequest},
    transport::{encode_payload, OpenOptions, Transport, TransportError},
};

/// A transport operation completed, or something arrived from the wire.
enum Completion {
    Opened {
        request: Arc<ConnectionRequest>,
        callback: ConnectCallback,
        result: Result<(), TransportError>,
    },
    Closed {
        connection_id: ConnectionId,
        callback: DisconnectCallback,
        result: Result<(), TransportError>,
    },
    Written {
        write: u64,
        result: Result<(), TransportError>,
    },
    Inbound {
        connection_id: ConnectionId,
        item: Result<Bytes, TransportError>,
    },
}

pub(crate) struct Lifecycle {
    transport: Arc<dyn Transport>,
    config: Config,

    // Requests from adapter handles
    messages: mpsc::UnboundedReceiver<AdapterMessage>,

    // Spawned transport operations report back here
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,

    state: ConnectionState,

    // The newest connect attempt, until its open completes
    current_request: Option<Arc<ConnectionRequest>>,

    queue: SendQueue,

    on_receive: EventChannel<ReceivedData>,
    on_receive_error: EventChannel<ReceiveError>,

    // Forwards the transport's inbox to us
    inbound: Option<JoinHandle<()>>,

    connections_opened: u32,
}

impl Lifecycle {
    pub(crate) fn new<T: Transport>(
        transport: T,
        config: Config,
        messages: mpsc::UnboundedReceiver<AdapterMessage>,
        on_receive: EventChannel<ReceivedData>,
        on_receive_error: EventChannel<ReceiveError>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded();

        Self {
            transport: Arc::new(transport),
            queue: SendQueue::new(config.queue_cap),
            config,
            messages,
            completions_tx,
            completions,
            state: ConnectionState::default(),
            current_request: None,
            on_receive,
            on_receive_error,
            inbound: None,
            connections_opened: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Adapter running");

        loop {
            tokio::select! {
                // A caller's request always goes before completions which arrived after it.
                biased;

                message = self.messages.next() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                Some(completion) = self.completions.next() => self.handle_completion(completion),
            }
        }

        self.shutdown();
    }

    fn handle_message(&mut self, message: AdapterMessage) {
        match message {
            AdapterMessage::Connect {
                path,
                options,
                callback,
            } => self.connect(&path, options, callback),
            AdapterMessage::Disconnect { callback } => self.disconnect(callback),
            AdapterMessage::Send { data, callback } => self.send(data, callback),
            AdapterMessage::EmptyOutputBuffer => self.empty_output_buffer(),
            AdapterMessage::Stats { callback } => callback(self.state.stats()),
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Opened {
                request,
                callback,
                result,
            } => self.opened(request, callback, result),
            Completion::Closed {
                connection_id,
                callback,
                result,
            } => self.closed(connection_id, callback, result),
            Completion::Written { write, result } => self.written(write, result),
            Completion::Inbound {
                connection_id,
                item,
            } => self.inbound(connection_id, item),
        }
    }

    fn connect(&mut self, path: &str, options: ConnectOptions, callback: ConnectCallback) {
        let request = Arc::new(ConnectionRequest::new(path, options));

        if let Some(previous) = self.current_request.replace(request.clone()) {
            if previous.is_pending() {
                debug!(%previous, "Superseded by a newer connect");
            }
        }

        if let Some(connection_id) = self.state.connection_id() {
            warn!(%connection_id, "Connecting while already connected");
        }

        let open_options = OpenOptions {
            baud_rate: options.bitrate,
            sleep_on_pause: self.config.sleep_on_pause,
        };

        info!(%request, %open_options, "Connecting");

        let open = self.transport.open(open_options);
        let completions = self.completions_tx.clone();
        let span = info_span!("open", request = %request.id());

        tokio::spawn(
            async move {
                let result = open.await;

                if completions
                    .unbounded_send(Completion::Opened {
                        request,
                        callback,
                        result,
                    })
                    .is_err()
                {
                    debug!("Adapter stopped before the open completed");
                }
            }
            .instrument(span),
        );
    }

    fn opened(
        &mut self,
        request: Arc<ConnectionRequest>,
        callback: ConnectCallback,
        result: Result<(), TransportError>,
    ) {
        if self
            .current_request
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, &request))
        {
            self.current_request = None;
        }

        match (result, request.is_canceled()) {
            (Ok(()), false) => self.establish(&request, callback),
            (Ok(()), true) => {
                info!(%request, "Opened after being canceled, closing again");
                self.close_silently(&request);
            }
            (Err(e), true) => {
                debug!(%request, ?e, "Open failed after being canceled");
            }
            (Err(e), false) => {
                warn!(%request, ?e, "Open failed");
                self.state.record_failure();
                callback(Err(e.into()));
            }
        }
    }

    fn establish(&mut self, request: &ConnectionRequest, callback: ConnectCallback) {
        request.fulfil();

        self.connections_opened += 1;
        let connection_id = ConnectionId::new(self.connections_opened);
        let bitrate = request.options().bitrate;

        self.state.establish(connection_id, bitrate);
        self.attach_inbox(connection_id);

        info!(%request, %connection_id, "Connected");
        callback(Ok(ConnectionInfo {
            connection_id,
            bitrate,
        }));

        if self.config.drain_policy == DrainPolicy::Resume && self.queue.is_stalled() {
            debug!("Resuming stalled send queue");
            self.drain();
        }
    }

    fn close_silently(&self, request: &ConnectionRequest) {
        let close = self.transport.close();
        let span = info_span!("close-canceled", request = %request.id());

        tokio::spawn(
            async move {
                match close.await {
                    Ok(()) => debug!("Canceled connection closed"),
                    Err(e) => warn!(?e, "Could not close canceled connection"),
                }
            }
            .instrument(span),
        );
    }

    fn attach_inbox(&mut self, connection_id: ConnectionId) {
        self.detach_inbox();

        let mut inbox = match self.transport.inbox() {
            Ok(inbox) => inbox,
            Err(e) => {
                warn!(%connection_id, ?e, "Could not register for reads, nothing will be received");
                return;
            }
        };

        let completions = self.completions_tx.clone();
        let span = info_span!("inbox", %connection_id);

        self.inbound = Some(tokio::spawn(
            async move {
                while let Some(item) = inbox.next().await {
                    if completions
                        .unbounded_send(Completion::Inbound {
                            connection_id,
                            item,
                        })
                        .is_err()
                    {
                        break;
                    }
                }

                debug!("Inbox closed");
            }
            .instrument(span),
        ));
    }

    fn detach_inbox(&mut self) {
        if let Some(inbound) = self.inbound.take() {
            inbound.abort();
        }
    }

    fn detach_listeners(&mut self) {
        self.detach_inbox();
        self.on_receive.clear();
        self.on_receive_error.clear();
    }

    fn disconnect(&mut self, callback: DisconnectCallback) {
        let Some(connection_id) = self.state.connection_id() else {
            self.cancel_current_request();
            return;
        };

        self.empty_output_buffer();
        self.detach_listeners();

        info!(%connection_id, "Disconnecting");

        let close = self.transport.close();
        let completions = self.completions_tx.clone();
        let span = info_span!("close", %connection_id);

        tokio::spawn(
            async move {
                let result = close.await;

                if completions
                    .unbounded_send(Completion::Closed {
                        connection_id,
                        callback,
                        result,
                    })
                    .is_err()
                {
                    debug!("Adapter stopped before the close completed");
                }
            }
            .instrument(span),
        );
    }

    /// There is no connection to close, so there is nothing to report yet.
    /// Whatever the pending open results in is dealt with when it completes.
    fn cancel_current_request(&mut self) {
        match &self.current_request {
            Some(request) if request.is_pending() => {
                request.cancel();
                info!(%request, "Canceled connect in flight");
            }
            Some(request) => debug!(%request, "Connect already settled, nothing to cancel"),
            None => debug!("Not connected, nothing to disconnect"),
        }
    }

    fn closed(
        &mut self,
        connection_id: ConnectionId,
        callback: DisconnectCallback,
        result: Result<(), TransportError>,
    ) {
        match &result {
            Ok(()) => info!(%connection_id, "Disconnected"),
            Err(e) => warn!(%connection_id, ?e, "Close failed, considering it closed anyway"),
        }

        // A connect may have completed while closing.
        if self.state.connection_id() == Some(connection_id) {
            self.state.reset();
        }

        callback(result.is_ok());
    }

    fn send(&mut self, data: Bytes, callback: SendCallback) {
        self.queue.push(OutputItem::new(data, callback));

        if self.queue.is_idle() {
            self.drain();
        } else if self.queue.is_stalled() && self.config.drain_policy == DrainPolicy::Resume {
            debug!("Resuming stalled send queue");
            self.drain();
        }
    }

    fn drain(&mut self) {
        let Some(connection_id) = self.state.connection_id() else {
            if !self.queue.is_empty() {
                debug!(queued = self.queue.len(), "Not connected, send queue stalls");
                self.queue.stall();
            }
            return;
        };

        let Some(PendingWrite { write, data }) = self.queue.begin_write() else {
            trace!("Send queue drained");
            return;
        };

        let write_op = self.transport.write(encode_payload(&data));
        let completions = self.completions_tx.clone();
        let span = info_span!("write", %connection_id, write);

        tokio::spawn(
            async move {
                let result = write_op.await;

                if completions
                    .unbounded_send(Completion::Written { write, result })
                    .is_err()
                {
                    debug!("Adapter stopped before the write completed");
                }
            }
            .instrument(span),
        );
    }

    fn written(&mut self, write: u64, result: Result<(), TransportError>) {
        if let Err(e) = result {
            if self.queue.fail_write(write) {
                error!(?e, queued = self.queue.len(), "Write failed, send queue stalls");
                self.state.record_failure();
            } else {
                debug!(?e, "Write failed after its queue was emptied");
            }
            return;
        }

        let Some(CompletedWrite { item, dropped }) = self.queue.finish_write(write) else {
            debug!(write, "Write completed after its queue was emptied");
            return;
        };

        if dropped > 0 {
            debug!(dropped, "Callbacks of dropped sends will not be called");
        }

        let bytes_sent = item.data.len();
        self.state.record_sent(bytes_sent);
        (item.callback)(SendInfo { bytes_sent });

        self.drain();
    }

    fn empty_output_buffer(&mut self) {
        let dropped = self.queue.clear();

        if dropped > 0 {
            debug!(dropped, "Output buffer emptied");
        }
    }

    fn inbound(&mut self, connection_id: ConnectionId, item: Result<Bytes, TransportError>) {
        if self.state.connection_id() != Some(connection_id) {
            trace!(%connection_id, "Inbound for a connection which is gone");
            return;
        }

        match item {
            Ok(data) => {
                self.state.record_received(data.len());
                self.on_receive.dispatch(&ReceivedData {
                    connection_id,
                    data,
                });
            }
            Err(error) => {
                warn!(%connection_id, ?error, "Read error");
                self.on_receive_error.dispatch(&ReceiveError {
                    connection_id,
                    error,
                });
            }
        }
    }

    fn shutdown(&mut self) {
        debug!("Every adapter handle dropped, stopping");

        self.detach_inbox();
        self.queue.clear();

        if let Some(connection_id) = self.state.connection_id() {
            let close = self.transport.close();

            tokio::spawn(
                async move {
                    if let Err(e) = close.await {
                        warn!(?e, "Could not close connection on shutdown");
                    }
                }
                .instrument(info_span!("close-on-shutdown", %connection_id)),
            );
        }
    }
}
