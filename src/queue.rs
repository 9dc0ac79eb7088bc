use std::collections::VecDeque;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// What a send callback receives once its chunk is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendInfo {
    /// The number of bytes written.
    pub bytes_sent: usize,
}

pub(crate) type SendCallback = Box<dyn FnOnce(SendInfo) + Send>;

/// One pending write.
pub(crate) struct OutputItem {
    pub(crate) data: Bytes,
    pub(crate) callback: SendCallback,
}

impl OutputItem {
    pub(crate) fn new(data: Bytes, callback: SendCallback) -> Self {
        Self { data, callback }
    }
}

impl std::fmt::Debug for OutputItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputItem")
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Nothing is being written and nothing is waiting to be.
    Idle,

    /// The head of the queue is being written.
    Writing { write: u64 },

    /// The drain gave up without emptying the queue.
    /// It stays this way until the queue is emptied or the drain is resumed.
    Stalled,
}

/// A write which has been handed to the transport.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub(crate) write: u64,
    pub(crate) data: Bytes,
}

/// The outcome of a successful write.
#[derive(Debug)]
pub(crate) struct CompletedWrite {
    pub(crate) item: OutputItem,

    /// Queued items dropped because the queue was over capacity.
    pub(crate) dropped: usize,
}

/// Pending writes, written one at a time in the order they were queued.
#[derive(Debug)]
pub(crate) struct SendQueue {
    items: VecDeque<OutputItem>,
    cap: usize,
    drain: Drain,
    next_write: u64,
}

impl SendQueue {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::new(),
            cap,
            drain: Drain::Idle,
            next_write: 0,
        }
    }

    pub(crate) fn push(&mut self, item: OutputItem) {
        self.items.push_back(item);
        trace!(queued = self.items.len(), "Item queued");
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a drain may be started.
    pub(crate) fn is_idle(&self) -> bool {
        self.drain == Drain::Idle
    }

    pub(crate) fn is_stalled(&self) -> bool {
        self.drain == Drain::Stalled
    }

    /// Leave the head in place and stop draining.
    pub(crate) fn stall(&mut self) {
        self.drain = Drain::Stalled;
    }

    /// Start writing the head of the queue.
    /// Returns `None`, and goes idle, if there is nothing to write.
    pub(crate) fn begin_write(&mut self) -> Option<PendingWrite> {
        let Some(head) = self.items.front() else {
            self.drain = Drain::Idle;
            return None;
        };

        let write = self.next_write;
        self.next_write += 1;
        self.drain = Drain::Writing { write };

        Some(PendingWrite {
            write,
            data: head.data.clone(),
        })
    }

    fn is_current(&self, write: u64) -> bool {
        self.drain == Drain::Writing { write }
    }

    /// The head was written.
    ///
    /// Returns `None` if the write is not the one in flight,
    /// e.g. because the queue was emptied while it was being written.
    pub(crate) fn finish_write(&mut self, write: u64) -> Option<CompletedWrite> {
        if !self.is_current(write) {
            return None;
        }

        // The head counts towards the cap.
        let dropped = self.items.len().saturating_sub(self.cap);
        if dropped > 0 {
            self.items.truncate(self.cap);
            warn!(dropped, cap = self.cap, "Send queue over capacity, dropped newest items");
        }

        let item = self.items.pop_front()?;
        self.drain = Drain::Idle;

        Some(CompletedWrite { item, dropped })
    }

    /// The head could not be written. It stays put and the drain stalls.
    ///
    /// Returns false if the write is not the one in flight.
    pub(crate) fn fail_write(&mut self, write: u64) -> bool {
        if !self.is_current(write) {
            return false;
        }

        self.stall();
        true
    }

    /// Drop every queued item and stop draining.
    /// Returns the number of items dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        self.drain = Drain::Idle;

        dropped
    }
}
