//! Delivery queue between producer call sites and the background sender.
//!
//! Pushing never waits: the channel is unbounded and the producer never
//! touches a lock the sender holds while a request is in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::EventRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Delivery queue is closed")]
    Closed,
}

/// Creates an empty queue
pub fn delivery_queue() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueProducer {
            tx,
            depth: Arc::clone(&depth),
        },
        QueueConsumer { rx, depth },
    )
}

/// Write side, cloned into every call site
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::UnboundedSender<EventRecord>,
    depth: Arc<AtomicUsize>,
}

impl QueueProducer {
    pub fn push(&self, record: EventRecord) -> Result<(), QueueError> {
        // Count before sending so the consumer never observes a negative depth.
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.tx.send(record).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            QueueError::Closed
        })
    }

    /// Records waiting for the sender
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side, owned by the background sender
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<EventRecord>,
    depth: Arc<AtomicUsize>,
}

impl QueueConsumer {
    /// Oldest pending record; `None` once closed and empty
    pub async fn next(&mut self) -> Option<EventRecord> {
        let record = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(record)
    }

    /// Refuses further pushes; buffered records stay readable
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub(crate) fn depth_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.depth)
    }
}
