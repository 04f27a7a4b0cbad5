//! Background sender: drains the delivery queue into the transport.
//!
//! Every outcome is contained here. Nothing the collector or the network does
//! can reach the code that emitted the record.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use error_handling::RetryPolicy;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::EventRecord;
use crate::queue::QueueConsumer;
use crate::transport::{DeliveryError, Transport};

/// Counters shared by the handler and the sender
#[derive(Debug, Default)]
pub struct DeliveryStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub failed: u64,
    /// Emitted after the queue was closed
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// What happened during shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub stats: DeliverySnapshot,
    /// Records queued or mid-request when the grace period ran out
    pub abandoned: usize,
    pub timed_out: bool,
}

pub struct BackgroundSender {
    consumer: QueueConsumer,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    stats: Arc<DeliveryStats>,
    /// 1 while a record is taken off the queue but has no outcome yet
    in_flight: Arc<AtomicUsize>,
}

impl BackgroundSender {
    pub fn new(
        consumer: QueueConsumer,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        stats: Arc<DeliveryStats>,
    ) -> Self {
        Self {
            consumer,
            transport,
            policy,
            stats,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Starts the sender on the current tokio runtime
    pub fn spawn(self) -> SenderHandle {
        let shutdown = CancellationToken::new();
        let depth = self.consumer.depth_gauge();
        let in_flight = Arc::clone(&self.in_flight);
        let stats = Arc::clone(&self.stats);
        let join = tokio::spawn(self.run(shutdown.clone()));

        SenderHandle {
            join,
            shutdown,
            depth,
            in_flight,
            stats,
        }
    }

    async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.consumer.next() => match next {
                    Some(record) => self.deliver(record).await,
                    None => return,
                },
            }
        }

        // No new records from here on; flush what is already buffered.
        self.consumer.close();
        let pending = self.consumer.depth();
        debug!(pending, "Flushing usage statistics queue");
        while let Some(record) = self.consumer.next().await {
            self.deliver(record).await;
        }
        debug!("Usage statistics queue drained");
    }

    /// The record stays counted as in flight until it has an outcome, so an
    /// abort mid-request leaves it visible to [`SenderHandle::drain`].
    async fn deliver(&self, record: EventRecord) {
        self.in_flight.store(1, Ordering::SeqCst);
        self.attempt(&record).await;
        self.in_flight.store(0, Ordering::SeqCst);
    }

    async fn attempt(&self, record: &EventRecord) {
        let body = match record.to_body() {
            Ok(body) => body,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(event = %record.event(), error = %e, "Dropping malformed usage statistics record");
                return;
            }
        };

        match self.policy.run(|| self.transport.post(&body)).await {
            Ok(status) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(event = %record.event(), status = %status, "Usage statistics event delivered");
            }
            Err(DeliveryError::Rejected(status)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(event = %record.event(), status = %status, "Collector rejected usage statistics record");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                debug!(event = %record.event(), error = %e, "Unable to deliver usage statistics event");
            }
        }
    }
}

/// Owner of the running sender task
#[derive(Debug)]
pub struct SenderHandle {
    join: JoinHandle<()>,
    shutdown: CancellationToken,
    depth: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    stats: Arc<DeliveryStats>,
}

impl SenderHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Flushes the queue, waiting at most `grace`. The task is aborted if it
    /// is still busy when the grace period ends.
    pub async fn drain(self, grace: Duration) -> DrainReport {
        self.shutdown.cancel();

        let mut join = self.join;
        let timed_out = match timeout(grace, &mut join).await {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                debug!(error = %e, "Usage statistics sender ended abnormally");
                false
            }
            Err(_) => {
                join.abort();
                true
            }
        };

        let abandoned =
            self.depth.load(Ordering::SeqCst) + self.in_flight.load(Ordering::SeqCst);
        if timed_out {
            debug!(abandoned, grace_ms = grace.as_millis() as u64, "Usage statistics flush cut short");
        }

        DrainReport {
            stats: self.stats.snapshot(),
            abandoned,
            timed_out,
        }
    }
}
