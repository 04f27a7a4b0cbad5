//! Entry point used by the host: emit events, shut down with a bounded flush.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::anonymizer::Anonymizer;
use crate::config::UsageStatisticsSettings;
use crate::event::{ContextIdentity, EventRecord};
use crate::queue::{delivery_queue, QueueProducer};
use crate::sender::{BackgroundSender, DeliverySnapshot, DeliveryStats, DrainReport, SenderHandle};
use crate::transport::{HttpTransport, Transport};

pub struct UsageStatisticsHandler {
    identity: ContextIdentity,
    library_version: String,
    anonymizer: Anonymizer,
    producer: Option<QueueProducer>,
    sender: Mutex<Option<SenderHandle>>,
    stats: Arc<DeliveryStats>,
}

impl UsageStatisticsHandler {
    /// Starts the background sender. Must run inside a tokio runtime.
    pub fn start(settings: &UsageStatisticsSettings, transport: Arc<dyn Transport>) -> Self {
        if !settings.enabled {
            return Self::disabled(settings.identity, &settings.library_version);
        }

        let (producer, consumer) = delivery_queue();
        let stats = Arc::new(DeliveryStats::default());
        let sender =
            BackgroundSender::new(consumer, transport, settings.retry, Arc::clone(&stats)).spawn();

        debug!(
            data_context_id = %settings.identity.data_context_id,
            instance_id = %settings.identity.data_context_instance_id,
            "Usage statistics enabled"
        );

        Self {
            identity: settings.identity,
            library_version: settings.library_version.clone(),
            anonymizer: Anonymizer::new(settings.identity.data_context_id),
            producer: Some(producer),
            sender: Mutex::new(Some(sender)),
            stats,
        }
    }

    /// Starts with an HTTP transport to `settings.url`. Comes up disabled
    /// rather than failing when the HTTP client cannot be built.
    pub fn from_settings(settings: &UsageStatisticsSettings) -> Self {
        if !settings.enabled {
            return Self::disabled(settings.identity, &settings.library_version);
        }

        match HttpTransport::new(
            settings.url.clone(),
            settings.request_timeout,
            settings.connect_timeout,
        ) {
            Ok(transport) => Self::start(settings, Arc::new(transport)),
            Err(e) => {
                debug!(error = %e, "Usage statistics disabled");
                Self::disabled(settings.identity, &settings.library_version)
            }
        }
    }

    /// A handler whose emits are no-ops
    pub fn disabled(identity: ContextIdentity, library_version: &str) -> Self {
        Self {
            identity,
            library_version: library_version.to_string(),
            anonymizer: Anonymizer::new(identity.data_context_id),
            producer: None,
            sender: Mutex::new(None),
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.producer.is_some()
    }

    pub fn identity(&self) -> ContextIdentity {
        self.identity
    }

    pub fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// Records one event. Never blocks and never fails.
    pub fn emit(&self, event: &str, payload: Value, success: bool) {
        let Some(producer) = &self.producer else {
            return;
        };

        let record = EventRecord::new(
            event,
            payload,
            success,
            self.identity,
            self.library_version.as_str(),
        );
        match producer.push(record) {
            Ok(()) => self.stats.record_enqueued(),
            Err(e) => {
                self.stats.record_dropped();
                debug!(event, error = %e, "Usage statistics event dropped");
            }
        }
    }

    /// Flushes queued events for at most `grace`. Later calls only report
    /// the counters.
    pub async fn shutdown(&self, grace: Duration) -> DrainReport {
        let sender = self.sender.lock().await.take();
        match sender {
            Some(sender) => sender.drain(grace).await,
            None => DrainReport {
                stats: self.stats.snapshot(),
                ..DrainReport::default()
            },
        }
    }
}
