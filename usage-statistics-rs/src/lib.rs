//! # Usage Statistics
//!
//! Best-effort delivery of anonymized usage events to a remote collector.
//! Events are queued at the call site without waiting, delivered by a
//! background task, and flushed within a bounded grace period on shutdown.
//! Network failures are absorbed by the sender and never reach the caller.

pub mod anonymizer;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod queue;
pub mod sender;
pub mod transport;

#[cfg(test)]
mod tests;

pub use anonymizer::Anonymizer;
pub use config::{
    UsageStatisticsSettings, DEFAULT_USAGE_STATISTICS_URL, USAGE_STATISTICS_ENABLED_ENV,
    USAGE_STATISTICS_URL_ENV,
};
pub use error::UsageStatisticsError;
pub use event::{ContextIdentity, EventRecord, SCHEMA_VERSION};
pub use handler::UsageStatisticsHandler;
pub use queue::{delivery_queue, QueueConsumer, QueueError, QueueProducer};
pub use sender::{BackgroundSender, DeliverySnapshot, DeliveryStats, DrainReport, SenderHandle};
pub use transport::{DeliveryError, HttpTransport, Transport};
