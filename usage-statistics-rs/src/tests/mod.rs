//! Tests for the delivery pipeline
//!
//! `sender_tests` drive the queue and sender through an in-memory transport;
//! `collector_tests` exercise the HTTP transport against a WireMock collector
//! that behaves like the real one (201 for valid records, 400 when an
//! identifier is missing).


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::config::UsageStatisticsSettings;
use crate::event::ContextIdentity;
use crate::transport::{DeliveryError, Transport};

pub(crate) const COLLECTOR_PATH: &str = "/great_expectations/v1/usage_statistics";

/// How the in-memory transport answers
#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    Accept,
    Reject,
    Unreachable,
}

/// Records every body it is asked to post
pub(crate) struct RecordingTransport {
    behavior: Behavior,
    delay: Duration,
    attempts: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

impl RecordingTransport {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            attempts: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|body| body["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, body: &Value) -> Result<StatusCode, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.bodies.lock().unwrap().push(body.clone());
        match self.behavior {
            Behavior::Accept => Ok(StatusCode::CREATED),
            Behavior::Reject => Err(DeliveryError::Rejected(StatusCode::BAD_REQUEST)),
            Behavior::Unreachable => Err(DeliveryError::Transport("connection refused".to_string())),
        }
    }
}

pub(crate) fn settings() -> UsageStatisticsSettings {
    let data_context_id = Uuid::parse_str("96c547fe-e809-4f2e-b122-0dc91bb7b3ad").unwrap();
    UsageStatisticsSettings::new(ContextIdentity::new(data_context_id), "0.9.7")
}
