//! Usage statistics event records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::UsageStatisticsError;

/// Version of the record schema understood by the collector
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Identifiers stamped on every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextIdentity {
    /// Stable for the lifetime of an installation
    pub data_context_id: Uuid,
    /// Unique per process run
    pub data_context_instance_id: Uuid,
}

impl ContextIdentity {
    /// Identity for a known installation with a fresh instance id
    pub fn new(data_context_id: Uuid) -> Self {
        Self {
            data_context_id,
            data_context_instance_id: Uuid::new_v4(),
        }
    }

    /// Identity for an installation that has no stored id yet
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// One reportable library action, exactly as posted to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    event: String,
    event_payload: Value,
    success: bool,
    version: String,
    #[serde(with = "event_time")]
    event_time: DateTime<Utc>,
    data_context_id: Uuid,
    data_context_instance_id: Uuid,
    ge_version: String,
}

impl EventRecord {
    pub fn new(
        event: impl Into<String>,
        event_payload: Value,
        success: bool,
        identity: ContextIdentity,
        library_version: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            event_payload,
            success,
            version: SCHEMA_VERSION.to_string(),
            event_time: Utc::now(),
            data_context_id: identity.data_context_id,
            data_context_instance_id: identity.data_context_instance_id,
            ge_version: library_version.into(),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn payload(&self) -> &Value {
        &self.event_payload
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    pub fn identity(&self) -> ContextIdentity {
        ContextIdentity {
            data_context_id: self.data_context_id,
            data_context_instance_id: self.data_context_instance_id,
        }
    }

    pub fn library_version(&self) -> &str {
        &self.ge_version
    }

    /// Local checks for records the collector would refuse
    pub fn validate(&self) -> Result<(), UsageStatisticsError> {
        if self.event.trim().is_empty() {
            return Err(UsageStatisticsError::InvalidRecord(
                "event name is empty".to_string(),
            ));
        }
        if self.ge_version.trim().is_empty() {
            return Err(UsageStatisticsError::InvalidRecord(format!(
                "library version is empty for event {}",
                self.event
            )));
        }
        if !self.event_payload.is_object() {
            return Err(UsageStatisticsError::InvalidRecord(format!(
                "payload of event {} is not an object",
                self.event
            )));
        }
        Ok(())
    }

    /// The JSON request body
    pub fn to_body(&self) -> Result<Value, UsageStatisticsError> {
        self.validate()?;
        serde_json::to_value(self).map_err(|e| UsageStatisticsError::Serialization(e.to_string()))
    }
}

/// `2020-03-28T01:14:21.155Z`
mod event_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ContextIdentity {
        ContextIdentity {
            data_context_id: Uuid::parse_str("96c547fe-e809-4f2e-b122-0dc91bb7b3ad").unwrap(),
            data_context_instance_id: Uuid::parse_str("445a8ad1-2bd0-45ce-bb6b-d066afe996dd")
                .unwrap(),
        }
    }

    #[test]
    fn test_record_wire_shape() {
        let record = EventRecord::new(
            "data_context.__init__",
            json!({"platform.system": "linux"}),
            true,
            identity(),
            "0.9.7",
        );
        let body = record.to_body().unwrap();
        let object = body.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "data_context_id",
                "data_context_instance_id",
                "event",
                "event_payload",
                "event_time",
                "ge_version",
                "success",
                "version",
            ]
        );
        assert_eq!(body["event"], "data_context.__init__");
        assert_eq!(body["version"], SCHEMA_VERSION);
        assert_eq!(body["data_context_id"], "96c547fe-e809-4f2e-b122-0dc91bb7b3ad");
        assert_eq!(body["success"], true);
    }

    #[test]
    fn test_event_time_has_millisecond_precision() {
        let record = EventRecord::new("x", json!({}), true, identity(), "1.0");
        let body = record.to_body().unwrap();
        let raw = body["event_time"].as_str().unwrap();

        // 2020-03-28T01:14:21.155Z
        assert_eq!(raw.len(), 24);
        assert!(raw.ends_with('Z'));
        assert_eq!(&raw[19..20], ".");
    }

    #[test]
    fn test_record_parses_collector_sample() {
        let sample = json!({
            "event_payload": {"platform.system": "Darwin"},
            "event": "data_context.__init__",
            "success": true,
            "version": "1.0.0",
            "event_time": "2020-03-28T01:14:21.155Z",
            "data_context_id": "96c547fe-e809-4f2e-b122-0dc91bb7b3ad",
            "data_context_instance_id": "445a8ad1-2bd0-45ce-bb6b-d066afe996dd",
            "ge_version": "0.9.7+244.g56d67e51d.dirty"
        });

        let record: EventRecord = serde_json::from_value(sample).unwrap();
        assert_eq!(record.identity(), identity());
        assert_eq!(record.library_version(), "0.9.7+244.g56d67e51d.dirty");
        assert_eq!(
            record.event_time().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "2020-03-28T01:14:21.155Z"
        );
    }

    #[test]
    fn test_missing_context_id_does_not_parse() {
        let sample = json!({
            "event_payload": {},
            "event": "data_context.__init__",
            "success": true,
            "version": "1.0.0",
            "event_time": "2020-03-28T01:14:21.155Z",
            "data_context_instance_id": "445a8ad1-2bd0-45ce-bb6b-d066afe996dd",
            "ge_version": "0.9.7"
        });
        assert!(serde_json::from_value::<EventRecord>(sample).is_err());
    }

    #[test]
    fn test_validation_rejects_malformed_records() {
        let empty_name = EventRecord::new(" ", json!({}), true, identity(), "1.0");
        assert!(empty_name.validate().is_err());

        let scalar_payload = EventRecord::new("x", json!(3), true, identity(), "1.0");
        assert!(scalar_payload.to_body().is_err());

        let no_version = EventRecord::new("x", json!({}), true, identity(), "");
        assert!(no_version.validate().is_err());
    }

    #[test]
    fn test_generated_identities_differ_per_instance() {
        let first = ContextIdentity::new(identity().data_context_id);
        let second = ContextIdentity::new(identity().data_context_id);
        assert_eq!(first.data_context_id, second.data_context_id);
        assert_ne!(first.data_context_instance_id, second.data_context_instance_id);
    }
}
