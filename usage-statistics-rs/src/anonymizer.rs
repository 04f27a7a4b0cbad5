//! Salted hashing of user-chosen names before they enter a payload.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Reported for classes the library does not ship
pub const NOT_RECOGNIZED: &str = "__not_recognized__";

/// Classes shipped with the library; these are reported in clear text
const RECOGNIZED_CLASSES: &[&str] = &[
    // datasources
    "PandasDatasource",
    "SparkDFDatasource",
    "SqlAlchemyDatasource",
    // stores and backends
    "ExpectationsStore",
    "ValidationsStore",
    "EvaluationParameterStore",
    "HtmlSiteStore",
    "TupleFilesystemStoreBackend",
    "TupleS3StoreBackend",
    "TupleGCSStoreBackend",
    "InMemoryStoreBackend",
    "DatabaseStoreBackend",
    // validation operators and actions
    "ActionListValidationOperator",
    "WarningAndFailureExpectationSuitesValidationOperator",
    "StoreValidationResultAction",
    "StoreEvaluationParametersAction",
    "UpdateDataDocsAction",
    "SlackNotificationAction",
    // data docs
    "SiteBuilder",
    "DefaultSiteIndexBuilder",
];

pub fn is_recognized_class(class_name: &str) -> bool {
    RECOGNIZED_CLASSES.contains(&class_name)
}

#[derive(Debug, Clone)]
pub struct Anonymizer {
    salt: String,
}

impl Anonymizer {
    /// The salt is normally the installation's `data_context_id`
    pub fn new(salt: Uuid) -> Self {
        Self {
            salt: salt.to_string(),
        }
    }

    /// 32 hex characters, stable for a given salt
    pub fn anonymize(&self, name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(name.as_bytes());
        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(32);
        digest
    }

    /// `{"anonymized_name", "parent_class"}` plus `anonymized_class` for custom classes
    pub fn anonymize_component(&self, name: &str, class_name: &str) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("anonymized_name".to_string(), json!(self.anonymize(name)));
        self.insert_class(&mut info, class_name);
        info
    }

    /// Validation operator actions as `{name, class_name}` pairs
    pub fn anonymize_action_list<'a, I>(&self, actions: I) -> Vec<Value>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        actions
            .into_iter()
            .map(|(name, class_name)| Value::Object(self.anonymize_component(name, class_name)))
            .collect()
    }

    /// Store backend description, which has no user-chosen name
    pub fn anonymize_class(&self, class_name: &str) -> Map<String, Value> {
        let mut info = Map::new();
        self.insert_class(&mut info, class_name);
        info
    }

    fn insert_class(&self, info: &mut Map<String, Value>, class_name: &str) {
        if is_recognized_class(class_name) {
            info.insert("parent_class".to_string(), json!(class_name));
        } else {
            info.insert("parent_class".to_string(), json!(NOT_RECOGNIZED));
            info.insert(
                "anonymized_class".to_string(),
                json!(self.anonymize(class_name)),
            );
        }
    }
}
