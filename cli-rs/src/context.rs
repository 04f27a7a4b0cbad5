//! Project context: the configured components, with usage events on
//! construction and on every listing.

use std::collections::BTreeMap;

use config_rs::{ComponentConfig, ProjectConfig};
use serde::Serialize;
use serde_json::{json, Map, Value};
use usage_statistics::{Anonymizer, UsageStatisticsHandler};

pub const INIT_EVENT: &str = "data_context.__init__";
pub const LIST_DATASOURCES_EVENT: &str = "data_context.list_datasources";
pub const LIST_STORES_EVENT: &str = "data_context.list_stores";
pub const LIST_VALIDATION_OPERATORS_EVENT: &str = "data_context.list_validation_operators";

pub struct ProjectContext<'a> {
    config: &'a ProjectConfig,
    usage_statistics: &'a UsageStatisticsHandler,
}

impl<'a> ProjectContext<'a> {
    /// Emits `data_context.__init__`
    pub fn new(config: &'a ProjectConfig, usage_statistics: &'a UsageStatisticsHandler) -> Self {
        let context = Self {
            config,
            usage_statistics,
        };
        usage_statistics.emit(INIT_EVENT, context.init_payload(), true);
        context
    }

    /// Names and settings of every datasource, sorted by name
    pub fn list_datasources(&self) -> Vec<Map<String, Value>> {
        let entries = component_entries(&self.config.datasources);
        self.emit_count(LIST_DATASOURCES_EVENT, entries.len());
        entries
    }

    pub fn list_stores(&self) -> Vec<Map<String, Value>> {
        let entries = component_entries(&self.config.stores);
        self.emit_count(LIST_STORES_EVENT, entries.len());
        entries
    }

    pub fn list_validation_operators(&self) -> Vec<Map<String, Value>> {
        let entries: Vec<_> = self
            .config
            .validation_operators
            .iter()
            .map(|(name, operator)| named_entry(name, operator))
            .collect();
        self.emit_count(LIST_VALIDATION_OPERATORS_EVENT, entries.len());
        entries
    }

    fn emit_count(&self, event: &str, count: usize) {
        self.usage_statistics.emit(event, json!({ "count": count }), true);
    }

    fn init_payload(&self) -> Value {
        let anonymizer = self.usage_statistics.anonymizer();

        let datasources: Vec<Value> = self
            .config
            .datasources
            .iter()
            .map(|(name, ds)| Value::Object(anonymizer.anonymize_component(name, &ds.class_name)))
            .collect();

        let stores: Vec<Value> = self
            .config
            .stores
            .iter()
            .map(|(name, store)| {
                let mut info = anonymizer.anonymize_component(name, &store.class_name);
                insert_nested_class(anonymizer, &mut info, store, "store_backend");
                Value::Object(info)
            })
            .collect();

        let validation_operators: Vec<Value> = self
            .config
            .validation_operators
            .iter()
            .map(|(name, operator)| {
                let mut info = anonymizer.anonymize_component(name, &operator.class_name);
                let actions = anonymizer.anonymize_action_list(
                    operator
                        .action_list
                        .iter()
                        .map(|a| (a.name.as_str(), a.action.class_name.as_str())),
                );
                info.insert("anonymized_action_list".to_string(), Value::Array(actions));
                Value::Object(info)
            })
            .collect();

        let data_docs_sites: Vec<Value> = self
            .config
            .data_docs_sites
            .iter()
            .map(|(name, site)| {
                let mut info = anonymizer.anonymize_component(name, &site.class_name);
                insert_nested_class(anonymizer, &mut info, site, "store_backend");
                insert_nested_class(anonymizer, &mut info, site, "site_index_builder");
                Value::Object(info)
            })
            .collect();

        json!({
            "platform.system": std::env::consts::OS,
            "platform.arch": std::env::consts::ARCH,
            "gx_version": env!("CARGO_PKG_VERSION"),
            "anonymized_datasources": datasources,
            "anonymized_stores": stores,
            "anonymized_validation_operators": validation_operators,
            "anonymized_data_docs_sites": data_docs_sites,
        })
    }
}

/// Adds `anonymized_<key>` when the component has a `<key>.class_name`
fn insert_nested_class(
    anonymizer: &Anonymizer,
    info: &mut Map<String, Value>,
    component: &ComponentConfig,
    key: &str,
) {
    if let Some(class_name) = component
        .extra
        .get(key)
        .and_then(|nested| nested.get("class_name"))
        .and_then(|class_name| class_name.as_str())
    {
        info.insert(
            format!("anonymized_{key}"),
            Value::Object(anonymizer.anonymize_class(class_name)),
        );
    }
}

fn component_entries(
    components: &BTreeMap<String, ComponentConfig>,
) -> Vec<Map<String, Value>> {
    components
        .iter()
        .map(|(name, component)| named_entry(name, component))
        .collect()
}

/// The entry's settings as a JSON object with its `name` added
fn named_entry<T: Serialize>(name: &str, entry: &T) -> Map<String, Value> {
    let mut map = match serde_json::to_value(entry) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.insert("name".to_string(), json!(name));
    map
}
