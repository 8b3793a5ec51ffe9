//! Data provenance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether data was written by a person or generated by a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    Human,
    Synthetic,
}

/// Provenance tag plus a small property bag.
///
/// Human sources carry `created_by`; synthetic sources carry the adapter
/// metadata (`adapter_name`, `model_name`, `model_provider`, `prompt_builder_name`).
/// Properties are kept in a sorted map so serialization is stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(rename = "type")]
    pub source_type: DataSourceType,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl DataSource {
    /// A human source stamped with its author.
    pub fn human(created_by: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("created_by".to_string(), Value::String(created_by.into()));
        Self {
            source_type: DataSourceType::Human,
            properties,
        }
    }

    pub fn synthetic(properties: BTreeMap<String, Value>) -> Self {
        Self {
            source_type: DataSourceType::Synthetic,
            properties,
        }
    }

    /// Look up a string property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_human_source() {
        let source = DataSource::human("alice");
        assert_eq!(source.source_type, DataSourceType::Human);
        assert_eq!(source.property("created_by"), Some("alice"));
    }

    #[test]
    fn test_serialization_uses_type_key() {
        let json = serde_json::to_value(DataSource::human("bob")).unwrap();
        assert_eq!(json, json!({"type": "human", "properties": {"created_by": "bob"}}));
    }

    #[test]
    fn test_synthetic_deserialization() {
        let source: DataSource = serde_json::from_value(json!({
            "type": "synthetic",
            "properties": {"model_name": "gpt-4o", "temperature": 0.5}
        }))
        .unwrap();
        assert_eq!(source.source_type, DataSourceType::Synthetic);
        assert_eq!(source.property("model_name"), Some("gpt-4o"));
        assert_eq!(source.property("temperature"), None);
    }

    #[test]
    fn test_missing_properties_defaults_empty() {
        let source: DataSource = serde_json::from_str(r#"{"type": "human"}"#).unwrap();
        assert!(source.properties.is_empty());
    }
}
