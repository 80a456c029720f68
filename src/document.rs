//! The search document submitted to Solr.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Name the document id is serialized under. Fields may not use it.
pub const ID_FIELD: &str = "id";

/// A field value: one scalar, or an ordered list for multi-value fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Multi(Vec<Value>),
    Single(Value),
}

impl FieldValue {
    /// All values in order, whether single or multi.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            FieldValue::Multi(values) => values.iter().collect(),
            FieldValue::Single(value) => vec![value],
        }
    }
}

/// One document in the index. Serializes to the flat JSON object Solr's
/// update handler expects (`{"id": ..., "model": ..., "tag": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Derive the globally unique document id for a record.
pub fn document_id(model: &str, record_id: i64) -> String {
    format!("{}_{}", model, record_id)
}

impl SearchDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    fn is_reserved(&self, name: &str) -> bool {
        if name == ID_FIELD {
            warn!("{}: ignoring value for reserved field '{}'", self.id, name);
            return true;
        }
        false
    }

    /// Set a single-valued field, replacing anything already there.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        if self.is_reserved(name) {
            return;
        }
        self.fields
            .insert(name.to_string(), FieldValue::Single(value.into()));
    }

    /// Append to a multi-value field. An existing scalar is kept as the
    /// first element.
    pub fn add_multi(&mut self, name: &str, value: impl Into<Value>) {
        if self.is_reserved(name) {
            return;
        }
        let value = value.into();
        match self.fields.get_mut(name) {
            Some(FieldValue::Multi(values)) => values.push(value),
            Some(existing) => {
                let previous = std::mem::replace(existing, FieldValue::Multi(Vec::new()));
                if let FieldValue::Single(first) = previous {
                    *existing = FieldValue::Multi(vec![first, value]);
                }
            }
            None => {
                self.fields
                    .insert(name.to_string(), FieldValue::Multi(vec![value]));
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Values of a field as strings; numbers are rendered, other JSON types skipped.
    pub fn text_values(&self, name: &str) -> Vec<String> {
        self.field(name)
            .map(|field| {
                field
                    .values()
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_multi_appends_instead_of_overwriting() {
        let mut doc = SearchDocument::new("Item_1");
        doc.add_multi("subject", "History");
        doc.add_multi("subject", "Maps");

        assert_eq!(doc.text_values("subject"), vec!["History", "Maps"]);
    }

    #[test]
    fn add_multi_promotes_existing_scalar() {
        let mut doc = SearchDocument::new("Item_1");
        doc.set_field("creator", "Jefferson");
        doc.add_multi("creator", "Madison");

        assert_eq!(
            doc.field("creator"),
            Some(&FieldValue::Multi(vec![json!("Jefferson"), json!("Madison")]))
        );
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut doc = SearchDocument::new(document_id("Item", 7));
        doc.set_field("model", "Item");
        doc.set_field("modelid", 7);
        doc.add_multi("resulttype", "Item");

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "Item_7",
                "model": "Item",
                "modelid": 7,
                "resulttype": ["Item"],
            })
        );
    }

    #[test]
    fn reserved_id_field_is_ignored() {
        let mut doc = SearchDocument::new("Item_2");
        doc.set_field(ID_FIELD, "other");
        doc.add_multi(ID_FIELD, "another");

        assert!(doc.fields.is_empty());
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({ "id": "Item_2" }));
    }
}
