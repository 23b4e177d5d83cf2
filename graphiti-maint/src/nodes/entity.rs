//! EntityNode — a real-world entity extracted from episodes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    optional_str, optional_vector, required_datetime, required_str, required_uuid,
    vector_to_value, Properties,
};
use crate::errors::Result;

/// Label Graphiti puts on every entity node.
pub const ENTITY_LABEL: &str = "Entity";

/// A real-world entity (person, place, concept) extracted from episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub uuid: Uuid,
    pub name: String,
    pub group_id: String,
    /// Labels in addition to [`ENTITY_LABEL`].
    pub labels: Vec<String>,
    pub summary: Option<String>,
    pub name_embedding: Option<Vec<f32>>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl EntityNode {
    pub fn new(name: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            group_id: group_id.into(),
            labels: Vec::new(),
            summary: None,
            name_embedding: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_name_embedding(mut self, v: Vec<f32>) -> Self {
        self.name_embedding = Some(v);
        self
    }

    pub fn with_embedding(mut self, v: Vec<f32>) -> Self {
        self.embedding = Some(v);
        self
    }

    /// Every label the node carries in the graph, `Entity` first.
    pub fn all_labels(&self) -> Vec<String> {
        std::iter::once(ENTITY_LABEL.to_string())
            .chain(self.labels.iter().filter(|l| *l != ENTITY_LABEL).cloned())
            .collect()
    }

    /// Property map as Graphiti stores it. Absent vectors are omitted.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("uuid".into(), Value::String(self.uuid.to_string()));
        props.insert("name".into(), Value::String(self.name.clone()));
        props.insert("group_id".into(), Value::String(self.group_id.clone()));
        if let Some(summary) = &self.summary {
            props.insert("summary".into(), Value::String(summary.clone()));
        }
        if let Some(v) = &self.name_embedding {
            props.insert("name_embedding".into(), vector_to_value(v));
        }
        if let Some(v) = &self.embedding {
            props.insert("embedding".into(), vector_to_value(v));
        }
        props.insert(
            "created_at".into(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        props
    }

    /// Rebuild a node from its stored labels and properties.
    ///
    /// # Errors
    /// [`crate::MaintError::DataShape`] when a required field is missing or
    /// any field has the wrong type.
    pub fn from_properties(labels: &[String], props: &Properties) -> Result<Self> {
        Ok(Self {
            uuid: required_uuid(props, "uuid")?,
            name: required_str(props, "name")?,
            group_id: optional_str(props, "group_id")?.unwrap_or_default(),
            labels: labels
                .iter()
                .filter(|l| *l != ENTITY_LABEL)
                .cloned()
                .collect(),
            summary: optional_str(props, "summary")?,
            name_embedding: optional_vector(props, "name_embedding")?,
            embedding: optional_vector(props, "embedding")?,
            created_at: required_datetime(props, "created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MaintError;
    use serde_json::json;

    #[test]
    fn test_entity_node_construction() {
        let node = EntityNode::new("Alice", "test-group").with_summary("Alice is a software engineer.");
        assert_eq!(node.name, "Alice");
        assert_eq!(node.group_id, "test-group");
        assert_eq!(node.summary.as_deref(), Some("Alice is a software engineer."));
        assert!(node.name_embedding.is_none());
        assert!(node.embedding.is_none());
    }

    #[test]
    fn test_all_labels_puts_entity_first_once() {
        let mut node = EntityNode::new("Acme", "g");
        node.labels = vec!["Organization".into(), "Entity".into()];
        assert_eq!(node.all_labels(), vec!["Entity", "Organization"]);
    }

    #[test]
    fn test_properties_roundtrip() {
        let mut node = EntityNode::new("Acme Corp", "corp-group")
            .with_summary("A fictional company.")
            .with_name_embedding(vec![0.5, 0.5])
            .with_embedding(vec![0.25; 4]);
        node.labels = vec!["Organization".into()];

        let props = node.to_properties();
        let back = EntityNode::from_properties(&node.all_labels(), &props).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_absent_vectors_are_not_stored() {
        let props = EntityNode::new("Bob", "g").to_properties();
        assert!(!props.contains_key("embedding"));
        assert!(!props.contains_key("name_embedding"));
        assert!(!props.contains_key("summary"));
    }

    #[test]
    fn test_from_properties_missing_name() {
        let props = json!({
            "uuid": "00000000-0000-0000-0000-000000000001",
            "created_at": "2024-01-01T00:00:00Z"
        });
        let err = EntityNode::from_properties(&[], props.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, MaintError::DataShape(msg) if msg.contains("name")));
    }

    #[test]
    fn test_from_properties_tolerates_null_summary() {
        let props = json!({
            "uuid": "00000000-0000-0000-0000-000000000001",
            "name": "Eve",
            "summary": null,
            "created_at": "2024-01-01T00:00:00Z"
        });
        let node = EntityNode::from_properties(&["Entity".into()], props.as_object().unwrap()).unwrap();
        assert_eq!(node.name, "Eve");
        assert!(node.summary.is_none());
        assert!(node.labels.is_empty());
    }

    #[test]
    fn test_entity_node_serde_roundtrip() {
        let node = EntityNode::new("Concept", "g2").with_name_embedding(vec![0.1, 0.2, 0.3]);
        let json_str = serde_json::to_string(&node).expect("serialization failed");
        let recovered: EntityNode = serde_json::from_str(&json_str).expect("deserialization failed");
        assert_eq!(recovered, node);
    }
}
