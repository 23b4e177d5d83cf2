//! EntityEdge — a fact connecting two EntityNodes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::Result;
use crate::nodes::{
    optional_str, optional_vector, required_datetime, required_str, required_uuid,
    vector_to_value, Properties,
};

/// Relationship type of fact edges.
pub const RELATES_TO: &str = "RELATES_TO";

/// A factual relationship between two entity nodes.
///
/// Source and target are structural (the relationship's endpoints), so they
/// are not part of the property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub uuid: Uuid,
    pub source_node_uuid: Uuid,
    pub target_node_uuid: Uuid,
    /// Relationship label (e.g. "WORKS_AT").
    pub name: String,
    /// Human-readable fact string.
    pub fact: String,
    pub fact_embedding: Option<Vec<f32>>,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EntityEdge {
    pub fn new(
        source_node_uuid: Uuid,
        target_node_uuid: Uuid,
        name: impl Into<String>,
        fact: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            source_node_uuid,
            target_node_uuid,
            name: name.into(),
            fact: fact.into(),
            fact_embedding: None,
            group_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_fact_embedding(mut self, v: Vec<f32>) -> Self {
        self.fact_embedding = Some(v);
        self
    }

    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("uuid".into(), Value::String(self.uuid.to_string()));
        props.insert("name".into(), Value::String(self.name.clone()));
        props.insert("fact".into(), Value::String(self.fact.clone()));
        if let Some(v) = &self.fact_embedding {
            props.insert("fact_embedding".into(), vector_to_value(v));
        }
        if let Some(group_id) = &self.group_id {
            props.insert("group_id".into(), Value::String(group_id.clone()));
        }
        props.insert(
            "created_at".into(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        props
    }

    pub fn from_properties(source: Uuid, target: Uuid, props: &Properties) -> Result<Self> {
        Ok(Self {
            uuid: required_uuid(props, "uuid")?,
            source_node_uuid: source,
            target_node_uuid: target,
            name: required_str(props, "name")?,
            fact: required_str(props, "fact")?,
            fact_embedding: optional_vector(props, "fact_embedding")?,
            group_id: optional_str(props, "group_id")?,
            created_at: required_datetime(props, "created_at")?,
        })
    }
}
