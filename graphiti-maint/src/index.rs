//! Vector index and vector property model.
//!
//! [`IndexInfo`] is what the database reports; [`VectorIndexSpec`] is what we
//! ask it to create; [`VectorProperty`] names one place where vectors live and
//! is the unit of census and clearing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::edges::entity::RELATES_TO;
use crate::errors::{MaintError, Result};
use crate::nodes::entity::ENTITY_LABEL;

/// Whether an index or vector property belongs to nodes or relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Node,
    Relationship,
}

impl FromStr for EntityType {
    type Err = MaintError;

    /// Accepts Neo4j's `entityType` column values (`NODE`, `RELATIONSHIP`).
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NODE" => Ok(EntityType::Node),
            "RELATIONSHIP" => Ok(EntityType::Relationship),
            other => Err(MaintError::DataShape(format!("unknown entity type '{other}'"))),
        }
    }
}

/// Similarity function of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFunction {
    #[default]
    Cosine,
    Euclidean,
}

impl SimilarityFunction {
    /// Value of `vector.similarity_function` in index options.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityFunction::Cosine => "cosine",
            SimilarityFunction::Euclidean => "euclidean",
        }
    }
}

impl FromStr for SimilarityFunction {
    type Err = MaintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityFunction::Cosine),
            "euclidean" => Ok(SimilarityFunction::Euclidean),
            other => Err(MaintError::Validation(format!(
                "unknown similarity function '{other}' (expected cosine or euclidean)"
            ))),
        }
    }
}

impl fmt::Display for SimilarityFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property holding vectors on nodes or relationships, optionally
/// restricted to one label or relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VectorProperty {
    pub entity_type: EntityType,
    /// `None` matches every node (or every relationship).
    pub label_or_type: Option<String>,
    pub property: String,
}

impl VectorProperty {
    pub fn node(label: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Node,
            label_or_type: Some(label.into()),
            property: property.into(),
        }
    }

    pub fn any_node(property: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Node,
            label_or_type: None,
            property: property.into(),
        }
    }

    pub fn relationship(rel_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Relationship,
            label_or_type: Some(rel_type.into()),
            property: property.into(),
        }
    }

    pub fn any_relationship(property: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::Relationship,
            label_or_type: None,
            property: property.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.property.trim().is_empty() {
            return Err(MaintError::Validation(format!("{self}: empty property name")));
        }
        if matches!(&self.label_or_type, Some(l) if l.trim().is_empty()) {
            return Err(MaintError::Validation(format!("{self}: empty label or type")));
        }
        Ok(())
    }

    /// Whether a node or relationship with these labels/type is in scope.
    pub fn matches<S: AsRef<str>>(&self, labels_or_type: &[S]) -> bool {
        match &self.label_or_type {
            None => true,
            Some(want) => labels_or_type.iter().any(|l| l.as_ref() == want),
        }
    }
}

impl fmt::Display for VectorProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.entity_type, &self.label_or_type) {
            (EntityType::Node, Some(label)) => write!(f, "(:{label}).{}", self.property),
            (EntityType::Node, None) => write!(f, "(*).{}", self.property),
            (EntityType::Relationship, Some(t)) => write!(f, "[:{t}].{}", self.property),
            (EntityType::Relationship, None) => write!(f, "[*].{}", self.property),
        }
    }
}

/// Vector properties Graphiti writes, scanned when none are configured.
pub fn default_vector_properties() -> Vec<VectorProperty> {
    vec![
        VectorProperty::node(ENTITY_LABEL, "name_embedding"),
        VectorProperty::any_node("embedding"),
        VectorProperty::relationship(RELATES_TO, "fact_embedding"),
        VectorProperty::any_relationship("embedding"),
    ]
}

/// Extend `base` with the properties covered by vector `indexes`, keeping
/// order and dropping duplicates.
pub fn merge_targets(base: Vec<VectorProperty>, indexes: &[IndexInfo]) -> Vec<VectorProperty> {
    let mut targets = Vec::with_capacity(base.len() + indexes.len());
    let extra = indexes.iter().flat_map(IndexInfo::vector_properties);
    for target in base.into_iter().chain(extra) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

/// An index as reported by `SHOW INDEXES`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    /// `VECTOR`, `RANGE`, `FULLTEXT`, `LOOKUP`, ...
    pub index_type: String,
    pub state: String,
    pub entity_type: Option<EntityType>,
    pub labels_or_types: Vec<String>,
    pub properties: Vec<String>,
    /// `vector.dimensions` from the index config, for vector indexes.
    pub dimensions: Option<usize>,
    pub similarity: Option<String>,
}

impl IndexInfo {
    pub fn is_vector(&self) -> bool {
        self.index_type.eq_ignore_ascii_case("VECTOR")
    }

    /// A vector index whose recorded dimensionality disagrees with `target_dim`.
    ///
    /// Vector indexes with an unknown dimensionality are never stale; they are
    /// reported separately and left alone.
    pub fn is_stale(&self, target_dim: usize) -> bool {
        self.is_vector() && matches!(self.dimensions, Some(d) if d != target_dim)
    }

    /// The vector properties this index covers (empty for non-vector indexes).
    pub fn vector_properties(&self) -> Vec<VectorProperty> {
        let Some(entity_type) = self.entity_type.filter(|_| self.is_vector()) else {
            return Vec::new();
        };
        self.labels_or_types
            .iter()
            .flat_map(|label| {
                self.properties.iter().map(move |property| VectorProperty {
                    entity_type,
                    label_or_type: Some(label.clone()),
                    property: property.clone(),
                })
            })
            .collect()
    }
}

/// A vector index to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexSpec {
    pub name: String,
    pub target: VectorProperty,
    pub dimensions: usize,
    pub similarity: SimilarityFunction,
}

impl VectorIndexSpec {
    /// Vector indexes must be bound to exactly one label or relationship type.
    pub fn new(
        name: impl Into<String>,
        target: VectorProperty,
        dimensions: usize,
        similarity: SimilarityFunction,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MaintError::Validation("index name must not be empty".to_string()));
        }
        if target.label_or_type.is_none() {
            return Err(MaintError::Validation(format!(
                "index '{name}' needs a label or relationship type"
            )));
        }
        if dimensions == 0 {
            return Err(MaintError::Validation(format!(
                "index '{name}' needs a positive dimensionality"
            )));
        }
        target.validate()?;
        Ok(Self {
            name,
            target,
            dimensions,
            similarity,
        })
    }

    /// The label or relationship type; guaranteed present by [`Self::new`].
    pub fn label_or_type(&self) -> &str {
        self.target.label_or_type.as_deref().unwrap_or_default()
    }
}

/// The vector indexes Graphiti's search relies on.
pub fn required_indexes(dimensions: usize, similarity: SimilarityFunction) -> Result<Vec<VectorIndexSpec>> {
    [
        (
            "entity_name_embedding",
            VectorProperty::node(ENTITY_LABEL, "name_embedding"),
        ),
        ("entity_embedding", VectorProperty::node(ENTITY_LABEL, "embedding")),
        (
            "edge_fact_embedding",
            VectorProperty::relationship(RELATES_TO, "fact_embedding"),
        ),
    ]
    .into_iter()
    .map(|(name, target)| VectorIndexSpec::new(name, target, dimensions, similarity))
    .collect()
}

/// Result of dropping an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropOutcome {
    Dropped,
    AlreadyAbsent,
}

/// Result of creating a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    /// An index with this name exists with a different dimensionality.
    Conflicting { dimensions: Option<usize> },
}
