//! Neo4j graph driver implementation.
//!
//! Uses `neo4rs` 0.8 for async, pooled Bolt connections. Requires Neo4j 5.13+
//! (vector index DDL and `valueType`).

mod cypher;

use std::collections::BTreeMap;

use neo4rs::{query, ConfigBuilder, Graph, Query, Row};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{GraphDriver, LockOutcome};
use crate::errors::{MaintError, Result};
use crate::index::{
    CreateOutcome, DropOutcome, EntityType, IndexInfo, VectorIndexSpec, VectorProperty,
};
use crate::inspect::{DuplicateUuid, GraphStats, VectorCensus, DUPLICATE_UUID_LIMIT};
use crate::types::MaintConfig;

/// A Bolt connection pool to one Neo4j database.
pub struct Neo4jDriver {
    graph: Graph,
    uri: String,
    database: String,
}

impl Neo4jDriver {
    /// Connect and verify the connection with a trivial query.
    ///
    /// # Errors
    /// [`MaintError::Connection`] if the server is unreachable or rejects the
    /// credentials.
    pub async fn connect(uri: &str, user: &str, password: &str, database: &str) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .db(database)
            .build()
            .map_err(|e| MaintError::Connection(e.to_string()))?;
        let graph = Graph::connect(config)
            .await
            .map_err(|e| MaintError::Connection(e.to_string()))?;

        let driver = Self {
            graph,
            uri: uri.to_string(),
            database: database.to_string(),
        };
        driver.ping().await?;
        info!(uri, database, "Connected to Neo4j");
        Ok(driver)
    }

    /// Connect using the `NEO4J_*` settings of `config`.
    pub async fn from_config(config: &MaintConfig) -> Result<Self> {
        Self::connect(
            &config.neo4j_uri,
            &config.neo4j_user,
            config.neo4j_password()?,
            &config.neo4j_database,
        )
        .await
    }

    async fn fetch_all(&self, q: Query) -> Result<Vec<Row>> {
        let mut stream = self.graph.execute(q).await.map_err(map_neo4j_error)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(map_neo4j_error)? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn fetch_one(&self, q: Query) -> Result<Row> {
        self.fetch_all(q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MaintError::DataShape("query returned no rows".to_string()))
    }
}

/// Connection-level failures are fatal; everything else is scoped to the
/// query that raised it.
fn map_neo4j_error(err: neo4rs::Error) -> MaintError {
    match &err {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError { .. }
        | neo4rs::Error::AuthenticationError { .. }
        | neo4rs::Error::UrlParseError { .. } => MaintError::Connection(err.to_string()),
        _ => MaintError::Query(err.to_string()),
    }
}

fn is_constraint_violation(message: &str) -> bool {
    message.contains(cypher::CONSTRAINT_VIOLATION)
}

fn field<'row, T: Deserialize<'row>>(row: &'row Row, key: &str) -> Result<T> {
    row.get::<T>(key)
        .map_err(|e| MaintError::DataShape(format!("column '{key}': {e}")))
}

fn count_field(row: &Row, key: &str) -> Result<u64> {
    let value: i64 = field(row, key)?;
    u64::try_from(value)
        .map_err(|_| MaintError::DataShape(format!("column '{key}' is negative: {value}")))
}

fn dimension_field(row: &Row, key: &str) -> Result<Option<usize>> {
    let value: Option<i64> = field(row, key)?;
    value
        .map(|v| {
            usize::try_from(v)
                .map_err(|_| MaintError::DataShape(format!("column '{key}' is negative: {v}")))
        })
        .transpose()
}

fn index_from_row(row: &Row) -> Result<IndexInfo> {
    let entity_type: Option<String> = field(row, "entityType")?;
    Ok(IndexInfo {
        name: field(row, "name")?,
        index_type: field(row, "type")?,
        state: field(row, "state")?,
        entity_type: entity_type.map(|s| s.parse::<EntityType>()).transpose()?,
        labels_or_types: field::<Option<Vec<String>>>(row, "labelsOrTypes")?.unwrap_or_default(),
        properties: field::<Option<Vec<String>>>(row, "properties")?.unwrap_or_default(),
        dimensions: dimension_field(row, "dimensions")?,
        similarity: field(row, "similarity")?,
    })
}

impl GraphDriver for Neo4jDriver {
    async fn ping(&self) -> Result<()> {
        // Any failure of the health check means the server is not usable.
        self.fetch_one(query(cypher::PING))
            .await
            .map_err(|e| match e {
                MaintError::Query(msg) => MaintError::Connection(msg),
                other => other,
            })
            .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        // neo4rs closes pooled connections when the last Graph handle drops.
        debug!(uri = %self.uri, database = %self.database, "Closing Neo4j driver");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.fetch_all(query(cypher::SHOW_INDEXES))
            .await?
            .iter()
            .map(index_from_row)
            .collect()
    }

    #[instrument(skip(self))]
    async fn drop_index(&self, name: &str) -> Result<DropOutcome> {
        let present = !self
            .fetch_all(query(cypher::INDEX_BY_NAME).param("name", name))
            .await?
            .is_empty();
        if !present {
            return Ok(DropOutcome::AlreadyAbsent);
        }
        self.graph
            .run(query(&cypher::drop_index(name)))
            .await
            .map_err(map_neo4j_error)?;
        Ok(DropOutcome::Dropped)
    }

    #[instrument(skip(self, spec), fields(index = %spec.name, dims = spec.dimensions))]
    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<CreateOutcome> {
        let existing = self
            .fetch_all(query(cypher::INDEX_BY_NAME).param("name", spec.name.as_str()))
            .await?;
        if let Some(row) = existing.first() {
            let dimensions = dimension_field(row, "dimensions")?;
            return Ok(if dimensions == Some(spec.dimensions) {
                CreateOutcome::AlreadyExists
            } else {
                CreateOutcome::Conflicting { dimensions }
            });
        }
        self.graph
            .run(query(&cypher::create_vector_index(spec)))
            .await
            .map_err(map_neo4j_error)?;
        Ok(CreateOutcome::Created)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn vector_census(&self, target: &VectorProperty) -> Result<VectorCensus> {
        let rows = self.fetch_all(query(&cypher::vector_census(target))).await?;
        let mut census = VectorCensus::new(target.clone());
        for row in &rows {
            let dim = dimension_field(row, "dim")?.unwrap_or(0);
            census.record(dim, count_field(row, "total")?);
        }
        Ok(census)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn clear_vector_batch(
        &self,
        target: &VectorProperty,
        keep_dim: usize,
        limit: usize,
    ) -> Result<u64> {
        let q = query(&cypher::clear_vector_batch(target))
            .param("dim", keep_dim as i64)
            .param("limit", limit as i64);
        let row = self.fetch_one(q).await?;
        count_field(&row, "cleared")
    }

    #[instrument(skip(self))]
    async fn graph_stats(&self) -> Result<GraphStats> {
        let node_count = count_field(&self.fetch_one(query(cypher::NODE_COUNT)).await?, "total")?;

        let mut nodes_by_label = BTreeMap::new();
        for row in self.fetch_all(query(cypher::NODES_BY_LABEL)).await? {
            nodes_by_label.insert(field::<String>(&row, "label")?, count_field(&row, "total")?);
        }

        let mut relationships_by_type = BTreeMap::new();
        for row in self.fetch_all(query(cypher::RELATIONSHIPS_BY_TYPE)).await? {
            relationships_by_type
                .insert(field::<String>(&row, "rel_type")?, count_field(&row, "total")?);
        }
        let relationship_count = relationships_by_type.values().sum();

        let duplicate_uuids = self
            .fetch_all(query(cypher::DUPLICATE_UUIDS).param("limit", DUPLICATE_UUID_LIMIT as i64))
            .await?
            .iter()
            .map(|row| {
                Ok(DuplicateUuid {
                    uuid: field(row, "uuid")?,
                    copies: count_field(row, "copies")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GraphStats {
            node_count,
            nodes_by_label,
            relationship_count,
            relationships_by_type,
            duplicate_uuids,
        })
    }

    #[instrument(skip(self))]
    async fn acquire_lock(&self, name: &str, holder: &str) -> Result<LockOutcome> {
        self.graph
            .run(query(cypher::LOCK_CONSTRAINT))
            .await
            .map_err(map_neo4j_error)?;

        let acquired = self
            .fetch_one(
                query(cypher::ACQUIRE_LOCK)
                    .param("name", name)
                    .param("holder", holder),
            )
            .await;
        let row = match acquired {
            Ok(row) => row,
            // Lost the race to create the lock node; read whoever won.
            Err(MaintError::Query(msg)) if is_constraint_violation(&msg) => {
                debug!(lock = name, "lock created concurrently, reading holder");
                self.fetch_one(query(cypher::LOCK_HOLDER).param("name", name))
                    .await?
            }
            Err(e) => return Err(e),
        };
        let current: Option<String> = field(&row, "holder")?;
        Ok(match current {
            Some(current) if current != holder => LockOutcome::HeldBy(current),
            _ => LockOutcome::Acquired,
        })
    }

    #[instrument(skip(self))]
    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool> {
        let row = self
            .fetch_one(
                query(cypher::RELEASE_LOCK)
                    .param("name", name)
                    .param("holder", holder),
            )
            .await?;
        Ok(count_field(&row, "released")? > 0)
    }
}
