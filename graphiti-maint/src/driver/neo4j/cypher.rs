//! Cypher text for the Neo4j backend.
//!
//! Identifiers (labels, relationship types, properties, index names) cannot be
//! parameters in Cypher, so they are spliced in through [`quote_ident`];
//! every value goes through a `$param`.

use crate::index::{EntityType, VectorIndexSpec, VectorProperty};
use crate::utils::quote_ident;

pub const PING: &str = "RETURN 1 AS ok";

pub const SHOW_INDEXES: &str = "SHOW INDEXES \
     YIELD name, type, state, entityType, labelsOrTypes, properties, options \
     RETURN name, type, state, entityType, labelsOrTypes, properties, \
     options.indexConfig['vector.dimensions'] AS dimensions, \
     options.indexConfig['vector.similarity_function'] AS similarity";

/// Takes `$name`; returns one row per matching index.
pub const INDEX_BY_NAME: &str = "SHOW INDEXES YIELD name, type, options \
     WHERE name = $name \
     RETURN type, options.indexConfig['vector.dimensions'] AS dimensions";

pub const NODE_COUNT: &str = "MATCH (n) RETURN count(n) AS total";

pub const NODES_BY_LABEL: &str =
    "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS total ORDER BY label";

pub const RELATIONSHIPS_BY_TYPE: &str =
    "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(*) AS total ORDER BY rel_type";

/// Takes `$limit`.
pub const DUPLICATE_UUIDS: &str = "MATCH (n) WHERE n.uuid IS NOT NULL \
     WITH toString(n.uuid) AS uuid, count(*) AS copies WHERE copies > 1 \
     RETURN uuid, copies ORDER BY copies DESC, uuid LIMIT $limit";

/// Takes `$name` and `$holder`; returns the current holder.
/// Uniqueness on the lock name, so two concurrent `MERGE`s cannot both create it.
pub const LOCK_CONSTRAINT: &str = "CREATE CONSTRAINT graph_maint_lock_name IF NOT EXISTS \
     FOR (l:GraphMaintLock) REQUIRE l.name IS UNIQUE";

/// Status code of a write rejected by [`LOCK_CONSTRAINT`].
pub const CONSTRAINT_VIOLATION: &str = "Neo.ClientError.Schema.ConstraintValidationFailed";

pub const LOCK_HOLDER: &str = "MATCH (l:GraphMaintLock {name: $name}) RETURN l.holder AS holder";

pub const ACQUIRE_LOCK: &str = "MERGE (l:GraphMaintLock {name: $name}) \
     ON CREATE SET l.holder = $holder, l.acquired_at = datetime() \
     RETURN l.holder AS holder";

/// Takes `$name` and `$holder`; returns how many locks were deleted.
pub const RELEASE_LOCK: &str = "MATCH (l:GraphMaintLock {name: $name}) \
     WHERE l.holder = $holder \
     WITH l DELETE l \
     RETURN count(*) AS released";

pub fn drop_index(name: &str) -> String {
    format!("DROP INDEX {} IF EXISTS", quote_ident(name))
}

pub fn create_vector_index(spec: &VectorIndexSpec) -> String {
    let label = quote_ident(spec.label_or_type());
    let property = quote_ident(&spec.target.property);
    let pattern = match spec.target.entity_type {
        EntityType::Node => format!("(n:{label})"),
        EntityType::Relationship => format!("()-[n:{label}]-()"),
    };
    format!(
        "CREATE VECTOR INDEX {name} IF NOT EXISTS FOR {pattern} ON (n.{property}) \
         OPTIONS {{indexConfig: {{`vector.dimensions`: {dims}, \
         `vector.similarity_function`: '{similarity}'}}}}",
        name = quote_ident(&spec.name),
        dims = spec.dimensions,
        similarity = spec.similarity.as_str(),
    )
}

/// Histogram of vector lengths under `target`: rows of `(dim, total)`.
pub fn vector_census(target: &VectorProperty) -> String {
    let access = property_access(target);
    format!(
        "MATCH {pattern} WHERE {access} IS NOT NULL \
         RETURN {dim} AS dim, count(*) AS total ORDER BY dim",
        pattern = match_pattern(target),
        dim = dimension_expr(&access),
    )
}

/// Takes `$dim` and `$limit`; returns `cleared`.
///
/// The length test runs in the same statement as the `REMOVE`, so a vector
/// rewritten at `$dim` since the census is left alone.
pub fn clear_vector_batch(target: &VectorProperty) -> String {
    let access = property_access(target);
    format!(
        "MATCH {pattern} WHERE {access} IS NOT NULL AND {dim} <> $dim \
         WITH x LIMIT $limit \
         REMOVE {access} \
         RETURN count(x) AS cleared",
        pattern = match_pattern(target),
        dim = dimension_expr(&access),
    )
}

/// Binds the matched node or relationship to `x`.
fn match_pattern(target: &VectorProperty) -> String {
    let label = target
        .label_or_type
        .as_deref()
        .map(|l| format!(":{}", quote_ident(l)))
        .unwrap_or_default();
    match target.entity_type {
        EntityType::Node => format!("(x{label})"),
        EntityType::Relationship => format!("()-[x{label}]->()"),
    }
}

fn property_access(target: &VectorProperty) -> String {
    format!("x.{}", quote_ident(&target.property))
}

/// List length, or 0 for a value that is not a list.
fn dimension_expr(access: &str) -> String {
    format!("CASE WHEN valueType({access}) STARTS WITH 'LIST' THEN size({access}) ELSE 0 END")
}
