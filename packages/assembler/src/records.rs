//! Join record types and their key fields.

use gazetteer_join_index::KeyField;
use geo::Coord;

/// A node's membership in a way, with the node coordinate once known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeWayRecord {
    /// Node id.
    pub node_id: i64,
    /// Way id.
    pub way_id: i64,
    /// Position of the node in the way.
    pub seq: i16,
    /// Coordinate, stamped during the node pass.
    pub coord: Option<Coord<f64>>,
}

const fn node_way_node(r: &NodeWayRecord) -> i64 {
    r.node_id
}

const fn node_way_way(r: &NodeWayRecord) -> i64 {
    r.way_id
}

/// [`NodeWayRecord`] keyed by node id.
pub const NODE_WAY_BY_NODE: KeyField<NodeWayRecord> = KeyField::new("node_id", node_way_node);
/// [`NodeWayRecord`] keyed by way id.
pub const NODE_WAY_BY_WAY: KeyField<NodeWayRecord> = KeyField::new("way_id", node_way_way);

/// A way's membership in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WayRelationRecord {
    /// Way id.
    pub way_id: i64,
    /// Relation id.
    pub relation_id: i64,
    /// Whether the member plays the `inner` role.
    pub inner: bool,
}

const fn way_relation_way(r: &WayRelationRecord) -> i64 {
    r.way_id
}

const fn way_relation_relation(r: &WayRelationRecord) -> i64 {
    r.relation_id
}

/// [`WayRelationRecord`] keyed by way id.
pub const WAY_RELATION_BY_WAY: KeyField<WayRelationRecord> =
    KeyField::new("way_id", way_relation_way);
/// [`WayRelationRecord`] keyed by relation id.
pub const WAY_RELATION_BY_RELATION: KeyField<WayRelationRecord> =
    KeyField::new("relation_id", way_relation_relation);

/// A node of an interpolation way, with its house number once known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationNodeRecord {
    /// Node id.
    pub node_id: i64,
    /// Interpolation way id.
    pub way_id: i64,
    /// Parsed house number, stamped during the node pass.
    pub housenumber: Option<i32>,
}

const fn interpolation_node(r: &InterpolationNodeRecord) -> i64 {
    r.node_id
}

/// [`InterpolationNodeRecord`] keyed by node id.
pub const INTERPOLATION_BY_NODE: KeyField<InterpolationNodeRecord> =
    KeyField::new("node_id", interpolation_node);
