//! Node and member tables shared by the builders.

use gazetteer_join_index::JoinIndex;
use geo::{Coord, Point};

use crate::records::{
    NODE_WAY_BY_NODE, NODE_WAY_BY_WAY, NodeWayRecord, WAY_RELATION_BY_RELATION,
    WAY_RELATION_BY_WAY, WayRelationRecord,
};
use crate::topology::{Node, Relation, Way};

/// Node→way table: which ways need which node coordinates.
///
/// Filled with way node lists in the first pass, frozen by node for the
/// coordinate stamping of the node pass, then re-frozen by way to read
/// each way's points back in order.
#[derive(Debug)]
pub struct WayNodes {
    index: JoinIndex<NodeWayRecord>,
}

impl WayNodes {
    /// Creates an empty table.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            index: JoinIndex::new(name),
        }
    }

    /// Records every node of `way`, numbering them from `first_seq`.
    pub fn add_way(&mut self, way: &Way, first_seq: i16) {
        for (i, &node_id) in way.nodes.iter().enumerate() {
            let offset = i16::try_from(i).unwrap_or(i16::MAX);
            self.index.insert(NodeWayRecord {
                node_id,
                way_id: way.id,
                seq: first_seq.saturating_add(offset),
                coord: None,
            });
        }
    }

    /// Prepares for the node pass.
    pub fn freeze_by_node(&mut self) {
        self.index.freeze(NODE_WAY_BY_NODE);
    }

    /// Prepares for the build pass.
    pub fn freeze_by_way(&mut self) {
        self.index.freeze(NODE_WAY_BY_WAY);
    }

    /// Stamps the node coordinate into every record that references it.
    /// Returns how many records were updated.
    pub fn stamp(&mut self, node: &Node) -> usize {
        let coord = node.coord();
        self.index
            .update_run(node.id, NODE_WAY_BY_NODE, |r| r.coord = Some(coord))
    }

    /// Ids of the ways referencing `node_id`, deduplicated. Valid while
    /// frozen by node.
    #[must_use]
    pub fn ways_of_node(&self, node_id: i64) -> Vec<i64> {
        let mut ways: Vec<i64> = self
            .index
            .run(node_id, NODE_WAY_BY_NODE)
            .iter()
            .map(|r| r.way_id)
            .collect();
        ways.sort_unstable();
        ways.dedup();
        ways
    }

    /// Records of `way_id` ordered by position. Valid while frozen by way.
    #[must_use]
    pub fn ordered(&self, way_id: i64) -> Vec<NodeWayRecord> {
        let mut records = self.index.run(way_id, NODE_WAY_BY_WAY).to_vec();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Coordinates of `way_id` in order, skipping nodes that were never
    /// seen. Valid while frozen by way.
    #[must_use]
    pub fn points(&self, way_id: i64) -> Vec<Coord<f64>> {
        self.ordered(way_id)
            .into_iter()
            .filter_map(|r| r.coord)
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Way→relation table for multipolygon-like relations.
#[derive(Debug)]
pub struct RelationWays {
    index: JoinIndex<WayRelationRecord>,
    with_inner: bool,
}

impl RelationWays {
    /// Creates an empty table. When `with_inner` is false only `outer` and
    /// empty-role members are recorded.
    #[must_use]
    pub const fn new(name: &'static str, with_inner: bool) -> Self {
        Self {
            index: JoinIndex::new(name),
            with_inner,
        }
    }

    /// Records the way members of `relation`.
    pub fn add_relation(&mut self, relation: &Relation) {
        for member in &relation.members {
            if member.kind != gazetteer_feature::EntityKind::Way {
                continue;
            }
            let inner = match member.role.as_str() {
                "" | "outer" => false,
                "inner" if self.with_inner => true,
                _ => continue,
            };
            self.index.insert(WayRelationRecord {
                way_id: member.id,
                relation_id: relation.id,
                inner,
            });
        }
    }

    /// Prepares for membership lookups of the way pass.
    pub fn freeze_by_way(&mut self) {
        self.index.freeze(WAY_RELATION_BY_WAY);
    }

    /// Prepares for the relation build pass.
    pub fn freeze_by_relation(&mut self) {
        self.index.freeze(WAY_RELATION_BY_RELATION);
    }

    /// Whether `way_id` is a member of any recorded relation.
    #[must_use]
    pub fn contains_way(&self, way_id: i64) -> bool {
        self.index.find(way_id, WAY_RELATION_BY_WAY).is_some()
    }

    /// Member records of `relation_id`.
    #[must_use]
    pub fn members(&self, relation_id: i64) -> &[WayRelationRecord] {
        self.index.run(relation_id, WAY_RELATION_BY_RELATION)
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Sorted list of nodes already emitted, for building linkage.
#[derive(Debug, Default)]
pub struct WrittenNodes {
    nodes: Vec<(i64, Point<f64>)>,
    sorted: bool,
}

impl WrittenNodes {
    /// Remembers an emitted node.
    pub fn push(&mut self, node: &Node) {
        self.nodes.push((node.id, node.point()));
        self.sorted = false;
    }

    /// Sorts by node id. Call once after the node pass.
    pub fn sort(&mut self) {
        self.nodes.sort_unstable_by_key(|&(id, _)| id);
        self.sorted = true;
    }

    /// Position of an emitted node.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Self::sort`].
    #[must_use]
    pub fn point_of(&self, node_id: i64) -> Option<Point<f64>> {
        assert!(self.sorted, "written node list queried before sort");
        self.nodes
            .binary_search_by_key(&node_id, |&(id, _)| id)
            .ok()
            .map(|i| self.nodes[i].1)
    }

    /// Emitted nodes lying on the ring of a closed `way`, with their
    /// position.
    #[must_use]
    pub fn on_ring(&self, way: &Way) -> Vec<(i64, Point<f64>)> {
        way.ring_nodes()
            .iter()
            .filter_map(|&id| self.point_of(id).map(|p| (id, p)))
            .collect()
    }

    /// Number of remembered nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was remembered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{MemoryTopology, tags_from};

    #[test]
    fn points_come_back_in_way_order() {
        let way = Way {
            id: 10,
            nodes: vec![3, 1, 2],
            tags: tags_from(&[]),
        };
        let mut table = WayNodes::new("test");
        table.add_way(&way, 0);
        table.freeze_by_node();

        let mut topology = MemoryTopology::default();
        topology
            .node(1, 1.0, 0.0, &[])
            .node(2, 2.0, 0.0, &[])
            .node(3, 3.0, 0.0, &[]);
        for node in &topology.nodes {
            assert_eq!(table.stamp(node), 1);
        }
        table.freeze_by_way();

        let xs: Vec<f64> = table.points(10).iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn unseen_nodes_are_skipped() {
        let way = Way {
            id: 1,
            nodes: vec![1, 2],
            tags: tags_from(&[]),
        };
        let mut table = WayNodes::new("test");
        table.add_way(&way, 1);
        table.freeze_by_node();
        table.freeze_by_way();
        assert!(table.points(1).is_empty());
        assert_eq!(table.ordered(1).len(), 2);
    }

    #[test]
    fn written_nodes_on_ring_skip_closing_repeat() {
        let mut topology = MemoryTopology::default();
        topology.node(5, 12.5, 0.0, &[]).node(7, 13.5, 0.0, &[]);
        let mut written = WrittenNodes::default();
        for node in &topology.nodes {
            written.push(node);
        }
        written.sort();

        let building = Way {
            id: 100,
            nodes: vec![5, 6, 7, 5],
            tags: tags_from(&[("building", "yes")]),
        };
        assert_eq!(
            written.on_ring(&building),
            vec![(5, Point::new(12.5, 0.0)), (7, Point::new(13.5, 0.0))]
        );
    }
}
