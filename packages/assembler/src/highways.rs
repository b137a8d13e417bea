//! Street and junction assembly.
//!
//! Streets are named `highway` ways. A junction is a node shared by at
//! least two distinct named highways.

use std::sync::Arc;

use gazetteer_feature::{EntityKind, Meta, SourceKind};
use geo::{LineString, Point};

use crate::phase::{AssemblerPhase, PhaseGate};
use crate::topology::{Node, Relation, Tags, TopologyHandler, Way};
use crate::way_nodes::WayNodes;

/// Receiver of streets and junctions.
pub trait HighwaySink {
    /// A named street line.
    fn handle_street(&self, tags: &Tags, line: LineString<f64>, meta: Meta);

    /// A node shared by several streets, with the ids of those streets.
    fn handle_junction(&self, node_id: i64, point: Point<f64>, way_ids: &[i64]);
}

/// Whether a way is a street worth indexing.
#[must_use]
pub fn is_named_highway(tags: &Tags) -> bool {
    tags.contains_key("highway") && tags.get("name").is_some_and(|n| !n.trim().is_empty())
}

/// Street and junction builder.
pub struct HighwayBuilder {
    sink: Arc<dyn HighwaySink>,
    gate: PhaseGate,
    way_nodes: WayNodes,
    junctions: usize,
}

impl HighwayBuilder {
    /// Creates a builder that reports to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn HighwaySink>) -> Self {
        Self {
            sink,
            gate: PhaseGate::new("highways"),
            way_nodes: WayNodes::new("highway node2way"),
            junctions: 0,
        }
    }
}

impl TopologyHandler for HighwayBuilder {
    fn handle_node(&mut self, node: &Node) {
        self.gate.check(EntityKind::Node);
        if self.way_nodes.stamp(node) < 2 {
            return;
        }
        let ways = self.way_nodes.ways_of_node(node.id);
        if ways.len() >= 2 {
            self.junctions += 1;
            self.sink.handle_junction(node.id, node.point(), &ways);
        }
    }

    fn handle_way(&mut self, way: &Way) {
        self.gate.check(EntityKind::Way);
        if !is_named_highway(&way.tags) {
            return;
        }
        match self.gate.phase() {
            AssemblerPhase::IndexWays => self.way_nodes.add_way(way, 0),
            _ => {
                let points = self.way_nodes.points(way.id);
                if points.len() < 2 {
                    log::warn!(
                        "Street {} has {} resolvable points, skipped",
                        way.id,
                        points.len()
                    );
                    return;
                }
                if points.len() != way.nodes.len() {
                    log::debug!("Street {} is missing some nodes", way.id);
                }
                self.sink.handle_street(
                    &way.tags,
                    LineString::from(points),
                    Meta::new(way.id, SourceKind::Way),
                );
            }
        }
    }

    fn handle_relation(&mut self, _relation: &Relation) {
        self.gate.check(EntityKind::Relation);
    }

    fn first_pass_done_relations(&mut self) {
        self.gate
            .advance(AssemblerPhase::IndexRelations, AssemblerPhase::IndexWays);
    }

    fn first_pass_done_ways(&mut self) {
        self.gate
            .advance(AssemblerPhase::IndexWays, AssemblerPhase::Coordinates);
        self.way_nodes.freeze_by_node();
    }

    fn first_pass_done_nodes(&mut self) {
        self.gate
            .advance(AssemblerPhase::Coordinates, AssemblerPhase::BuildWays);
        self.way_nodes.freeze_by_way();
        log::info!("{} street junctions found", self.junctions);
    }

    fn second_pass_done(&mut self) {
        self.gate.finish();
    }
}
