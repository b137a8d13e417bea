//! Administrative and place boundary assembly.

use std::sync::Arc;

use gazetteer_feature::{EntityKind, FeatureType, Meta, SourceKind};
use geo::MultiPolygon;

use crate::phase::{AssemblerPhase, PhaseGate};
use crate::rings::{build_multipolygon, ring_polygon};
use crate::topology::{Node, Relation, Tags, TopologyHandler, Way};
use crate::way_nodes::{RelationWays, WayNodes};

/// Receiver of assembled boundaries.
pub trait BoundarySink {
    /// A boundary polygon with its source tags.
    fn handle_boundary(&self, tags: &Tags, geometry: MultiPolygon<f64>, meta: Meta);
}

/// Whether the tags describe an administrative or place area.
#[must_use]
pub fn is_boundary(tags: &Tags) -> bool {
    let administrative = tags.get("boundary").is_some_and(|v| v == "administrative")
        && tags.contains_key("admin_level");
    administrative || tags.contains_key("place")
}

/// Feature type a boundary is written as.
#[must_use]
pub fn boundary_type(tags: &Tags) -> FeatureType {
    if tags.get("boundary").is_some_and(|v| v == "administrative") {
        FeatureType::AdminBoundary
    } else {
        FeatureType::PlaceBoundary
    }
}

fn is_area_relation(relation: &Relation) -> bool {
    relation
        .tags
        .get("type")
        .is_some_and(|t| t == "multipolygon" || t == "boundary")
        && is_boundary(&relation.tags)
}

/// Boundary builder.
pub struct BoundaryBuilder {
    sink: Arc<dyn BoundarySink>,
    gate: PhaseGate,
    relation_ways: RelationWays,
    way_nodes: WayNodes,
    built: usize,
}

impl BoundaryBuilder {
    /// Creates a builder that reports to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn BoundarySink>) -> Self {
        Self {
            sink,
            gate: PhaseGate::new("boundaries"),
            relation_ways: RelationWays::new("boundary way2relation", true),
            way_nodes: WayNodes::new("boundary node2way"),
            built: 0,
        }
    }

    /// Number of boundaries handed to the sink so far.
    #[must_use]
    pub const fn built(&self) -> usize {
        self.built
    }

    fn build_way(&mut self, way: &Way) {
        let points = self.way_nodes.points(way.id);
        if points.len() != way.nodes.len() {
            log::error!(
                "Failed to build boundary for way {}. {} of {} points found.",
                way.id,
                points.len(),
                way.nodes.len()
            );
            return;
        }
        let Some(polygon) = ring_polygon(points) else {
            log::error!("Invalid boundary ring for way {}", way.id);
            return;
        };

        self.emit(
            &way.tags,
            MultiPolygon::new(vec![polygon]),
            Meta::new(way.id, SourceKind::Way),
        );
    }

    fn build_relation(&mut self, relation: &Relation) {
        let members = self.relation_ways.members(relation.id);
        if members.is_empty() {
            return;
        }

        let mut outer = Vec::new();
        let mut inner = Vec::new();
        for member in members {
            let points = self.way_nodes.points(member.way_id);
            if points.is_empty() {
                log::error!(
                    "Failed to build boundary for relation {}. No points found for way {}.",
                    relation.id,
                    member.way_id
                );
                return;
            }
            if member.inner {
                inner.push(points);
            } else {
                outer.push(points);
            }
        }

        let Some(multipolygon) = build_multipolygon(outer, inner) else {
            log::error!("Failed to build multipolygon for relation {}", relation.id);
            return;
        };

        self.emit(
            &relation.tags,
            multipolygon,
            Meta::new(relation.id, SourceKind::Relation),
        );
    }

    fn emit(&mut self, tags: &Tags, geometry: MultiPolygon<f64>, meta: Meta) {
        self.built += 1;
        self.sink.handle_boundary(tags, geometry, meta);
    }
}

impl TopologyHandler for BoundaryBuilder {
    fn handle_node(&mut self, node: &Node) {
        self.gate.check(EntityKind::Node);
        self.way_nodes.stamp(node);
    }

    fn handle_way(&mut self, way: &Way) {
        self.gate.check(EntityKind::Way);
        let own_area = way.is_closed() && is_boundary(&way.tags);
        match self.gate.phase() {
            AssemblerPhase::IndexWays => {
                if own_area || self.relation_ways.contains_way(way.id) {
                    self.way_nodes.add_way(way, 0);
                }
            }
            _ => {
                if own_area {
                    self.build_way(way);
                }
            }
        }
    }

    fn handle_relation(&mut self, relation: &Relation) {
        self.gate.check(EntityKind::Relation);
        match self.gate.phase() {
            AssemblerPhase::IndexRelations => {
                if is_area_relation(relation) {
                    self.relation_ways.add_relation(relation);
                }
            }
            AssemblerPhase::BuildWays => {
                self.gate
                    .advance(AssemblerPhase::BuildWays, AssemblerPhase::BuildRelations);
                self.relation_ways.freeze_by_relation();
                self.build_relation(relation);
            }
            _ => self.build_relation(relation),
        }
    }

    fn first_pass_done_relations(&mut self) {
        self.gate
            .advance(AssemblerPhase::IndexRelations, AssemblerPhase::IndexWays);
        self.relation_ways.freeze_by_way();
        log::info!(
            "Done reading relations. {} boundary member ways indexed.",
            self.relation_ways.len()
        );
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
    }

    fn second_pass_done(&mut self) {
        self.gate.finish();
        log::info!("{} boundaries built", self.built);
    }
}
