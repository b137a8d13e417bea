//! Address point assembly.
//!
//! Produces one address point per addressed node, closed way and
//! multipolygon relation, plus synthetic points along `addr:interpolation`
//! ways. Closed `building` ways that carry an address node on their ring
//! are reported as node-to-building associations.

use std::collections::HashMap;
use std::sync::Arc;

use gazetteer_feature::{EntityKind, Meta, SourceKind};
use gazetteer_join_index::JoinIndex;
use geo::{Centroid, Coord, Geometry, InteriorPoint, LineString, Point};

use crate::housenumber::parse_housenumber;
use crate::interpolation::{interpolate_numbers, parse_step};
use crate::phase::{AssemblerPhase, PhaseGate};
use crate::records::{INTERPOLATION_BY_NODE, InterpolationNodeRecord};
use crate::rings::{build_multipolygon, ring_polygon};
use crate::topology::{Node, Relation, Tags, TopologyHandler, Way};
use crate::way_nodes::{RelationWays, WayNodes, WrittenNodes};

const ADDR_HOUSENUMBER: &str = "addr:housenumber";
const ADDR_INTERPOLATION: &str = "addr:interpolation";
const ADDR_STREET: &str = "addr:street";

/// Receiver of assembled address points.
pub trait AddrPointSink {
    /// An address point with its source tags and meta block.
    fn handle_addr_point(&self, tags: &Tags, point: Point<f64>, meta: Meta);

    /// An emitted address node lies on the ring of a building way.
    fn handle_addr_node_to_building(&self, node_id: i64, node: Point<f64>, way_id: i64, tags: &Tags);
}

fn has_addr(tags: &Tags) -> bool {
    tags.contains_key(ADDR_HOUSENUMBER)
}

/// Address point builder.
pub struct AddrPointsBuilder {
    sink: Arc<dyn AddrPointSink>,
    gate: PhaseGate,
    relation_ways: RelationWays,
    way_nodes: WayNodes,
    interpolation_nodes: JoinIndex<InterpolationNodeRecord>,
    interpolation_streets: HashMap<i64, String>,
    written: WrittenNodes,
}

impl AddrPointsBuilder {
    /// Creates a builder that reports to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AddrPointSink>) -> Self {
        Self {
            sink,
            gate: PhaseGate::new("addresses"),
            relation_ways: RelationWays::new("address way2relation", false),
            way_nodes: WayNodes::new("address node2way"),
            interpolation_nodes: JoinIndex::new("address interpolation nodes"),
            interpolation_streets: HashMap::new(),
            written: WrittenNodes::default(),
        }
    }

    /// Current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> AssemblerPhase {
        self.gate.phase()
    }

    fn index_way(&mut self, way: &Way) {
        if way.is_closed() && has_addr(&way.tags) {
            self.way_nodes.add_way(way, 0);
        } else if way.tags.contains_key(ADDR_INTERPOLATION) {
            self.way_nodes.add_way(way, 1);
            for &node_id in &way.nodes {
                self.interpolation_nodes.insert(InterpolationNodeRecord {
                    node_id,
                    way_id: way.id,
                    housenumber: None,
                });
            }
        } else if self.relation_ways.contains_way(way.id) {
            self.way_nodes.add_way(way, 0);
        }
    }

    fn stamp_node(&mut self, node: &Node) {
        self.way_nodes.stamp(node);

        if !has_addr(&node.tags) {
            return;
        }

        let meta = Meta::new(node.id, SourceKind::Node);
        self.sink.handle_addr_point(&node.tags, node.point(), meta);
        self.written.push(node);

        let housenumber = node.tags.get(ADDR_HOUSENUMBER).and_then(|v| parse_housenumber(v));
        let street = node.tags.get(ADDR_STREET);
        let mut ways = Vec::new();
        self.interpolation_nodes
            .update_run(node.id, INTERPOLATION_BY_NODE, |record| {
                record.housenumber = housenumber;
                ways.push(record.way_id);
            });

        let Some(street) = street else {
            return;
        };
        for way_id in ways {
            match self.interpolation_streets.get(&way_id) {
                None => {
                    self.interpolation_streets.insert(way_id, street.clone());
                }
                Some(known) if known != street => {
                    log::warn!(
                        "Different streets on addr interpolated nodes. Interpolation way id: {way_id} street: {street} ({known}) Node: {}",
                        node.id
                    );
                }
                Some(_) => {}
            }
        }
    }

    fn build_way(&self, way: &Way) {
        let points = self.way_nodes.points(way.id);
        let Some(&first) = points.first() else {
            log::error!("Failed to build geometry for way {}. No points found.", way.id);
            return;
        };

        let mut meta = Meta::new(way.id, SourceKind::Way);
        let point = if points.len() != way.nodes.len() {
            log::warn!(
                "Failed to build geometry for way {}. Some points weren't found.",
                way.id
            );
            Point::from(first)
        } else if points.len() < 4 {
            log::warn!("Wrong number of points for way {}", way.id);
            Point::from(first)
        } else if let Some((polygon, centroid)) =
            ring_polygon(points).and_then(|p| p.centroid().map(|c| (p, c)))
        {
            meta = meta.with_full_geometry(Geometry::Polygon(polygon));
            centroid
        } else {
            log::warn!("Invalid ring for way {}, using its first point", way.id);
            Point::from(first)
        };

        self.sink.handle_addr_point(&way.tags, point, meta);
    }

    fn build_relation(&self, relation: &Relation) {
        let members = self.relation_ways.members(relation.id);
        if members.is_empty() {
            return;
        }

        let mut lines = Vec::with_capacity(members.len());
        for member in members {
            let points = self.way_nodes.points(member.way_id);
            if points.is_empty() {
                log::error!(
                    "Failed to build geometry for relation {}. No points found for way {}.",
                    relation.id,
                    member.way_id
                );
                return;
            }
            lines.push(points);
        }

        let first_line = LineString::from(lines[0].clone());
        let mut meta = Meta::new(relation.id, SourceKind::Relation);

        let from_polygon = build_multipolygon(lines, Vec::new())
            .and_then(|mp| mp.0.into_iter().next())
            .and_then(|polygon| polygon.interior_point().map(|p| (polygon, p)));

        let point = if let Some((polygon, point)) = from_polygon {
            meta = meta.with_full_geometry(Geometry::Polygon(polygon));
            point
        } else if let Some(centroid) = first_line.centroid() {
            log::warn!(
                "Failed to build multipolygon for relation {}, using line centroid",
                relation.id
            );
            centroid
        } else {
            log::error!("Failed to build geometry for relation {}", relation.id);
            return;
        };

        self.sink.handle_addr_point(&relation.tags, point, meta);
    }

    fn housenumber_of(&self, node_id: i64, way_id: i64) -> Option<i32> {
        self.interpolation_nodes
            .run(node_id, INTERPOLATION_BY_NODE)
            .iter()
            .find(|r| r.way_id == way_id)
            .and_then(|r| r.housenumber)
    }

    fn build_interpolation(&self, way: &Way) {
        let value = way.tags.get(ADDR_INTERPOLATION).map_or("", String::as_str);
        let Some(step) = parse_step(value) else {
            log::warn!("Unsupported interpolation type: {value} (way {})", way.id);
            return;
        };

        let records = self.way_nodes.ordered(way.id);
        if records.len() < 2 {
            return;
        }

        let mut counter = 0;
        let mut previous_node = None;
        let mut start: Option<(i64, i32)> = None;
        let mut coords: Vec<Coord<f64>> = Vec::new();

        for record in records {
            if previous_node == Some(record.node_id) {
                continue;
            }
            previous_node = Some(record.node_id);

            let Some(coord) = record.coord else {
                log::warn!(
                    "Broken interpolation {} at point {}. Node has no coordinates",
                    way.id,
                    record.node_id
                );
                start = None;
                coords.clear();
                continue;
            };
            coords.push(coord);

            match self.housenumber_of(record.node_id, way.id) {
                Some(housenumber) => {
                    if let Some(segment_start) = start {
                        counter = self.emit_segment(
                            way,
                            &coords,
                            segment_start,
                            (record.node_id, housenumber),
                            step,
                            counter,
                        );
                    }
                    coords.clear();
                    coords.push(coord);
                    start = Some((record.node_id, housenumber));
                }
                None if start.is_none() && way.nodes.first() == Some(&record.node_id) => {
                    log::warn!(
                        "Broken interpolation at point {}. First point has no recognizable addr:housenumber",
                        record.node_id
                    );
                }
                None => {}
            }
        }

        if let Some(last) = self.unaddressed_last_node(way) {
            log::warn!(
                "Broken interpolation at point {last}. Last point has no recognizable addr:housenumber"
            );
        }
    }

    /// Last node of an interpolation way when it carries no house number.
    fn unaddressed_last_node(&self, way: &Way) -> Option<i64> {
        let &last = way.nodes.last()?;
        (way.nodes.len() > 1 && self.housenumber_of(last, way.id).is_none()).then_some(last)
    }

    fn emit_segment(
        &self,
        way: &Way,
        coords: &[Coord<f64>],
        (start_node, start_hn): (i64, i32),
        (end_node, end_hn): (i64, i32),
        step: i32,
        mut counter: i64,
    ) -> i64 {
        let mut tags = way.tags.clone();
        if !tags.contains_key(ADDR_STREET)
            && let Some(street) = self.interpolation_streets.get(&way.id)
        {
            tags.insert(ADDR_STREET.to_string(), street.clone());
        }

        let line = LineString::new(coords.to_vec());
        for (number, point) in interpolate_numbers(&line, start_hn, end_hn, step) {
            let mut meta = Meta::new(way.id, SourceKind::Interpolation);
            if number == start_hn {
                meta = meta
                    .with("firstInInterpolation", true)
                    .with("basePointid", start_node);
            }
            if number == end_hn {
                meta = meta
                    .with("lastInInterpolation", true)
                    .with("basePointid", end_node);
            }
            meta = meta.with("counter", counter);
            counter += 1;

            tags.insert(ADDR_HOUSENUMBER.to_string(), number.to_string());
            self.sink.handle_addr_point(&tags, point, meta);
        }

        counter
    }

    fn link_building(&self, way: &Way) {
        for (node_id, point) in self.written.on_ring(way) {
            self.sink
                .handle_addr_node_to_building(node_id, point, way.id, &way.tags);
        }
    }
}

impl TopologyHandler for AddrPointsBuilder {
    fn handle_node(&mut self, node: &Node) {
        self.gate.check(EntityKind::Node);
        self.stamp_node(node);
    }

    fn handle_way(&mut self, way: &Way) {
        self.gate.check(EntityKind::Way);
        match self.gate.phase() {
            AssemblerPhase::IndexWays => self.index_way(way),
            _ => {
                if way.is_closed() && has_addr(&way.tags) {
                    self.build_way(way);
                } else if way.tags.contains_key(ADDR_INTERPOLATION) {
                    self.build_interpolation(way);
                }
                if way.is_closed() && way.tags.contains_key("building") {
                    self.link_building(way);
                }
            }
        }
    }

    fn handle_relation(&mut self, relation: &Relation) {
        self.gate.check(EntityKind::Relation);
        match self.gate.phase() {
            AssemblerPhase::IndexRelations => {
                if has_addr(&relation.tags) {
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
    }

    fn first_pass_done_ways(&mut self) {
        self.gate
            .advance(AssemblerPhase::IndexWays, AssemblerPhase::Coordinates);
        self.way_nodes.freeze_by_node();
        self.interpolation_nodes.freeze(INTERPOLATION_BY_NODE);
        log::info!(
            "Done reading ways. {} nodes added to the address index.",
            self.way_nodes.len()
        );
    }

    fn first_pass_done_nodes(&mut self) {
        self.gate
            .advance(AssemblerPhase::Coordinates, AssemblerPhase::BuildWays);
        self.written.sort();
        self.way_nodes.freeze_by_way();
        log::info!("{} address nodes written", self.written.len());
    }

    fn second_pass_done(&mut self) {
        self.gate.finish();
    }
}
