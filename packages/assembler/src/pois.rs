//! POI and place point assembly.

use std::sync::Arc;

use gazetteer_feature::{EntityKind, Meta, SourceKind};
use geo::{Centroid, Geometry, Point};

use crate::phase::{AssemblerPhase, PhaseGate};
use crate::rings::ring_polygon;
use crate::topology::{Node, Relation, Tags, TopologyHandler, Way};
use crate::way_nodes::{WayNodes, WrittenNodes};

/// Tag keys that make an entity a POI.
pub const POI_KEYS: &[&str] = &["amenity", "shop", "tourism", "leisure", "office", "craft"];

/// `place` values emitted as place points.
pub const PLACE_VALUES: &[&str] = &[
    "city",
    "town",
    "village",
    "hamlet",
    "suburb",
    "neighbourhood",
    "quarter",
    "locality",
    "isolated_dwelling",
];

/// Receiver of POIs and place points.
pub trait PoiSink {
    /// A POI with its `key:value` categories, primary category first.
    fn handle_poi(&self, tags: &Tags, point: Point<f64>, meta: Meta, poi_types: Vec<String>);

    /// A place node.
    fn handle_place_point(&self, tags: &Tags, point: Point<f64>, meta: Meta);

    /// A POI node lies on the ring of a building way.
    fn handle_poi_to_building(&self, node_id: i64, node: Point<f64>, way_id: i64, tags: &Tags);
}

/// `key:value` categories of a tag set, in [`POI_KEYS`] order.
#[must_use]
pub fn poi_types(tags: &Tags) -> Vec<String> {
    POI_KEYS
        .iter()
        .filter_map(|key| tags.get(*key).map(|value| format!("{key}:{value}")))
        .collect()
}

fn is_place_point(tags: &Tags) -> bool {
    tags.get("place")
        .is_some_and(|p| PLACE_VALUES.contains(&p.as_str()))
}

/// POI, POI-to-building and place point builder.
pub struct PoiBuilder {
    sink: Arc<dyn PoiSink>,
    gate: PhaseGate,
    way_nodes: WayNodes,
    written: WrittenNodes,
}

impl PoiBuilder {
    /// Creates a builder that reports to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn PoiSink>) -> Self {
        Self {
            sink,
            gate: PhaseGate::new("pois"),
            way_nodes: WayNodes::new("poi node2way"),
            written: WrittenNodes::default(),
        }
    }

    fn build_way(&self, way: &Way, types: Vec<String>) {
        let points = self.way_nodes.points(way.id);
        let Some(&first) = points.first() else {
            log::error!("Failed to build POI geometry for way {}. No points found.", way.id);
            return;
        };

        let mut meta = Meta::new(way.id, SourceKind::Way);
        let complete = points.len() == way.nodes.len();
        let point = match ring_polygon(points).filter(|_| complete) {
            Some(polygon) => match polygon.centroid() {
                Some(centroid) => {
                    meta = meta.with_full_geometry(Geometry::Polygon(polygon));
                    centroid
                }
                None => Point::from(first),
            },
            None => {
                log::warn!("Invalid POI ring for way {}, using its first point", way.id);
                Point::from(first)
            }
        };

        self.sink.handle_poi(&way.tags, point, meta, types);
    }
}

impl TopologyHandler for PoiBuilder {
    fn handle_node(&mut self, node: &Node) {
        self.gate.check(EntityKind::Node);
        self.way_nodes.stamp(node);

        let types = poi_types(&node.tags);
        if !types.is_empty() {
            self.sink.handle_poi(
                &node.tags,
                node.point(),
                Meta::new(node.id, SourceKind::Node),
                types,
            );
            self.written.push(node);
        }

        if is_place_point(&node.tags) {
            self.sink.handle_place_point(
                &node.tags,
                node.point(),
                Meta::new(node.id, SourceKind::Node),
            );
        }
    }

    fn handle_way(&mut self, way: &Way) {
        self.gate.check(EntityKind::Way);
        let types = if way.is_closed() {
            poi_types(&way.tags)
        } else {
            Vec::new()
        };

        match self.gate.phase() {
            AssemblerPhase::IndexWays => {
                if !types.is_empty() {
                    self.way_nodes.add_way(way, 0);
                }
            }
            _ => {
                if !types.is_empty() {
                    self.build_way(way, types);
                }
                if way.is_closed() && way.tags.contains_key("building") {
                    for (node_id, point) in self.written.on_ring(way) {
                        self.sink
                            .handle_poi_to_building(node_id, point, way.id, &way.tags);
                    }
                }
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
        self.written.sort();
        self.way_nodes.freeze_by_way();
        log::info!("{} POI nodes written", self.written.len());
    }

    fn second_pass_done(&mut self) {
        self.gate.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::topology::{MemoryTopology, drive, tags_from};

    #[derive(Default)]
    struct Recorder {
        pois: Mutex<Vec<(i64, SourceKind, Vec<String>, bool)>>,
        places: Mutex<Vec<i64>>,
        buildings: Mutex<Vec<(i64, i64)>>,
    }

    impl PoiSink for Recorder {
        fn handle_poi(&self, _tags: &Tags, _point: Point<f64>, meta: Meta, poi_types: Vec<String>) {
            self.pois.lock().unwrap().push((
                meta.id,
                meta.kind,
                poi_types,
                meta.full_geometry.is_some(),
            ));
        }

        fn handle_place_point(&self, _tags: &Tags, _point: Point<f64>, meta: Meta) {
            self.places.lock().unwrap().push(meta.id);
        }

        fn handle_poi_to_building(&self, node_id: i64, _node: Point<f64>, way_id: i64, _tags: &Tags) {
            self.buildings.lock().unwrap().push((node_id, way_id));
        }
    }

    #[test]
    fn poi_types_follow_key_order() {
        let tags = tags_from(&[("shop", "bakery"), ("amenity", "cafe"), ("name", "X")]);
        assert_eq!(poi_types(&tags), vec!["amenity:cafe", "shop:bakery"]);
    }

    #[test]
    fn nodes_ways_places_and_buildings() {
        let mut topology = MemoryTopology::default();
        topology
            .node(1, 0.0, 0.0, &[("amenity", "cafe")])
            .node(2, 1.0, 0.0, &[])
            .node(3, 1.0, 1.0, &[])
            .node(4, 0.0, 1.0, &[])
            .node(5, 5.0, 5.0, &[("place", "village"), ("name", "V")])
            .node(6, 6.0, 6.0, &[("place", "country")])
            .way(
                20,
                &[1, 2, 3, 4, 1],
                &[("building", "yes"), ("shop", "mall")],
            );

        let recorder = Arc::new(Recorder::default());
        let mut builder = PoiBuilder::new(recorder.clone());
        drive(&mut topology, &mut [&mut builder]).unwrap();

        let pois = recorder.pois.lock().unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0], (1, SourceKind::Node, vec!["amenity:cafe".to_string()], false));
        assert_eq!(pois[1], (20, SourceKind::Way, vec!["shop:mall".to_string()], true));

        assert_eq!(*recorder.places.lock().unwrap(), vec![5]);
        assert_eq!(*recorder.buildings.lock().unwrap(), vec![(1, 20)]);
    }
}
