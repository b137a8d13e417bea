//! Raw topology model and the two-pass driver.

use std::collections::BTreeMap;

use gazetteer_feature::EntityKind;
use geo::{Coord, Point};

/// Free-form entity tags.
pub type Tags = BTreeMap<String, String>;

/// A node with its coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// OSM id.
    pub id: i64,
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
    /// Tags.
    pub tags: Tags,
}

impl Node {
    /// The node position as a coordinate.
    #[must_use]
    pub const fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    /// The node position as a point.
    #[must_use]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A way: an ordered list of node ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    /// OSM id.
    pub id: i64,
    /// Node ids in order. Closed ways repeat the first id at the end.
    pub nodes: Vec<i64>,
    /// Tags.
    pub tags: Tags,
}

impl Way {
    /// Whether the way forms a ring.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }

    /// Node ids of a ring without the closing repeat.
    #[must_use]
    pub fn ring_nodes(&self) -> &[i64] {
        if self.is_closed() {
            &self.nodes[..self.nodes.len() - 1]
        } else {
            &self.nodes
        }
    }
}

/// A relation member reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Kind of the referenced entity.
    pub kind: EntityKind,
    /// Id of the referenced entity.
    pub id: i64,
    /// Member role (`outer`, `inner`, `street`, `house`...).
    pub role: String,
}

/// A relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// OSM id.
    pub id: i64,
    /// Members in order.
    pub members: Vec<Member>,
    /// Tags.
    pub tags: Tags,
}

/// Any topology element.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// Node.
    Node(Node),
    /// Way.
    Way(Way),
    /// Relation.
    Relation(Relation),
}

/// Which of the two reads over the input is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Index pass: relations then ways.
    First,
    /// Coordinate and build pass: nodes, ways, relations.
    Second,
}

/// Source of raw topology.
///
/// `read` is called once per pass and entity kind. Each call must visit
/// every entity of that kind; the order within a call does not matter.
pub trait TopologyReader {
    /// Read failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Visits every entity of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying source cannot be read.
    fn read(
        &mut self,
        pass: Pass,
        kind: EntityKind,
        visit: &mut dyn FnMut(&Entity),
    ) -> Result<(), Self::Error>;
}

/// Consumer of the two-pass protocol.
///
/// Entity callbacks arrive in the order relations, ways (first pass),
/// nodes, ways, relations (second pass), with the `*_done` signals in
/// between.
pub trait TopologyHandler {
    /// A node (second pass only).
    fn handle_node(&mut self, node: &Node);

    /// A way (both passes).
    fn handle_way(&mut self, way: &Way);

    /// A relation (both passes).
    fn handle_relation(&mut self, relation: &Relation);

    /// All relations of the first pass were delivered.
    fn first_pass_done_relations(&mut self);

    /// All ways of the first pass were delivered.
    fn first_pass_done_ways(&mut self);

    /// All nodes were delivered.
    fn first_pass_done_nodes(&mut self);

    /// The second pass is over.
    fn second_pass_done(&mut self);
}

fn dispatch(handlers: &mut [&mut dyn TopologyHandler], entity: &Entity) {
    for handler in handlers.iter_mut() {
        match entity {
            Entity::Node(node) => handler.handle_node(node),
            Entity::Way(way) => handler.handle_way(way),
            Entity::Relation(relation) => handler.handle_relation(relation),
        }
    }
}

/// Runs the two-pass protocol over `reader`, feeding every handler.
///
/// # Errors
///
/// Returns the first reader error. Handlers are left mid-protocol in that
/// case and must be discarded.
pub fn drive<R: TopologyReader + ?Sized>(
    reader: &mut R,
    handlers: &mut [&mut dyn TopologyHandler],
) -> Result<(), R::Error> {
    log::info!("First pass: relations");
    reader.read(Pass::First, EntityKind::Relation, &mut |e| {
        dispatch(&mut *handlers, e);
    })?;
    for handler in handlers.iter_mut() {
        handler.first_pass_done_relations();
    }

    log::info!("First pass: ways");
    reader.read(Pass::First, EntityKind::Way, &mut |e| {
        dispatch(&mut *handlers, e);
    })?;
    for handler in handlers.iter_mut() {
        handler.first_pass_done_ways();
    }

    log::info!("Second pass: nodes");
    reader.read(Pass::Second, EntityKind::Node, &mut |e| {
        dispatch(&mut *handlers, e);
    })?;
    for handler in handlers.iter_mut() {
        handler.first_pass_done_nodes();
    }

    log::info!("Second pass: ways");
    reader.read(Pass::Second, EntityKind::Way, &mut |e| {
        dispatch(&mut *handlers, e);
    })?;

    log::info!("Second pass: relations");
    reader.read(Pass::Second, EntityKind::Relation, &mut |e| {
        dispatch(&mut *handlers, e);
    })?;
    for handler in handlers.iter_mut() {
        handler.second_pass_done();
    }

    Ok(())
}

/// In-memory topology, mostly for tests and small extracts.
#[derive(Debug, Clone, Default)]
pub struct MemoryTopology {
    /// Nodes.
    pub nodes: Vec<Node>,
    /// Ways.
    pub ways: Vec<Way>,
    /// Relations.
    pub relations: Vec<Relation>,
}

impl MemoryTopology {
    /// Adds a node built from `(key, value)` tag pairs.
    pub fn node(&mut self, id: i64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> &mut Self {
        self.nodes.push(Node {
            id,
            lon,
            lat,
            tags: tags_from(tags),
        });
        self
    }

    /// Adds a way.
    pub fn way(&mut self, id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> &mut Self {
        self.ways.push(Way {
            id,
            nodes: nodes.to_vec(),
            tags: tags_from(tags),
        });
        self
    }

    /// Adds a relation whose members are all ways, given as `(id, role)`.
    pub fn relation(
        &mut self,
        id: i64,
        way_members: &[(i64, &str)],
        tags: &[(&str, &str)],
    ) -> &mut Self {
        self.relations.push(Relation {
            id,
            members: way_members
                .iter()
                .map(|&(id, role)| Member {
                    kind: EntityKind::Way,
                    id,
                    role: role.to_string(),
                })
                .collect(),
            tags: tags_from(tags),
        });
        self
    }
}

/// Builds [`Tags`] from string pairs.
#[must_use]
pub fn tags_from(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl TopologyReader for MemoryTopology {
    type Error = std::convert::Infallible;

    fn read(
        &mut self,
        _pass: Pass,
        kind: EntityKind,
        visit: &mut dyn FnMut(&Entity),
    ) -> Result<(), Self::Error> {
        match kind {
            EntityKind::Node => {
                for node in &self.nodes {
                    visit(&Entity::Node(node.clone()));
                }
            }
            EntityKind::Way => {
                for way in &self.ways {
                    visit(&Entity::Way(way.clone()));
                }
            }
            EntityKind::Relation => {
                for relation in &self.relations {
                    visit(&Entity::Relation(relation.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl TopologyHandler for Trace {
        fn handle_node(&mut self, node: &Node) {
            self.0.push(format!("n{}", node.id));
        }
        fn handle_way(&mut self, way: &Way) {
            self.0.push(format!("w{}", way.id));
        }
        fn handle_relation(&mut self, relation: &Relation) {
            self.0.push(format!("r{}", relation.id));
        }
        fn first_pass_done_relations(&mut self) {
            self.0.push("done-r".to_string());
        }
        fn first_pass_done_ways(&mut self) {
            self.0.push("done-w".to_string());
        }
        fn first_pass_done_nodes(&mut self) {
            self.0.push("done-n".to_string());
        }
        fn second_pass_done(&mut self) {
            self.0.push("done".to_string());
        }
    }

    #[test]
    fn drive_follows_the_two_pass_order() {
        let mut topology = MemoryTopology::default();
        topology
            .node(1, 0.0, 0.0, &[])
            .way(2, &[1, 1], &[])
            .relation(3, &[(2, "outer")], &[]);

        let mut trace = Trace::default();
        drive(&mut topology, &mut [&mut trace]).unwrap();

        assert_eq!(
            trace.0,
            vec![
                "r3", "done-r", "w2", "done-w", "n1", "done-n", "w2", "r3", "done"
            ]
        );
    }

    #[test]
    fn closed_way_ring_nodes_drop_the_repeat() {
        let way = Way {
            id: 1,
            nodes: vec![1, 2, 3, 1],
            tags: Tags::new(),
        };
        assert!(way.is_closed());
        assert_eq!(way.ring_nodes(), &[1, 2, 3]);

        let open = Way {
            id: 2,
            nodes: vec![1, 2],
            tags: Tags::new(),
        };
        assert!(!open.is_closed());
    }
}
