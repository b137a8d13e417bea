#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry assembly from raw map topology.
//!
//! The raw graph (nodes with coordinates, ways referencing nodes,
//! relations referencing ways) is never held in memory. Instead
//! [`topology::drive`] streams it twice, in a fixed order, to a set of
//! builders:
//!
//! 1. relations, then ways: builders index the node/way ids they will need
//!    into [`gazetteer_join_index::JoinIndex`] tables;
//! 2. nodes: coordinates are stamped into those tables;
//! 3. ways, then relations: geometries are assembled from the stamped
//!    tables and handed to the builder's sink.
//!
//! Each builder tracks its position in that protocol with an explicit
//! [`phase::AssemblerPhase`] and panics on an out-of-order call.

pub mod addresses;
pub mod boundaries;
pub mod highways;
pub mod housenumber;
pub mod interpolation;
pub mod phase;
pub mod pois;
pub mod records;
pub mod rings;
pub mod topology;
pub mod way_nodes;

pub use topology::{
    Entity, Member, MemoryTopology, Node, Pass, Relation, Tags, TopologyHandler, TopologyReader,
    Way, drive,
};

/// Returns `true` if the tag is present, whatever its value.
#[must_use]
pub fn has_tag(tags: &Tags, key: &str) -> bool {
    tags.contains_key(key)
}

/// Iterates tags as string slices, the shape `properties_from_tags`
/// expects.
pub fn tag_pairs(tags: &Tags) -> impl Iterator<Item = (&str, &str)> {
    tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}
