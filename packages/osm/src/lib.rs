#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! OpenStreetMap PBF topology reader.
//!
//! [`PbfTopology`] feeds the assembler's two-pass protocol straight from a
//! PBF extract. The file is decoded again for every requested entity kind,
//! so nothing but the current element is ever held in memory.

use std::path::{Path, PathBuf};

use gazetteer_assembler::{Entity, Member, Node, Pass, Relation, Tags, TopologyReader, Way};
use gazetteer_feature::EntityKind;
use osmpbf::{Element, ElementReader, RelMemberType};

/// Errors from OSM PBF reading.
#[derive(Debug, thiserror::Error)]
pub enum OsmError {
    /// PBF file not found.
    #[error("OSM PBF file not found: {0}")]
    FileNotFound(String),

    /// PBF parsing error.
    #[error("OSM PBF parse error in {path}: {message}")]
    Parse {
        /// Path to the PBF file.
        path: String,
        /// Error description.
        message: String,
    },
}

/// Topology reader over a PBF file.
#[derive(Debug, Clone)]
pub struct PbfTopology {
    path: PathBuf,
}

impl PbfTopology {
    /// Opens a PBF file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, OsmError> {
        if !path.exists() {
            return Err(OsmError::FileNotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn parse_error(&self, e: &osmpbf::Error) -> OsmError {
        OsmError::Parse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

fn collect_tags<'a>(tags: impl Iterator<Item = (&'a str, &'a str)>) -> Tags {
    tags.map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

const fn member_kind(member_type: RelMemberType) -> EntityKind {
    match member_type {
        RelMemberType::Node => EntityKind::Node,
        RelMemberType::Way => EntityKind::Way,
        RelMemberType::Relation => EntityKind::Relation,
    }
}

fn convert(element: &Element<'_>, kind: EntityKind) -> Option<Entity> {
    match (element, kind) {
        (Element::Node(node), EntityKind::Node) => Some(Entity::Node(Node {
            id: node.id(),
            lon: node.lon(),
            lat: node.lat(),
            tags: collect_tags(node.tags()),
        })),
        (Element::DenseNode(node), EntityKind::Node) => Some(Entity::Node(Node {
            id: node.id(),
            lon: node.lon(),
            lat: node.lat(),
            tags: collect_tags(node.tags()),
        })),
        (Element::Way(way), EntityKind::Way) => Some(Entity::Way(Way {
            id: way.id(),
            nodes: way.refs().collect(),
            tags: collect_tags(way.tags()),
        })),
        (Element::Relation(relation), EntityKind::Relation) => {
            Some(Entity::Relation(Relation {
                id: relation.id(),
                members: relation
                    .members()
                    .map(|m| Member {
                        kind: member_kind(m.member_type.clone()),
                        id: m.member_id,
                        role: m.role().unwrap_or_default().to_string(),
                    })
                    .collect(),
                tags: collect_tags(relation.tags()),
            }))
        }
        _ => None,
    }
}

impl TopologyReader for PbfTopology {
    type Error = OsmError;

    fn read(
        &mut self,
        pass: Pass,
        kind: EntityKind,
        visit: &mut dyn FnMut(&Entity),
    ) -> Result<(), Self::Error> {
        log::info!(
            "Reading {kind}s from {} ({pass:?} pass)",
            self.path.display()
        );

        let reader = ElementReader::from_path(&self.path).map_err(|e| self.parse_error(&e))?;

        let mut count: u64 = 0;
        reader
            .for_each(|element| {
                if let Some(entity) = convert(&element, kind) {
                    count += 1;
                    visit(&entity);
                }
            })
            .map_err(|e| self.parse_error(&e))?;

        log::info!("Read {count} {kind}s");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let path = std::env::temp_dir().join("gazetteer_osm_missing_test.osm.pbf");
        let err = PbfTopology::open(&path).unwrap_err();
        assert!(matches!(err, OsmError::FileNotFound(_)));
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = std::env::temp_dir().join("gazetteer_osm_garbage_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("garbage.osm.pbf");
        std::fs::write(&path, b"definitely not a pbf blob header").unwrap();

        let mut topology = PbfTopology::open(&path).unwrap();
        let result = topology.read(Pass::First, EntityKind::Relation, &mut |_| {});
        assert!(matches!(result, Err(OsmError::Parse { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn member_types_map_to_entity_kinds() {
        assert_eq!(member_kind(RelMemberType::Way), EntityKind::Way);
        assert_eq!(member_kind(RelMemberType::Relation), EntityKind::Relation);
    }
}
