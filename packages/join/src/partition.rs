//! Typed arenas of one partition.

use std::fs::File;
use std::io::{BufRead as _, BufReader};
use std::path::Path;

use gazetteer_feature::{Feature, FeatureType};

use crate::JoinError;

/// Every feature of a partition, grouped by type. Join results refer to
/// features by their position in these vectors.
#[derive(Debug, Default)]
pub struct Partition {
    /// Admin and place boundaries.
    pub boundaries: Vec<Feature>,
    /// Address points.
    pub addresses: Vec<Feature>,
    /// Street lines.
    pub streets: Vec<Feature>,
    /// Street junctions.
    pub junctions: Vec<Feature>,
    /// Place points.
    pub places: Vec<Feature>,
    /// Place proximity cells.
    pub place_cells: Vec<Feature>,
    /// Neighbour proximity cells.
    pub neighbour_cells: Vec<Feature>,
    /// POIs.
    pub pois: Vec<Feature>,
    /// POI node to building links.
    pub poi_buildings: Vec<Feature>,
    /// Address node to building links.
    pub addr_buildings: Vec<Feature>,
    /// Associated-street relations.
    pub associated_streets: Vec<Feature>,
}

impl Partition {
    /// Files a feature into its arena.
    pub fn push(&mut self, feature: Feature) {
        let arena = match feature.ftype {
            FeatureType::AdminBoundary | FeatureType::PlaceBoundary => &mut self.boundaries,
            FeatureType::AddressPoint => &mut self.addresses,
            FeatureType::Street => &mut self.streets,
            FeatureType::Junction => &mut self.junctions,
            FeatureType::PlacePoint => &mut self.places,
            FeatureType::PlaceVoronoiCell => &mut self.place_cells,
            FeatureType::NeighbourVoronoiCell => &mut self.neighbour_cells,
            FeatureType::Poi => &mut self.pois,
            FeatureType::PoiToBuilding => &mut self.poi_buildings,
            FeatureType::AddrNodeToBuilding => &mut self.addr_buildings,
            FeatureType::AssociatedStreet => &mut self.associated_streets,
        };
        arena.push(feature);
    }

    /// Reads a partition file. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If a line is not a valid feature (reported with its line number)
    pub fn read(path: &Path) -> Result<Self, JoinError> {
        let reader = BufReader::new(File::open(path)?);
        let mut partition = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let feature = Feature::from_line(&line).map_err(|source| JoinError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;
            partition.push(feature);
        }

        Ok(partition)
    }

    /// Total number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        [
            &self.boundaries,
            &self.addresses,
            &self.streets,
            &self.junctions,
            &self.places,
            &self.place_cells,
            &self.neighbour_cells,
            &self.pois,
            &self.poi_buildings,
            &self.addr_buildings,
            &self.associated_streets,
        ]
        .iter()
        .map(|arena| arena.len())
        .sum()
    }

    /// Whether the partition holds no feature.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
