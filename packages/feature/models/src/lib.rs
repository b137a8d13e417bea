#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the striped gazetteer pipeline.
//!
//! This crate contains only data types, configuration structs, and the
//! progress reporting trait. It has no heavyweight dependencies (no
//! geometry, no I/O), so every other package can depend on it.

pub mod progress;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Meters per degree of longitude at the equator, used to turn real-world
/// buffer distances into degrees.
pub const METERS_PER_DEGREE: f64 = 111_195.0;

/// Discriminator tag carried by every line of the exchange format.
///
/// The serialized names are the short tags written to the `ftype` field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum FeatureType {
    /// Administrative boundary polygon.
    #[serde(rename = "admbnd")]
    #[strum(serialize = "admbnd")]
    AdminBoundary,
    /// Place boundary polygon (`place=*` areas).
    #[serde(rename = "plcbnd")]
    #[strum(serialize = "plcbnd")]
    PlaceBoundary,
    /// Address point.
    #[serde(rename = "adrpnt")]
    #[strum(serialize = "adrpnt")]
    AddressPoint,
    /// Named street line.
    #[serde(rename = "hghway")]
    #[strum(serialize = "hghway")]
    Street,
    /// Street junction node.
    #[serde(rename = "hghnet")]
    #[strum(serialize = "hghnet")]
    Junction,
    /// Point of interest.
    #[serde(rename = "poipnt")]
    #[strum(serialize = "poipnt")]
    Poi,
    /// Place point (city, town, village...).
    #[serde(rename = "plcpnt")]
    #[strum(serialize = "plcpnt")]
    PlacePoint,
    /// Place proximity cell.
    #[serde(rename = "plcdln")]
    #[strum(serialize = "plcdln")]
    PlaceVoronoiCell,
    /// Neighbour proximity cell.
    #[serde(rename = "nbhdln")]
    #[strum(serialize = "nbhdln")]
    NeighbourVoronoiCell,
    /// POI node to building way association.
    #[serde(rename = "poi2bdng")]
    #[strum(serialize = "poi2bdng")]
    PoiToBuilding,
    /// Address node to building way association.
    #[serde(rename = "adr2bdng")]
    #[strum(serialize = "adr2bdng")]
    AddrNodeToBuilding,
    /// Associated-street relation.
    #[serde(rename = "asstrt")]
    #[strum(serialize = "asstrt")]
    AssociatedStreet,
}

impl FeatureType {
    /// Every feature type, in tag order.
    pub const ALL: &[Self] = &[
        Self::AdminBoundary,
        Self::PlaceBoundary,
        Self::AddressPoint,
        Self::Street,
        Self::Junction,
        Self::Poi,
        Self::PlacePoint,
        Self::PlaceVoronoiCell,
        Self::NeighbourVoronoiCell,
        Self::PoiToBuilding,
        Self::AddrNodeToBuilding,
        Self::AssociatedStreet,
    ];

    /// Returns `true` for admin and place boundary polygons.
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::AdminBoundary | Self::PlaceBoundary)
    }
}

/// Kind of a raw topology element.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    /// OSM node.
    Node,
    /// OSM way.
    Way,
    /// OSM relation.
    Relation,
}

/// Reference to a raw topology element. Not itself geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// OSM id.
    pub id: i64,
    /// Element kind.
    pub kind: EntityKind,
}

/// Origin of a feature as recorded in its `meta.type` field.
///
/// Superset of [`EntityKind`]: synthetic interpolation points are sourced
/// from a way but carry their own kind so they stay distinguishable from
/// directly tagged nodes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// Plain node.
    Node,
    /// Way (closed ring or line).
    Way,
    /// Relation.
    Relation,
    /// Point synthesized along an `addr:interpolation` way.
    Interpolation,
}

impl From<EntityKind> for SourceKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Node => Self::Node,
            EntityKind::Way => Self::Way,
            EntityKind::Relation => Self::Relation,
        }
    }
}

/// Stripe partitioning parameters.
///
/// Passed explicitly to every partitioning call; there is no process-wide
/// partitioner state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    /// Stripe width in degrees of longitude.
    pub dx: f64,
    /// Longitude of the stripe grid origin.
    pub x0: f64,
    /// Number of boundary splitting workers.
    pub workers: usize,
    /// How long `finish` waits for outstanding splitting tasks, in
    /// milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            dx: 0.1,
            x0: 0.0,
            workers: 4,
            drain_timeout_ms: 30_000,
        }
    }
}

impl StripeConfig {
    /// Drain timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Spatial join parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Number of partitions joined concurrently. `None` uses the available
    /// parallelism.
    pub threads: Option<usize>,
    /// Street buffer radius in meters.
    pub street_buffer_m: f64,
    /// POI to address search distance in meters.
    pub poi_buffer_m: f64,
    /// Source ids of boundaries a record must fall in to be emitted. Empty
    /// means no filtering.
    pub necessary_boundaries: Vec<String>,
    /// File name (relative to the stripes directory) holding boundaries
    /// appended to every record.
    pub common_boundaries_file: String,
    /// Output directory. Defaults to `<stripes>/joined`.
    pub out_dir: Option<String>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            threads: None,
            street_buffer_m: 250.0,
            poi_buffer_m: 100.0,
            necessary_boundaries: Vec::new(),
            common_boundaries_file: "common.gjson".to_string(),
            out_dir: None,
        }
    }
}

impl JoinConfig {
    /// Street buffer radius converted to degrees.
    #[must_use]
    pub fn street_buffer_degrees(&self) -> f64 {
        self.street_buffer_m / METERS_PER_DEGREE
    }

    /// POI search distance converted to degrees.
    #[must_use]
    pub fn poi_buffer_degrees(&self) -> f64 {
        self.poi_buffer_m / METERS_PER_DEGREE
    }
}

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GazetteerConfig {
    /// Partitioning parameters.
    pub stripe: StripeConfig,
    /// Join parameters.
    pub join: JoinConfig,
}
