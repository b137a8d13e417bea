#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature records and the line-delimited exchange format.
//!
//! Every stage of the pipeline talks in [`Feature`] values: the assembler
//! and striper write them, the join engine reads, enriches and rewrites
//! them. On disk each feature is one self-contained `GeoJSON`-style object
//! per line, carrying a short `ftype` tag (see [`FeatureType`]) next to the
//! standard `geometry`/`properties` members and a `meta` block with the
//! originating OSM entity.
//!
//! Ids are stable across runs: `"{ftype}-{hilbert}-{osm id}"`, where the
//! middle segment is a Hilbert-curve hash of the representative point
//! ([`id::feature_id`]).

pub mod codec;
pub mod hilbert;
pub mod id;
pub mod stripe;

use geo::{BoundingRect, Centroid, Geometry, LineString, Point, Polygon};
use serde_json::{Map, Value};

pub use gazetteer_feature_models::{EntityKind, EntityRef, FeatureType, SourceKind};

/// JSON object type used for properties and free-form blocks.
pub type JsonObject = Map<String, Value>;

/// Errors from reading or writing feature lines.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` geometry conversion error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// A mandatory member is absent.
    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    /// A member is present but unusable.
    #[error("Invalid field `{field}`: {message}")]
    InvalidField {
        /// Member name.
        field: &'static str,
        /// Error description.
        message: String,
    },
}

/// Originating entity of a feature (`meta` block).
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    /// OSM id of the source entity (the way id for interpolation points).
    pub id: i64,
    /// Kind of the source entity.
    pub kind: SourceKind,
    /// Full polygon geometry for features emitted as a representative
    /// point (closed ways, relations, polygonal POIs).
    pub full_geometry: Option<Geometry<f64>>,
    /// Any other `meta` members (interpolation counters, markers).
    pub extra: JsonObject,
}

impl Meta {
    /// Creates a meta block with no full geometry and no extra members.
    #[must_use]
    pub fn new(id: i64, kind: SourceKind) -> Self {
        Self {
            id,
            kind,
            full_geometry: None,
            extra: JsonObject::new(),
        }
    }

    /// Attaches a full geometry.
    #[must_use]
    pub fn with_full_geometry(mut self, geometry: Geometry<f64>) -> Self {
        self.full_geometry = Some(geometry);
        self
    }

    /// Adds an extra member.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// A single record of the exchange format.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Stable cross-run identifier.
    pub id: String,
    /// Feature type tag.
    pub ftype: FeatureType,
    /// Representative geometry (point, line or polygon).
    pub geometry: Geometry<f64>,
    /// Source tags.
    pub properties: JsonObject,
    /// Originating entity.
    pub meta: Meta,
    /// Type-specific top-level members present in the input (`poiTypes`,
    /// `ways`, `buildings`, `nodeId`...).
    pub attributes: JsonObject,
    /// Members added by the join stage (`boundaries`, `nearbyStreets`,
    /// `joinedAddresses`...). Serialized at top level.
    pub enrichment: JsonObject,
}

impl Feature {
    /// Creates a feature without attributes or enrichment.
    #[must_use]
    pub fn new(
        id: String,
        ftype: FeatureType,
        geometry: Geometry<f64>,
        properties: JsonObject,
        meta: Meta,
    ) -> Self {
        Self {
            id,
            ftype,
            geometry,
            properties,
            meta,
            attributes: JsonObject::new(),
            enrichment: JsonObject::new(),
        }
    }

    /// Returns the string value of a source tag.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Returns the geometry as a point, if it is one.
    #[must_use]
    pub fn point(&self) -> Option<Point<f64>> {
        match &self.geometry {
            Geometry::Point(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns the geometry as a line string, if it is one.
    #[must_use]
    pub const fn line(&self) -> Option<&LineString<f64>> {
        match &self.geometry {
            Geometry::LineString(ls) => Some(ls),
            _ => None,
        }
    }

    /// Returns the geometry as a polygon. Multi-polygons yield their first
    /// member.
    #[must_use]
    pub fn polygon(&self) -> Option<&Polygon<f64>> {
        match &self.geometry {
            Geometry::Polygon(p) => Some(p),
            Geometry::MultiPolygon(mp) => mp.0.first(),
            _ => None,
        }
    }

    /// Returns `meta.fullGeometry` when it is a polygon.
    #[must_use]
    pub const fn full_polygon(&self) -> Option<&Polygon<f64>> {
        match &self.meta.full_geometry {
            Some(Geometry::Polygon(p)) => Some(p),
            _ => None,
        }
    }

    /// Centroid of the geometry's bounding box, used as the partition key
    /// of polygons and lines.
    #[must_use]
    pub fn envelope_centroid(&self) -> Option<Point<f64>> {
        self.geometry.bounding_rect().map(|rect| rect.centroid())
    }

    /// Source id segment of the feature id (the part after the second
    /// `-`). This is how boundaries are matched against allow-lists.
    #[must_use]
    pub fn source_id_segment(&self) -> Option<&str> {
        self.id.splitn(3, '-').nth(2)
    }

    /// Compact reference used in `waysRefers`, `nearbyStreets` and similar
    /// members.
    #[must_use]
    pub fn as_reference(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "ftype": self.ftype,
            "osmId": self.meta.id,
        })
    }

    /// Stamps the current time into the `timestamp` member.
    pub fn add_timestamp(&mut self) {
        self.enrichment.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
}

/// Builds a `properties` object from string tags.
pub fn properties_from_tags<'a>(tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> JsonObject {
    tags.into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Feature {
        Feature::new(
            "admbnd-0000abcd-42".to_string(),
            FeatureType::AdminBoundary,
            Geometry::Point(Point::new(1.0, 2.0)),
            properties_from_tags([("name", "Somewhere")]),
            Meta::new(42, SourceKind::Relation),
        )
    }

    #[test]
    fn source_id_segment_is_third_part() {
        assert_eq!(sample().source_id_segment(), Some("42"));
    }

    #[test]
    fn tag_lookup_reads_string_properties() {
        let feature = sample();
        assert_eq!(feature.tag("name"), Some("Somewhere"));
        assert_eq!(feature.tag("missing"), None);
    }

    #[test]
    fn reference_carries_osm_id() {
        let reference = sample().as_reference();
        assert_eq!(reference["osmId"], 42);
        assert_eq!(reference["ftype"], "admbnd");
    }
}
