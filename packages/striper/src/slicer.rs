//! Routing of assembled geometry into stripe files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use gazetteer_assembler::addresses::AddrPointSink;
use gazetteer_assembler::boundaries::{BoundarySink, boundary_type};
use gazetteer_assembler::highways::HighwaySink;
use gazetteer_assembler::pois::PoiSink;
use gazetteer_assembler::rings::is_valid_ring;
use gazetteer_assembler::{Tags, tag_pairs};
use gazetteer_feature::id::feature_id;
use gazetteer_feature::{
    Feature, FeatureType, JsonObject, Meta, SourceKind, properties_from_tags,
};
use gazetteer_feature_models::StripeConfig;
use geo::{BoundingRect, Centroid, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde_json::{Value, json};

use crate::StripeError;
use crate::geometry::{stripe_line, stripe_multipolygon};
use crate::pool::{DrainReport, WorkerPool};
use crate::writer::PartitionWriter;

/// Summary of a slicing run.
#[derive(Debug, Clone)]
pub struct SliceReport {
    /// Number of lines written per feature type.
    pub written: BTreeMap<FeatureType, usize>,
    /// Stripes that received at least one line.
    pub partitions: Vec<u32>,
    /// Boundary splitting drain outcome.
    pub drain: DrainReport,
}

struct Shared {
    config: StripeConfig,
    writer: PartitionWriter,
    written: Mutex<BTreeMap<FeatureType, usize>>,
    first_error: Mutex<Option<StripeError>>,
}

impl Shared {
    fn write(&self, feature: &Feature, lon: f64) {
        match self.writer.write_feature(feature, lon) {
            Ok(_) => {
                *self
                    .written
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(feature.ftype)
                    .or_default() += 1;
            }
            Err(e) => self.fail(&feature.id, e),
        }
    }

    fn fail(&self, id: &str, error: StripeError) {
        log::error!("Failed to write {id}: {error}");
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn write_boundary(
        &self,
        ftype: FeatureType,
        properties: &JsonObject,
        geometry: MultiPolygon<f64>,
        meta: &Meta,
    ) {
        let pieces = stripe_multipolygon(geometry, &self.config);
        log::trace!("{} {} split into {} pieces", meta.kind, meta.id, pieces.len());

        for piece in pieces {
            let Some(center) = piece.bounding_rect().map(|r| r.centroid()) else {
                continue;
            };
            let feature = Feature::new(
                feature_id(ftype, center, &meta.id.to_string()),
                ftype,
                Geometry::Polygon(piece),
                properties.clone(),
                meta.clone(),
            );
            self.write(&feature, center.x());
        }
    }
}

/// Source id segment of a feature id. Interpolation points share their
/// way id, so their running counter is appended.
fn source_segment(meta: &Meta) -> String {
    match (meta.kind, meta.extra.get("counter").and_then(Value::as_i64)) {
        (SourceKind::Interpolation, Some(counter)) => format!("{}-{counter}", meta.id),
        _ => meta.id.to_string(),
    }
}

fn point_feature(
    ftype: FeatureType,
    source_id: &str,
    tags: &Tags,
    point: Point<f64>,
    meta: Meta,
) -> Feature {
    Feature::new(
        feature_id(ftype, point, source_id),
        ftype,
        Geometry::Point(point),
        properties_from_tags(tag_pairs(tags)),
        meta,
    )
}

fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    is_valid_ring(polygon.exterior())
        && polygon.interiors().iter().all(is_valid_ring)
        && polygon
            .exterior()
            .coords()
            .all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Stripe partitioner and sink for every assembler builder.
pub struct Slicer {
    shared: Arc<Shared>,
    pool: Mutex<Option<WorkerPool>>,
}

impl Slicer {
    /// Creates a slicer writing into `out_dir`.
    ///
    /// # Errors
    ///
    /// * If the output directory cannot be created
    /// * If the boundary workers cannot be spawned
    pub fn new(out_dir: impl Into<PathBuf>, config: StripeConfig) -> Result<Self, StripeError> {
        let writer = PartitionWriter::create(out_dir, config.clone())?;
        let pool = WorkerPool::new("boundary-slicer", config.workers)?;
        log::info!(
            "Slicing into {} with dx={} ({} workers)",
            writer.dir().display(),
            config.dx,
            config.workers
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                writer,
                written: Mutex::new(BTreeMap::new()),
                first_error: Mutex::new(None),
            }),
            pool: Mutex::new(Some(pool)),
        })
    }

    fn write_point(&self, feature: &Feature) {
        if let Some(point) = feature.point() {
            self.shared.write(feature, point.x());
        }
    }

    fn building_link(
        &self,
        ftype: FeatureType,
        node_id: i64,
        node: Point<f64>,
        way_id: i64,
        tags: &Tags,
    ) {
        let mut feature = point_feature(
            ftype,
            &format!("{node_id}-{way_id}"),
            tags,
            node,
            Meta::new(way_id, SourceKind::Way),
        );
        feature.attributes.insert("nodeId".to_string(), json!(node_id));
        self.write_point(&feature);
    }

    /// Waits for boundary splitting to drain, flushes every stripe and
    /// reports what was written. Boundaries handed over afterwards are
    /// split on the calling thread.
    ///
    /// # Errors
    ///
    /// * If any write failed during the run (the first error is returned)
    /// * If the final flush fails
    pub fn finish(&self) -> Result<SliceReport, StripeError> {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let drain = pool.map_or(
            DrainReport {
                completed: 0,
                outstanding: 0,
                panicked: 0,
            },
            |pool| pool.finish(self.shared.config.drain_timeout()),
        );

        self.shared.writer.flush()?;

        if let Some(error) = self
            .shared
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        let written = self
            .shared
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (ftype, count) in &written {
            log::info!("{count} {ftype} lines written");
        }

        Ok(SliceReport {
            written,
            partitions: self.shared.writer.partitions(),
            drain,
        })
    }
}

impl AddrPointSink for Slicer {
    fn handle_addr_point(&self, tags: &Tags, point: Point<f64>, meta: Meta) {
        let source = source_segment(&meta);
        let feature = point_feature(FeatureType::AddressPoint, &source, tags, point, meta);
        self.write_point(&feature);
    }

    fn handle_addr_node_to_building(&self, node_id: i64, node: Point<f64>, way_id: i64, tags: &Tags) {
        self.building_link(FeatureType::AddrNodeToBuilding, node_id, node, way_id, tags);
    }
}

impl BoundarySink for Slicer {
    fn handle_boundary(&self, tags: &Tags, geometry: MultiPolygon<f64>, meta: Meta) {
        if let Some(invalid) = geometry.0.iter().position(|p| !is_valid_polygon(p)) {
            log::error!(
                "Invalid boundary polygon #{invalid} for {} {}, skipped",
                meta.kind,
                meta.id
            );
            return;
        }

        let ftype = boundary_type(tags);
        let properties = properties_from_tags(tag_pairs(tags));
        let shared = Arc::clone(&self.shared);
        let job = move || shared.write_boundary(ftype, &properties, geometry, &meta);

        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        match pool.as_ref() {
            Some(pool) => {
                if let Err(e) = pool.submit(job) {
                    self.shared.fail("boundary", e);
                }
            }
            None => job(),
        }
    }
}

impl HighwaySink for Slicer {
    fn handle_street(&self, tags: &Tags, line: LineString<f64>, meta: Meta) {
        let properties = properties_from_tags(tag_pairs(tags));
        for piece in stripe_line(&line, &self.shared.config) {
            let Some(center) = piece.bounding_rect().map(|r| r.centroid()) else {
                continue;
            };
            let feature = Feature::new(
                feature_id(FeatureType::Street, center, &meta.id.to_string()),
                FeatureType::Street,
                Geometry::LineString(piece),
                properties.clone(),
                meta.clone(),
            );
            self.shared.write(&feature, center.x());
        }
    }

    fn handle_junction(&self, node_id: i64, point: Point<f64>, way_ids: &[i64]) {
        let mut feature = point_feature(
            FeatureType::Junction,
            &node_id.to_string(),
            &Tags::new(),
            point,
            Meta::new(node_id, SourceKind::Node),
        );
        feature.attributes.insert("ways".to_string(), json!(way_ids));
        self.write_point(&feature);
    }
}

impl PoiSink for Slicer {
    fn handle_poi(&self, tags: &Tags, point: Point<f64>, meta: Meta, poi_types: Vec<String>) {
        let source = meta.id.to_string();
        let mut feature = point_feature(FeatureType::Poi, &source, tags, point, meta);
        feature
            .attributes
            .insert("poiTypes".to_string(), json!(poi_types));
        self.write_point(&feature);
    }

    fn handle_place_point(&self, tags: &Tags, point: Point<f64>, meta: Meta) {
        let source = meta.id.to_string();
        let feature = point_feature(FeatureType::PlacePoint, &source, tags, point, meta);
        self.write_point(&feature);
    }

    fn handle_poi_to_building(&self, node_id: i64, node: Point<f64>, way_id: i64, tags: &Tags) {
        self.building_link(FeatureType::PoiToBuilding, node_id, node, way_id, tags);
    }
}
