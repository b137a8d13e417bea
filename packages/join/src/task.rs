//! Join of a single partition.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gazetteer_feature::codec::read_header;
use gazetteer_feature::{Feature, FeatureType, SourceKind};
use gazetteer_feature_models::JoinConfig;
use gazetteer_spatial::{PointIndex, PolygonIndex, distance_to_line, to_multipolygon};
use geo::{BoundingRect, Centroid, Contains, Coord, MultiPolygon, Point};
use serde_json::{Value, json};

use crate::JoinError;
use crate::partition::Partition;
use crate::pois::{best_fit_box, merge_pois};
use crate::rows::BoundaryRows;
use crate::strategy::{Strategies, name_tags, reference_with_properties};

/// Settings shared by every partition of a run.
pub struct JoinContext {
    /// Join parameters.
    pub config: JoinConfig,
    /// Source ids of the boundaries a record must fall in. Empty disables
    /// filtering.
    pub allow: HashSet<String>,
    /// Boundaries appended to every boundary list.
    pub common: Vec<Feature>,
    /// Injected join decisions.
    pub strategies: Strategies,
}

impl JoinContext {
    /// Builds a context, taking the allow-set from
    /// `config.necessary_boundaries`.
    #[must_use]
    pub fn new(config: JoinConfig, strategies: Strategies, common: Vec<Feature>) -> Self {
        let allow = config.necessary_boundaries.iter().cloned().collect();
        Self {
            config,
            allow,
            common,
            strategies,
        }
    }

    /// Whether a record joined to `boundaries` is emitted.
    #[must_use]
    pub fn passes(&self, boundaries: &[&Feature]) -> bool {
        self.allow.is_empty()
            || boundaries.iter().any(|b| {
                b.source_id_segment()
                    .is_some_and(|source| self.allow.contains(source))
            })
    }
}

/// Counters of one joined partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Features read.
    pub read: usize,
    /// Lines written, per feature type.
    pub written: BTreeMap<FeatureType, usize>,
    /// POIs marked as merged into a polygonal POI.
    pub merged_pois: usize,
}

impl PartitionStats {
    /// Total lines written.
    #[must_use]
    pub fn total_written(&self) -> usize {
        self.written.values().sum()
    }
}

/// Join results, keyed by arena position.
#[derive(Default)]
struct Links {
    addr_boundaries: Vec<Vec<usize>>,
    place_boundaries: Vec<Vec<usize>>,
    poi_boundaries: Vec<Vec<usize>>,
    street_rows: Vec<BoundaryRows>,
    addr_streets: Vec<Vec<usize>>,
    addr_place_cell: Vec<Option<usize>>,
    addr_neighbour_cell: Vec<Option<usize>>,
    addr_associated: Vec<Option<usize>>,
}

/// Reads one stripe file, joins it and writes the enriched records.
pub struct JoinSliceTask {
    src: PathBuf,
    out: PathBuf,
    context: Arc<JoinContext>,
}

fn point_index(features: &[Feature]) -> PointIndex {
    PointIndex::new(
        features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.point().map(|p| (i, p))),
    )
}

fn refs(boundaries: &[&Feature]) -> Value {
    boundaries
        .iter()
        .map(|b| reference_with_properties(b))
        .collect()
}

fn pick<'a>(arena: &'a [Feature], positions: &[usize]) -> Vec<&'a Feature> {
    positions.iter().map(|&i| &arena[i]).collect()
}

fn with_common<'a>(mut boundaries: Vec<&'a Feature>, common: &'a [Feature]) -> Vec<&'a Feature> {
    boundaries.extend(common);
    boundaries
}

/// Member ids of an associated-street relation, as strings.
fn member_ids(relation: &Feature) -> Vec<String> {
    relation
        .attributes
        .get("buildings")
        .and_then(Value::as_array)
        .map(|members| {
            members
                .iter()
                .map(|m| m.as_str().map_or_else(|| m.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `node id -> link position` for `adr2bdng` / `poi2bdng` records.
fn building_links(links: &[Feature]) -> HashMap<i64, usize> {
    links
        .iter()
        .enumerate()
        .filter_map(|(i, link)| {
            link.attributes
                .get("nodeId")
                .and_then(Value::as_i64)
                .map(|node| (node, i))
        })
        .collect()
}

fn attach_buildings(features: &mut [Feature], buildings: &[Feature]) -> usize {
    let by_node = building_links(buildings);
    let mut linked = 0;
    for feature in features
        .iter_mut()
        .filter(|f| f.meta.kind == SourceKind::Node)
    {
        if let Some(&i) = by_node.get(&feature.meta.id) {
            let building = &buildings[i];
            feature.enrichment.insert(
                "bndgWay".to_string(),
                json!({
                    "id": building.meta.id,
                    "properties": building.properties,
                }),
            );
            linked += 1;
        }
    }
    linked
}

impl JoinSliceTask {
    /// Creates a task reading `src` and writing `out`.
    #[must_use]
    pub const fn new(src: PathBuf, out: PathBuf, context: Arc<JoinContext>) -> Self {
        Self { src, out, context }
    }

    /// Input partition file.
    #[must_use]
    pub fn src(&self) -> &Path {
        &self.src
    }

    /// Runs the join.
    ///
    /// # Errors
    ///
    /// * If the partition cannot be read or parsed
    /// * If the output cannot be written
    /// * If a written line does not read back as its record
    pub fn run(&self) -> Result<PartitionStats, JoinError> {
        let mut partition = Partition::read(&self.src)?;
        let mut stats = PartitionStats {
            read: partition.len(),
            ..PartitionStats::default()
        };
        log::debug!("Joining {} ({} features)", self.src.display(), stats.read);

        let classifier = &self.context.strategies.classifier;
        partition.addresses.sort_by(|a, b| a.id.cmp(&b.id));
        partition.boundaries.sort_by(|a, b| a.id.cmp(&b.id));
        partition
            .boundaries
            .sort_by_cached_key(|b| classifier.level_of(b));

        let original_pois = point_index(&partition.pois);
        stats.merged_pois = merge_pois(&mut partition.pois, &original_pois);

        let mut links = self.join(&partition);

        let linked = attach_buildings(&mut partition.addresses, &partition.addr_buildings)
            + attach_buildings(&mut partition.pois, &partition.poi_buildings);
        log::trace!("{linked} nodes linked to their building");
        link_junctions(&mut partition);
        self.match_pois(&mut partition);

        links.addr_associated = associate_streets(&partition);

        stats.written = self.write(&partition, &links)?;
        log::debug!(
            "Joined {}: {} lines written",
            self.src.display(),
            stats.total_written()
        );
        Ok(stats)
    }

    fn join(&self, partition: &Partition) -> Links {
        let mut links = Links {
            addr_boundaries: vec![Vec::new(); partition.addresses.len()],
            place_boundaries: vec![Vec::new(); partition.places.len()],
            poi_boundaries: vec![Vec::new(); partition.pois.len()],
            street_rows: vec![BoundaryRows::default(); partition.streets.len()],
            addr_streets: vec![Vec::new(); partition.addresses.len()],
            ..Links::default()
        };

        let addresses = point_index(&partition.addresses);
        let places = point_index(&partition.places);
        let pois = point_index(&partition.pois);
        let street_vertices = PointIndex::new(
            partition
                .streets
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.line().map(|line| (i, line)))
                .flat_map(|(i, line)| line.points().map(move |p| (i, p))),
        );

        self.join_boundaries(partition, &addresses, &places, &pois, &street_vertices, &mut links);
        self.join_streets(partition, &addresses, &mut links);

        let place_cells = PolygonIndex::new(
            partition
                .place_cells
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.geometry.clone())),
        );
        let neighbour_cells = PolygonIndex::new(
            partition
                .neighbour_cells
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.geometry.clone())),
        );
        links.addr_place_cell = partition
            .addresses
            .iter()
            .map(|a| a.point().and_then(|p| place_cells.last_containing(p)))
            .collect();
        links.addr_neighbour_cell = partition
            .addresses
            .iter()
            .map(|a| a.point().and_then(|p| neighbour_cells.last_containing(p)))
            .collect();

        links
    }

    fn join_boundaries(
        &self,
        partition: &Partition,
        addresses: &PointIndex,
        places: &PointIndex,
        pois: &PointIndex,
        street_vertices: &PointIndex,
        links: &mut Links,
    ) {
        let classifier = &self.context.strategies.classifier;
        let levels: Vec<i32> = partition
            .boundaries
            .iter()
            .map(|b| classifier.level_of(b))
            .collect();
        let shapes: Vec<Option<MultiPolygon<f64>>> = partition
            .boundaries
            .iter()
            .map(|b| to_multipolygon(b.geometry.clone()))
            .collect();

        for (b, shape) in shapes.iter().enumerate() {
            let Some(shape) = shape else {
                log::warn!(
                    "Boundary {} has no polygon geometry, skipped",
                    partition.boundaries[b].id
                );
                continue;
            };

            for i in addresses.in_polygon(shape) {
                links.addr_boundaries[i].push(b);
            }
            for i in places.in_polygon(shape) {
                links.place_boundaries[i].push(b);
            }
            for i in pois.in_polygon(shape) {
                links.poi_boundaries[i].push(b);
            }

            let centroid: Option<Point<f64>> = shape.centroid();
            let last_contains_centroid = |last: usize| {
                centroid.is_some_and(|c| {
                    shapes[last]
                        .as_ref()
                        .is_some_and(|outer| outer.contains(&c))
                })
            };
            for s in street_vertices.in_polygon(shape) {
                links.street_rows[s].add(b, levels[b], |x| levels[x], &last_contains_centroid);
            }
        }
    }

    fn join_streets(&self, partition: &Partition, addresses: &PointIndex, links: &mut Links) {
        let d = self.context.config.street_buffer_degrees();

        for (s, street) in partition.streets.iter().enumerate() {
            let Some(line) = street.line() else {
                continue;
            };
            let Some(rect) = line.bounding_rect() else {
                continue;
            };
            let min = Coord {
                x: rect.min().x - d,
                y: rect.min().y - d,
            };
            let max = Coord {
                x: rect.max().x + d,
                y: rect.max().y + d,
            };

            for a in addresses.in_box(min, max) {
                let near = partition.addresses[a]
                    .point()
                    .is_some_and(|p| distance_to_line(p, line) <= d);
                if near {
                    links.addr_streets[a].push(s);
                }
            }
        }
    }

    fn match_pois(&self, partition: &mut Partition) {
        let d = self.context.config.poi_buffer_degrees();
        let addresses = point_index(&partition.addresses);
        let scorer = &self.context.strategies.scorer;

        for poi in &mut partition.pois {
            let Some(point) = poi.point() else {
                continue;
            };
            let (min, max) = best_fit_box(point, d);
            let candidates = pick(&partition.addresses, &addresses.in_box(min, max));
            if candidates.is_empty() {
                continue;
            }

            let best = scorer.score(poi, &candidates);
            if !best.is_empty() {
                let joined: Vec<Value> = best
                    .iter()
                    .filter_map(|&i| candidates.get(i))
                    .map(|addr| reference_with_properties(addr))
                    .collect();
                poi.enrichment
                    .insert("joinedAddresses".to_string(), Value::Array(joined));
            }
        }
    }

    fn write(
        &self,
        partition: &Partition,
        links: &Links,
    ) -> Result<BTreeMap<FeatureType, usize>, JoinError> {
        if let Some(parent) = self.out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&self.out)?);
        let mut written: BTreeMap<FeatureType, usize> = BTreeMap::new();
        let context = &self.context;
        let common = context.common.as_slice();
        let strategies = &context.strategies;

        let mut emit = |mut feature: Feature| -> Result<(), JoinError> {
            feature.add_timestamp();
            let line = feature.to_line()?;
            let header = read_header(&line)?;
            if header.id != feature.id || header.ftype != feature.ftype {
                return Err(JoinError::PostCondition {
                    id: feature.id,
                    ftype: feature.ftype.to_string(),
                    found_id: header.id,
                    found_ftype: header.ftype.to_string(),
                });
            }
            writeln!(out, "{line}")?;
            *written.entry(feature.ftype).or_default() += 1;
            Ok(())
        };

        let boundaries = &partition.boundaries;

        for (a, addr) in partition.addresses.iter().enumerate() {
            let joined = pick(boundaries, &links.addr_boundaries[a]);
            if joined.is_empty() || !context.passes(&joined) {
                continue;
            }
            let joined = with_common(joined, common);
            let streets = pick(&partition.streets, &links.addr_streets[a]);
            let record = strategies.handler.handle(
                addr,
                &joined,
                &streets,
                links.addr_place_cell[a].map(|c| &partition.place_cells[c]),
                links.addr_neighbour_cell[a].map(|c| &partition.neighbour_cells[c]),
                links.addr_associated[a].map(|r| &partition.associated_streets[r]),
            );
            emit(record)?;
        }

        for (s, street) in partition.streets.iter().enumerate() {
            let passing: Vec<Value> = links.street_rows[s]
                .rows()
                .iter()
                .map(|row| pick(boundaries, row))
                .filter(|row| context.passes(row))
                .map(|row| refs(&with_common(row, common)))
                .collect();
            if passing.is_empty() {
                continue;
            }

            let mut street = street.clone();
            street
                .enrichment
                .insert("boundaries".to_string(), Value::Array(passing));
            emit(street)?;
        }

        for junction in &partition.junctions {
            emit(junction.clone())?;
        }

        for (p, place) in partition.places.iter().enumerate() {
            let joined = pick(boundaries, &links.place_boundaries[p]);
            if joined.is_empty() || !context.passes(&joined) {
                continue;
            }
            let joined = with_common(joined, common);

            let mut place = place.clone();
            let name = place.tag("name").unwrap_or_default();
            let matched = joined
                .iter()
                .find(|b| strategies.matcher.is_place_name_match(name, &name_tags(b)))
                .map(|b| reference_with_properties(b));
            if let Some(matched) = matched {
                place
                    .enrichment
                    .insert("matchedBoundary".to_string(), matched);
            }
            place
                .enrichment
                .insert("boundaries".to_string(), refs(&joined));
            emit(place)?;
        }

        for (p, poi) in partition.pois.iter().enumerate() {
            let joined = pick(boundaries, &links.poi_boundaries[p]);
            let mut poi = poi.clone();
            if !joined.is_empty() && context.passes(&joined) {
                poi.enrichment.insert(
                    "boundaries".to_string(),
                    refs(&with_common(joined, common)),
                );
            }
            emit(poi)?;
        }

        drop(emit);
        out.flush()?;
        Ok(written)
    }
}

/// Links streets and junctions through the junction `ways` list.
fn link_junctions(partition: &mut Partition) {
    let mut streets_by_way: HashMap<i64, Vec<usize>> = HashMap::new();
    for (s, street) in partition.streets.iter().enumerate() {
        streets_by_way.entry(street.meta.id).or_default().push(s);
    }

    let mut junctions_by_street: Vec<Vec<usize>> = vec![Vec::new(); partition.streets.len()];
    for (j, junction) in partition.junctions.iter_mut().enumerate() {
        let ways: Vec<i64> = junction
            .attributes
            .get("ways")
            .and_then(Value::as_array)
            .map(|ways| ways.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        let mut refers = Vec::new();
        for way in ways {
            for &s in streets_by_way.get(&way).into_iter().flatten() {
                junctions_by_street[s].push(j);
                refers.push(partition.streets[s].as_reference());
            }
        }
        junction
            .enrichment
            .insert("waysRefers".to_string(), Value::Array(refers));
    }

    for (street, junctions) in partition.streets.iter_mut().zip(junctions_by_street) {
        if junctions.is_empty() {
            continue;
        }
        let ids: Vec<Value> = junctions
            .iter()
            .map(|&j| json!(partition.junctions[j].id))
            .collect();
        street
            .enrichment
            .insert("junctions".to_string(), Value::Array(ids));
    }
}

/// Associated-street relation of each address, by member id.
fn associate_streets(partition: &Partition) -> Vec<Option<usize>> {
    let mut by_member: HashMap<String, usize> = HashMap::new();
    for (r, relation) in partition.associated_streets.iter().enumerate() {
        for member in member_ids(relation) {
            by_member.insert(member, r);
        }
    }

    partition
        .addresses
        .iter()
        .map(|addr| by_member.get(&addr.meta.id.to_string()).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use gazetteer_feature::{Meta, properties_from_tags};
    use geo::{Geometry, LineString, Rect};

    use super::*;

    fn feature(ftype: FeatureType, id: i64, geometry: Geometry<f64>, tags: &[(&str, &str)]) -> Feature {
        Feature::new(
            format!("{ftype}-000000000000-{id}"),
            ftype,
            geometry,
            properties_from_tags(tags.iter().copied()),
            Meta::new(id, SourceKind::Node),
        )
    }

    fn square(id: i64, min: f64, max: f64, tags: &[(&str, &str)]) -> Feature {
        let mut boundary = feature(
            FeatureType::AdminBoundary,
            id,
            Geometry::Polygon(Rect::new((min, min), (max, max)).to_polygon()),
            tags,
        );
        boundary.meta.kind = SourceKind::Relation;
        boundary
    }

    fn point(ftype: FeatureType, id: i64, x: f64, y: f64, tags: &[(&str, &str)]) -> Feature {
        feature(ftype, id, Geometry::Point(Point::new(x, y)), tags)
    }

    fn sample_partition() -> Vec<Feature> {
        let mut street = feature(
            FeatureType::Street,
            200,
            Geometry::LineString(LineString::from(vec![(0.04, 0.051), (0.06, 0.051)])),
            &[("highway", "residential"), ("name", "Main Street")],
        );
        street.meta.kind = SourceKind::Way;

        let mut junction = point(FeatureType::Junction, 300, 0.06, 0.051, &[]);
        junction.attributes.insert("ways".to_string(), json!([200, 201]));

        let mut poi = point(FeatureType::Poi, 400, 0.0502, 0.0502, &[("amenity", "cafe")]);
        poi.attributes
            .insert("poiTypes".to_string(), json!(["amenity:cafe"]));

        let mut building = point(FeatureType::AddrNodeToBuilding, 500, 0.05, 0.05, &[("building", "yes")]);
        building.id = "adr2bdng-000000000000-100-500".to_string();
        building.meta = Meta::new(500, SourceKind::Way);
        building.attributes.insert("nodeId".to_string(), json!(100));

        vec![
            square(2, 0.0, 0.08, &[("admin_level", "8"), ("name", "Springfield")]),
            square(1, -1.0, 1.0, &[("admin_level", "4"), ("name", "State")]),
            point(
                FeatureType::AddressPoint,
                100,
                0.05,
                0.05,
                &[("addr:housenumber", "1"), ("addr:street", "Main Street")],
            ),
            point(FeatureType::AddressPoint, 101, 0.5, 0.5, &[("addr:housenumber", "2")]),
            street,
            junction,
            poi,
            building,
            point(FeatureType::PlacePoint, 600, 0.02, 0.02, &[("place", "town"), ("name", "springfield")]),
        ]
    }

    fn write_partition(dir: &Path, features: &[Feature]) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("stripe1800.gjson");
        let lines: Vec<String> = features.iter().map(|f| f.to_line().unwrap()).collect();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn read_output(path: &Path) -> Vec<Feature> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| Feature::from_line(line).unwrap())
            .collect()
    }

    fn find<'a>(features: &'a [Feature], ftype: FeatureType, osm_id: i64) -> Option<&'a Feature> {
        features
            .iter()
            .find(|f| f.ftype == ftype && f.meta.id == osm_id)
    }

    fn boundary_ids(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["osmId"].as_i64().unwrap())
            .collect()
    }

    fn run(name: &str, config: JoinConfig) -> (PathBuf, PartitionStats, Vec<Feature>) {
        run_features(name, &sample_partition(), config)
    }

    fn run_features(
        name: &str,
        partition: &[Feature],
        config: JoinConfig,
    ) -> (PathBuf, PartitionStats, Vec<Feature>) {
        let dir = std::env::temp_dir().join(format!("gazetteer_join_{name}_{}", std::process::id()));
        let src = write_partition(&dir, partition);
        let out = dir.join("joined").join("stripe1800.gjson");

        let context = Arc::new(JoinContext::new(config, Strategies::default(), Vec::new()));
        let stats = JoinSliceTask::new(src, out.clone(), context).run().unwrap();
        let features = read_output(&out);
        (dir, stats, features)
    }

    #[test]
    fn joins_a_whole_partition() {
        let (dir, stats, features) = run("whole", JoinConfig::default());

        assert_eq!(stats.read, 9);
        assert_eq!(stats.written[&FeatureType::AddressPoint], 2);
        assert_eq!(stats.written[&FeatureType::Street], 1);
        assert_eq!(stats.written[&FeatureType::Junction], 1);
        assert_eq!(stats.written[&FeatureType::Poi], 1);
        assert_eq!(stats.written[&FeatureType::PlacePoint], 1);
        assert!(!stats.written.contains_key(&FeatureType::AdminBoundary));
        assert!(!stats.written.contains_key(&FeatureType::AddrNodeToBuilding));

        let addr = find(&features, FeatureType::AddressPoint, 100).unwrap();
        assert_eq!(boundary_ids(&addr.attributes["boundaries"]), vec![1, 2]);
        assert_eq!(addr.attributes["nearbyStreets"][0]["osmId"], 200);
        assert_eq!(addr.attributes["bndgWay"]["id"], 500);
        assert!(addr.attributes.contains_key("timestamp"));

        let far = find(&features, FeatureType::AddressPoint, 101).unwrap();
        assert_eq!(boundary_ids(&far.attributes["boundaries"]), vec![1]);
        assert!(far.attributes["nearbyStreets"].as_array().unwrap().is_empty());

        let street = find(&features, FeatureType::Street, 200).unwrap();
        let rows = street.attributes["boundaries"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(boundary_ids(&rows[0]), vec![1, 2]);
        assert_eq!(
            street.attributes["junctions"],
            json!(["hghnet-000000000000-300"])
        );

        let junction = find(&features, FeatureType::Junction, 300).unwrap();
        assert_eq!(junction.attributes["waysRefers"][0]["osmId"], 200);

        let poi = find(&features, FeatureType::Poi, 400).unwrap();
        assert_eq!(poi.attributes["joinedAddresses"][0]["osmId"], 100);
        assert_eq!(boundary_ids(&poi.attributes["boundaries"]), vec![1, 2]);

        let place = find(&features, FeatureType::PlacePoint, 600).unwrap();
        assert_eq!(place.attributes["matchedBoundary"]["osmId"], 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn every_written_line_reads_back_with_its_header() {
        let (dir, _, features) = run("headers", JoinConfig::default());
        let out = dir.join("joined").join("stripe1800.gjson");
        let content = std::fs::read_to_string(&out).unwrap();

        for (line, feature) in content.lines().zip(&features) {
            let header = read_header(line).unwrap();
            assert_eq!(header.id, feature.id);
            assert_eq!(header.ftype, feature.ftype);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn records_outside_every_boundary_are_dropped() {
        let mut features = sample_partition();
        let mut lonely_street = feature(
            FeatureType::Street,
            210,
            Geometry::LineString(LineString::from(vec![(5.0, 5.0), (5.1, 5.0)])),
            &[("highway", "residential"), ("name", "Far Road")],
        );
        lonely_street.meta.kind = SourceKind::Way;
        features.extend([
            point(FeatureType::AddressPoint, 110, 5.0, 5.0, &[("addr:housenumber", "3")]),
            lonely_street,
            point(FeatureType::PlacePoint, 610, 5.0, 5.0, &[("place", "hamlet"), ("name", "Nowhere")]),
            point(FeatureType::Poi, 410, 5.0, 5.0, &[("shop", "bakery")]),
        ]);

        let (dir, stats, features) = run_features("outside", &features, JoinConfig::default());

        assert!(find(&features, FeatureType::AddressPoint, 110).is_none());
        assert!(find(&features, FeatureType::Street, 210).is_none());
        assert!(find(&features, FeatureType::PlacePoint, 610).is_none());
        let poi = find(&features, FeatureType::Poi, 410).unwrap();
        assert!(!poi.attributes.contains_key("boundaries"));
        assert_eq!(stats.written[&FeatureType::AddressPoint], 2);
        assert_eq!(stats.written[&FeatureType::Street], 1);
        assert_eq!(stats.written[&FeatureType::PlacePoint], 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn allow_set_filters_records() {
        let config = JoinConfig {
            necessary_boundaries: vec!["2".to_string()],
            ..JoinConfig::default()
        };
        let (dir, _, features) = run("allow", config);

        assert!(find(&features, FeatureType::AddressPoint, 100).is_some());
        assert!(find(&features, FeatureType::AddressPoint, 101).is_none());
        assert!(find(&features, FeatureType::Junction, 300).is_some());
        assert!(find(&features, FeatureType::Street, 200).is_some());

        let config = JoinConfig {
            necessary_boundaries: vec!["999".to_string()],
            ..JoinConfig::default()
        };
        let (dir2, _, features) = run("deny", config);
        assert!(find(&features, FeatureType::AddressPoint, 100).is_none());
        assert!(find(&features, FeatureType::Street, 200).is_none());
        assert!(find(&features, FeatureType::PlacePoint, 600).is_none());
        let poi = find(&features, FeatureType::Poi, 400).unwrap();
        assert!(!poi.attributes.contains_key("boundaries"));

        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::remove_dir_all(&dir2).unwrap();
    }

    #[test]
    fn common_boundaries_are_appended() {
        let dir = std::env::temp_dir().join(format!("gazetteer_join_common_{}", std::process::id()));
        let src = write_partition(&dir, &sample_partition());
        let out = dir.join("joined").join("stripe1800.gjson");

        let country = square(9, -90.0, 90.0, &[("admin_level", "2")]);
        let context = Arc::new(JoinContext::new(
            JoinConfig::default(),
            Strategies::default(),
            vec![country],
        ));
        JoinSliceTask::new(src, out.clone(), context).run().unwrap();

        let features = read_output(&out);
        let addr = find(&features, FeatureType::AddressPoint, 100).unwrap();
        assert_eq!(boundary_ids(&addr.attributes["boundaries"]), vec![1, 2, 9]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn associated_street_attaches_by_member_id() {
        let mut relation = point(FeatureType::AssociatedStreet, 700, 0.0, 0.0, &[("name", "Main Street")]);
        relation.meta.kind = SourceKind::Relation;
        relation.attributes.insert("buildings".to_string(), json!(["100", 555]));

        let addr = point(FeatureType::AddressPoint, 555, 0.0, 0.0, &[]);
        let other = point(FeatureType::AddressPoint, 556, 0.0, 0.0, &[]);

        let mut partition = Partition::default();
        for f in [relation, addr, other] {
            partition.push(f);
        }
        assert_eq!(associate_streets(&partition), vec![Some(0), None]);
    }

    #[test]
    fn passes_checks_source_segment() {
        let context = JoinContext::new(
            JoinConfig {
                necessary_boundaries: vec!["42".to_string()],
                ..JoinConfig::default()
            },
            Strategies::default(),
            Vec::new(),
        );
        let inside = square(42, 0.0, 1.0, &[]);
        let other = square(420, 0.0, 1.0, &[]);
        assert!(context.passes(&[&other, &inside]));
        assert!(!context.passes(&[&other]));
        assert!(!context.passes(&[]));

        let open = JoinContext::new(JoinConfig::default(), Strategies::default(), Vec::new());
        assert!(open.passes(&[]));
    }
}
