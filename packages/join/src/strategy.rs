//! Pluggable join strategies.
//!
//! The join engine does not know how administrative levels are ranked,
//! how place names are compared, how a POI picks its address, or how an
//! address record is finally shaped. Each of those decisions is a trait
//! object in [`Strategies`], with a default implementation here.

use std::sync::Arc;

use gazetteer_feature::Feature;
use geo::{Distance as _, Euclidean};
use serde_json::{Value, json};

/// Ranks boundaries from outermost to innermost.
pub trait LevelClassifier: Send + Sync {
    /// Level label of a boundary (`boundary:8`, `place:city`), if it has a
    /// recognizable one.
    fn addr_level(&self, boundary: &Feature) -> Option<String>;

    /// Sort key of a level label. Smaller is outer. Unknown labels are 0.
    fn level_size(&self, level: &str) -> i32;

    /// Sort key of a boundary, 0 when it has no recognizable level.
    fn level_of(&self, boundary: &Feature) -> i32 {
        self.addr_level(boundary)
            .map_or(0, |level| self.level_size(&level))
    }
}

/// Decides whether a place is named after a boundary.
pub trait PlaceNameMatcher: Send + Sync {
    /// `candidates` are the name tags of the boundary.
    fn is_place_name_match(&self, name: &str, candidates: &[&str]) -> bool;
}

/// Picks the addresses a POI most likely belongs to.
pub trait BestFitScorer: Send + Sync {
    /// Returns positions into `candidates`, best first. Empty when nothing
    /// fits.
    fn score(&self, poi: &Feature, candidates: &[&Feature]) -> Vec<usize>;
}

/// Shapes an address record from its join results.
pub trait AddrJoinHandler: Send + Sync {
    /// Returns the record to write. `boundaries` is ordered outer to inner
    /// and already includes the common boundaries.
    fn handle(
        &self,
        addr: &Feature,
        boundaries: &[&Feature],
        streets: &[&Feature],
        place_cell: Option<&Feature>,
        neighbour_cell: Option<&Feature>,
        associated_street: Option<&Feature>,
    ) -> Feature;
}

/// The set of strategies a join runs with.
#[derive(Clone)]
pub struct Strategies {
    /// Boundary level ranking.
    pub classifier: Arc<dyn LevelClassifier>,
    /// Place to boundary name matching.
    pub matcher: Arc<dyn PlaceNameMatcher>,
    /// POI to address selection.
    pub scorer: Arc<dyn BestFitScorer>,
    /// Address record shaping.
    pub handler: Arc<dyn AddrJoinHandler>,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            classifier: Arc::new(AdminLevelClassifier),
            matcher: Arc::new(CaseInsensitiveNameMatcher),
            scorer: Arc::new(NearestAddressScorer),
            handler: Arc::new(DefaultAddrJoinHandler),
        }
    }
}

/// `place` values ranked from largest to smallest.
const PLACE_LADDER: &[(&str, i32)] = &[
    ("city", 20),
    ("town", 21),
    ("village", 22),
    ("hamlet", 23),
    ("isolated_dwelling", 24),
    ("suburb", 30),
    ("quarter", 31),
    ("neighbourhood", 32),
    ("locality", 33),
    ("city_block", 34),
    ("plot", 35),
];

/// Ranks by `admin_level`, then by a fixed `place` ladder that sorts
/// below every administrative level.
pub struct AdminLevelClassifier;

impl LevelClassifier for AdminLevelClassifier {
    fn addr_level(&self, boundary: &Feature) -> Option<String> {
        if let Some(level) = boundary.tag("admin_level")
            && level.trim().parse::<i32>().is_ok()
        {
            return Some(format!("boundary:{}", level.trim()));
        }
        boundary
            .tag("place")
            .filter(|place| PLACE_LADDER.iter().any(|(name, _)| name == place))
            .map(|place| format!("place:{place}"))
    }

    fn level_size(&self, level: &str) -> i32 {
        if let Some(admin) = level.strip_prefix("boundary:") {
            return admin.parse().unwrap_or(0);
        }
        level
            .strip_prefix("place:")
            .and_then(|place| PLACE_LADDER.iter().find(|(name, _)| *name == place))
            .map_or(0, |(_, size)| *size)
    }
}

/// Matches names after trimming, ignoring case.
pub struct CaseInsensitiveNameMatcher;

impl PlaceNameMatcher for CaseInsensitiveNameMatcher {
    fn is_place_name_match(&self, name: &str, candidates: &[&str]) -> bool {
        let name = name.trim().to_lowercase();
        !name.is_empty()
            && candidates
                .iter()
                .any(|candidate| candidate.trim().to_lowercase() == name)
    }
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

/// Exact house number and street matches when the POI carries an address,
/// otherwise the single nearest address.
pub struct NearestAddressScorer;

impl BestFitScorer for NearestAddressScorer {
    fn score(&self, poi: &Feature, candidates: &[&Feature]) -> Vec<usize> {
        let exact: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, addr)| {
                same_text(poi.tag("addr:housenumber"), addr.tag("addr:housenumber"))
                    && same_text(poi.tag("addr:street"), addr.tag("addr:street"))
            })
            .map(|(i, _)| i)
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let Some(origin) = poi.point() else {
            return Vec::new();
        };
        candidates
            .iter()
            .enumerate()
            .filter_map(|(i, addr)| addr.point().map(|p| (i, Euclidean.distance(p, origin))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| vec![i])
            .unwrap_or_default()
    }
}

/// Name-like tags of a feature: `name`, `name:*`, `official_name`,
/// `alt_name`, `old_name`, `short_name`.
#[must_use]
pub fn name_tags(feature: &Feature) -> Vec<&str> {
    feature
        .properties
        .iter()
        .filter(|(key, _)| {
            key.as_str() == "name"
                || key.starts_with("name:")
                || matches!(
                    key.as_str(),
                    "official_name" | "alt_name" | "old_name" | "short_name"
                )
        })
        .filter_map(|(_, value)| value.as_str())
        .collect()
}

/// Reference to a joined feature with its tags.
#[must_use]
pub fn reference_with_properties(feature: &Feature) -> Value {
    let mut reference = feature.as_reference();
    if let Value::Object(object) = &mut reference {
        object.insert(
            "properties".to_string(),
            Value::Object(feature.properties.clone()),
        );
    }
    reference
}

/// Writes every join result into the address enrichment.
pub struct DefaultAddrJoinHandler;

impl AddrJoinHandler for DefaultAddrJoinHandler {
    fn handle(
        &self,
        addr: &Feature,
        boundaries: &[&Feature],
        streets: &[&Feature],
        place_cell: Option<&Feature>,
        neighbour_cell: Option<&Feature>,
        associated_street: Option<&Feature>,
    ) -> Feature {
        let mut joined = addr.clone();
        let enrichment = &mut joined.enrichment;

        enrichment.insert(
            "boundaries".to_string(),
            boundaries
                .iter()
                .map(|b| reference_with_properties(b))
                .collect(),
        );
        enrichment.insert(
            "nearbyStreets".to_string(),
            streets
                .iter()
                .map(|s| {
                    let mut reference = s.as_reference();
                    if let (Value::Object(object), Some(name)) = (&mut reference, s.tag("name")) {
                        object.insert("name".to_string(), json!(name));
                    }
                    reference
                })
                .collect(),
        );
        if let Some(cell) = place_cell {
            enrichment.insert("nearestCity".to_string(), reference_with_properties(cell));
        }
        if let Some(cell) = neighbour_cell {
            enrichment.insert(
                "nearestNeighbour".to_string(),
                reference_with_properties(cell),
            );
        }
        if let Some(relation) = associated_street {
            enrichment.insert(
                "associatedStreet".to_string(),
                reference_with_properties(relation),
            );
        }

        joined
    }
}

#[cfg(test)]
mod tests {
    use gazetteer_feature::{FeatureType, Meta, SourceKind, properties_from_tags};
    use geo::{Geometry, Point};

    use super::*;

    fn feature(ftype: FeatureType, id: i64, x: f64, tags: &[(&str, &str)]) -> Feature {
        Feature::new(
            format!("{ftype}-000000000000-{id}"),
            ftype,
            Geometry::Point(Point::new(x, 0.0)),
            properties_from_tags(tags.iter().copied()),
            Meta::new(id, SourceKind::Node),
        )
    }

    #[test]
    fn admin_levels_sort_before_places() {
        let classifier = AdminLevelClassifier;
        let state = feature(FeatureType::AdminBoundary, 1, 0.0, &[("admin_level", "4")]);
        let city = feature(FeatureType::PlaceBoundary, 2, 0.0, &[("place", "city")]);
        let suburb = feature(FeatureType::PlaceBoundary, 3, 0.0, &[("place", "suburb")]);
        let unknown = feature(FeatureType::PlaceBoundary, 4, 0.0, &[("place", "ocean")]);

        assert_eq!(classifier.addr_level(&state).as_deref(), Some("boundary:4"));
        assert_eq!(classifier.level_of(&state), 4);
        assert_eq!(classifier.level_of(&city), 20);
        assert_eq!(classifier.level_of(&suburb), 30);
        assert_eq!(classifier.addr_level(&unknown), None);
        assert_eq!(classifier.level_of(&unknown), 0);
    }

    #[test]
    fn name_matching_ignores_case_and_padding() {
        let matcher = CaseInsensitiveNameMatcher;
        assert!(matcher.is_place_name_match(" Springfield", &["Other", "springfield "]));
        assert!(!matcher.is_place_name_match("", &[""]));
        assert!(!matcher.is_place_name_match("Shelbyville", &["Springfield"]));
    }

    #[test]
    fn scorer_prefers_exact_address() {
        let poi = feature(
            FeatureType::Poi,
            1,
            0.0,
            &[("addr:housenumber", "5"), ("addr:street", "Main")],
        );
        let near = feature(
            FeatureType::AddressPoint,
            2,
            0.0001,
            &[("addr:housenumber", "7"), ("addr:street", "Main")],
        );
        let exact = feature(
            FeatureType::AddressPoint,
            3,
            0.0009,
            &[("addr:housenumber", "5"), ("addr:street", "main")],
        );

        let scorer = NearestAddressScorer;
        assert_eq!(scorer.score(&poi, &[&near, &exact]), vec![1]);

        let bare = feature(FeatureType::Poi, 4, 0.0, &[("amenity", "cafe")]);
        assert_eq!(scorer.score(&bare, &[&exact, &near]), vec![1]);
        assert!(scorer.score(&bare, &[]).is_empty());
    }

    #[test]
    fn default_handler_fills_enrichment() {
        let addr = feature(FeatureType::AddressPoint, 1, 0.0, &[("addr:housenumber", "1")]);
        let boundary = feature(FeatureType::AdminBoundary, 2, 0.0, &[("name", "Town")]);
        let street = feature(FeatureType::Street, 3, 0.0, &[("name", "Main")]);

        let joined = DefaultAddrJoinHandler.handle(&addr, &[&boundary], &[&street], None, None, None);

        assert_eq!(joined.id, addr.id);
        assert_eq!(joined.enrichment["boundaries"][0]["osmId"], 2);
        assert_eq!(joined.enrichment["boundaries"][0]["properties"]["name"], "Town");
        assert_eq!(joined.enrichment["nearbyStreets"][0]["name"], "Main");
        assert!(!joined.enrichment.contains_key("nearestCity"));
    }

    #[test]
    fn name_tags_pick_name_variants() {
        let boundary = feature(
            FeatureType::AdminBoundary,
            1,
            0.0,
            &[("name", "A"), ("name:en", "B"), ("official_name", "C"), ("admin_level", "8")],
        );
        let mut names = name_tags(&boundary);
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
