//! POI deduplication and address matching.

use gazetteer_feature::{Feature, JsonObject};
use gazetteer_spatial::PointIndex;
use geo::{BoundingRect, Contains, Coord, Point};
use serde_json::{Value, json};

/// First `poiTypes` entry of a POI.
#[must_use]
pub fn primary_type(poi: &Feature) -> Option<&str> {
    poi.attributes
        .get("poiTypes")
        .and_then(Value::as_array)
        .and_then(|types| types.first())
        .and_then(Value::as_str)
}

/// Whether the join marked a POI for removal.
#[must_use]
pub fn is_removed(poi: &Feature) -> bool {
    poi.enrichment.get("action").and_then(Value::as_str) == Some("remove")
}

/// Merges point POIs into the polygonal POI that contains them.
///
/// `index` holds the POI points before any merge. Every point POI with the
/// same primary type strictly inside a polygonal POI is marked
/// `action: "remove"` and donates the tags the survivor lacks. A survivor
/// that absorbed exactly one point moves onto it. Returns how many POIs
/// were marked.
pub fn merge_pois(pois: &mut [Feature], index: &PointIndex) -> usize {
    let mut removed = 0;

    for survivor in 0..pois.len() {
        let Some(polygon) = pois[survivor].full_polygon().cloned() else {
            continue;
        };
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        let Some(kind) = primary_type(&pois[survivor]).map(str::to_string) else {
            continue;
        };

        let inside: Vec<usize> = index
            .in_box(rect.min(), rect.max())
            .into_iter()
            .filter(|&i| i != survivor && !is_removed(&pois[i]))
            .filter(|&i| primary_type(&pois[i]) == Some(kind.as_str()))
            .filter(|&i| pois[i].point().is_some_and(|p| polygon.contains(&p)))
            .collect();

        let detail = format!(
            "Remove merged with polygonal boundary poi point.{}",
            pois[survivor].id
        );
        let mut merged = JsonObject::new();
        for &i in &inside {
            let candidate = &mut pois[i];
            candidate
                .enrichment
                .insert("action".to_string(), json!("remove"));
            candidate
                .enrichment
                .insert("actionDetailed".to_string(), json!(detail));
            for (key, value) in &candidate.properties {
                merged.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let moved_to = match inside.as_slice() {
            [only] => pois[*only].point(),
            _ => None,
        };

        let target = &mut pois[survivor];
        for (key, value) in merged {
            target.properties.entry(key).or_insert(value);
        }
        if let Some(point) = moved_to {
            target.geometry = point.into();
        }

        if !inside.is_empty() {
            log::debug!("POI {} absorbed {} points", target.id, inside.len());
        }
        removed += inside.len();
    }

    removed
}

/// Address search box of a POI: `d` west, south and north, `d / 4` east.
#[must_use]
pub fn best_fit_box(point: Point<f64>, d: f64) -> (Coord<f64>, Coord<f64>) {
    (
        Coord {
            x: point.x() - d,
            y: point.y() - d,
        },
        Coord {
            x: d.mul_add(0.25, point.x()),
            y: point.y() + d,
        },
    )
}

#[cfg(test)]
mod tests {
    use gazetteer_feature::{FeatureType, Meta, SourceKind, properties_from_tags};
    use geo::{Geometry, Rect};

    use super::*;

    fn poi(id: i64, x: f64, y: f64, kind: &str, tags: &[(&str, &str)]) -> Feature {
        let mut feature = Feature::new(
            format!("poipnt-000000000000-{id}"),
            FeatureType::Poi,
            Geometry::Point(Point::new(x, y)),
            properties_from_tags(tags.iter().copied()),
            Meta::new(id, SourceKind::Node),
        );
        feature
            .attributes
            .insert("poiTypes".to_string(), json!([kind]));
        feature
    }

    fn index(pois: &[Feature]) -> PointIndex {
        PointIndex::new(
            pois.iter()
                .enumerate()
                .filter_map(|(i, p)| p.point().map(|point| (i, point))),
        )
    }

    #[test]
    fn contained_point_is_merged_and_removed() {
        let mut building = poi(1, 0.5, 0.5, "amenity:cafe", &[("name", "Cafe")]);
        building.meta = Meta::new(1, SourceKind::Way).with_full_geometry(Geometry::Polygon(
            Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon(),
        ));
        let inside = poi(
            2,
            0.25,
            0.75,
            "amenity:cafe",
            &[("name", "Other"), ("opening_hours", "24/7")],
        );
        let other_kind = poi(3, 0.3, 0.3, "shop:bakery", &[]);
        let outside = poi(4, 2.0, 2.0, "amenity:cafe", &[]);

        let mut pois = vec![building, inside, other_kind, outside];
        let index = index(&pois);
        assert_eq!(merge_pois(&mut pois, &index), 1);

        assert!(is_removed(&pois[1]));
        assert_eq!(
            pois[1].enrichment["actionDetailed"],
            "Remove merged with polygonal boundary poi point.poipnt-000000000000-1"
        );
        assert!(!is_removed(&pois[2]));
        assert!(!is_removed(&pois[3]));

        assert_eq!(pois[0].tag("name"), Some("Cafe"));
        assert_eq!(pois[0].tag("opening_hours"), Some("24/7"));
        let moved = pois[0].point().unwrap();
        assert!((moved.x() - 0.25).abs() < 1e-12);
        assert!((moved.y() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn primary_type_reads_first_entry() {
        let mut feature = poi(1, 0.0, 0.0, "amenity:cafe", &[]);
        assert_eq!(primary_type(&feature), Some("amenity:cafe"));
        feature.attributes.remove("poiTypes");
        assert_eq!(primary_type(&feature), None);
    }

    #[test]
    fn search_box_is_narrow_to_the_east() {
        let (min, max) = best_fit_box(Point::new(10.0, 20.0), 0.4);
        assert!((min.x - 9.6).abs() < 1e-12);
        assert!((min.y - 19.6).abs() < 1e-12);
        assert!((max.x - 10.1).abs() < 1e-12);
        assert!((max.y - 20.4).abs() < 1e-12);
    }
}
