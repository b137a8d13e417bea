#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indices for the partition join.
//!
//! Every index stores arena positions (`usize`) rather than features, so
//! callers keep their features in plain `Vec`s and key join results by
//! position.

use geo::{
    BoundingRect, Coord, Distance as _, Euclidean, Geometry, Intersects as _, LineString,
    MultiPolygon, Point,
};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree, RTreeObject};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over points tagged with their arena position.
///
/// Several points may carry the same position (all vertices of one
/// street, for instance).
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// Bulk-loads `(position, point)` pairs.
    pub fn new(points: impl IntoIterator<Item = (usize, Point<f64>)>) -> Self {
        let entries: Vec<IndexedPoint> = points
            .into_iter()
            .map(|(i, p)| GeomWithData::new([p.x(), p.y()], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Positions of points inside the closed box `min..max`, sorted and
    /// deduplicated.
    #[must_use]
    pub fn in_box(&self, min: Coord<f64>, max: Coord<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.data)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Positions of points inside `polygon` or on its boundary, sorted and
    /// deduplicated.
    #[must_use]
    pub fn in_polygon(&self, polygon: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(rect) = polygon.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|entry| {
                let [x, y] = *entry.geom();
                polygon.intersects(&Point::new(x, y))
            })
            .map(|entry| entry.data)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// A polygon stored in the R-tree with its arena position.
struct PolygonEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for PolygonEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over polygons (proximity cells) tagged with their arena
/// position.
pub struct PolygonIndex {
    tree: RTree<PolygonEntry>,
}

impl PolygonIndex {
    /// Bulk-loads `(position, geometry)` pairs. Non-areal geometries are
    /// skipped.
    pub fn new(polygons: impl IntoIterator<Item = (usize, Geometry<f64>)>) -> Self {
        let mut skipped = 0;
        let entries: Vec<PolygonEntry> = polygons
            .into_iter()
            .filter_map(|(position, geometry)| {
                let Some(polygon) = to_multipolygon(geometry) else {
                    skipped += 1;
                    return None;
                };
                Some(PolygonEntry {
                    position,
                    envelope: compute_envelope(&polygon),
                    polygon,
                })
            })
            .collect();
        if skipped > 0 {
            log::warn!("Skipped {skipped} non-polygonal cells");
        }
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The highest position whose polygon covers `point` (edges included):
    /// the last matching cell in input order wins.
    #[must_use]
    pub fn last_containing(&self, point: Point<f64>) -> Option<usize> {
        let query = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .filter(|entry| entry.polygon.intersects(&point))
            .map(|entry| entry.position)
            .max()
    }
}

/// Converts polygons and multipolygons to a [`MultiPolygon`].
#[must_use]
pub fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        _ => None,
    }
}

/// Bounding box envelope of a [`MultiPolygon`].
#[must_use]
pub fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

/// Planar distance from a point to a line string, in coordinate units.
///
/// A point is inside the round-capped buffer of width `d` around `line`
/// exactly when this distance is at most `d`. An empty line is infinitely
/// far away.
#[must_use]
pub fn distance_to_line(point: Point<f64>, line: &LineString<f64>) -> f64 {
    match line.0.as_slice() {
        [] => f64::INFINITY,
        [only] => Euclidean.distance(point, Point::from(*only)),
        _ => Euclidean.distance(&point, line),
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + size, y),
                (x + size, y + size),
                (x, y + size),
                (x, y),
            ]),
            vec![],
        )
    }

    #[test]
    fn points_in_polygon_are_deduplicated() {
        let index = PointIndex::new(vec![
            (0, Point::new(0.5, 0.5)),
            (0, Point::new(0.6, 0.6)),
            (1, Point::new(5.0, 5.0)),
            (2, Point::new(0.9, 0.1)),
        ]);
        let found = index.in_polygon(&MultiPolygon::new(vec![square(0.0, 0.0, 1.0)]));
        assert_eq!(found, vec![0, 2]);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn box_query_is_inclusive() {
        let index = PointIndex::new(vec![(7, Point::new(1.0, 1.0))]);
        let found = index.in_box(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        assert_eq!(found, vec![7]);
    }

    #[test]
    fn last_containing_cell_wins() {
        let index = PolygonIndex::new(vec![
            (0, Geometry::Polygon(square(0.0, 0.0, 10.0))),
            (1, Geometry::Polygon(square(0.0, 0.0, 5.0))),
            (2, Geometry::Point(Point::new(1.0, 1.0))),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.last_containing(Point::new(1.0, 1.0)), Some(1));
        assert_eq!(index.last_containing(Point::new(8.0, 8.0)), Some(0));
        assert_eq!(index.last_containing(Point::new(20.0, 20.0)), None);
    }

    #[test]
    fn distance_to_line_uses_segment_projection() {
        let line = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert!((distance_to_line(Point::new(5.0, 3.0), &line) - 3.0).abs() < 1e-12);
        assert!((distance_to_line(Point::new(-3.0, -4.0), &line) - 5.0).abs() < 1e-12);
        assert!((distance_to_line(Point::new(12.0, 5.0), &line) - 2.0).abs() < 1e-12);
        assert!(distance_to_line(Point::new(4.0, 0.0), &line).abs() < 1e-12);
        assert!(distance_to_line(Point::new(0.0, 0.0), &LineString::new(vec![])).is_infinite());
        let single = LineString::from(vec![(1.0, 1.0)]);
        assert!((distance_to_line(Point::new(4.0, 5.0), &single) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn points_on_a_stripe_cut_belong_to_the_piece() {
        let piece = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(0.1, 0.0), (0.2, 0.0), (0.2, 1.0), (0.1, 1.0), (0.1, 0.0)]),
            vec![],
        )]);
        let index = PointIndex::new(vec![
            (0, Point::new(0.1, 0.5)),
            (1, Point::new(0.15, 0.5)),
            (2, Point::new(0.2, 0.0)),
            (3, Point::new(0.05, 0.5)),
        ]);
        assert_eq!(index.in_polygon(&piece), vec![0, 1, 2]);

        let cells = PolygonIndex::new(vec![(4, Geometry::MultiPolygon(piece))]);
        assert_eq!(cells.last_containing(Point::new(0.1, 0.5)), Some(4));
        assert_eq!(cells.last_containing(Point::new(0.05, 0.5)), None);
    }
}
