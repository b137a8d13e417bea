//! Stripe splitting of polygons and lines.
//!
//! Stripe lines sit at `x0 + k·dx`. A polygon is cut along the stripe line
//! nearest to its bounding box center whenever that line runs strictly
//! through the box, and each piece is cut again until none straddles a
//! line. Lines are clipped at every stripe line they cross.

use gazetteer_feature_models::StripeConfig;
use geo::{
    Area, BooleanOps, BoundingRect, Coord, LineString, MapCoords, MultiPolygon, Polygon, Rect,
};

/// Pieces narrower than this on either side of a stripe line are final.
const STRADDLE_TOLERANCE: f64 = 1e-9;

/// Vertices this close to a cut are moved onto it. The boolean ops work on
/// a scaled integer grid, so cut edges come back slightly off the line.
const PIN_DISTANCE: f64 = 1e-7;

/// Recursion limit for [`stripe_polygon`].
const MAX_DEPTH: usize = 64;

/// Rounds half-up to 4 decimals.
fn round4(value: f64) -> f64 {
    value.mul_add(1e4, 0.5).floor() / 1e4
}

/// Stripe line nearest to `x`.
#[must_use]
pub fn snap(x: f64, config: &StripeConfig) -> f64 {
    round4(((x - config.x0) / config.dx).round().mul_add(config.dx, config.x0))
}

/// Splits `polygon` so that no piece crosses a stripe line. Zero-area
/// slivers produced by the cut are dropped.
#[must_use]
pub fn stripe_polygon(polygon: Polygon<f64>, config: &StripeConfig) -> Vec<Polygon<f64>> {
    let mut pieces = Vec::new();
    split(polygon, config, 0, &mut pieces);
    pieces
}

/// [`stripe_polygon`] over every member of a multipolygon.
#[must_use]
pub fn stripe_multipolygon(
    multipolygon: MultiPolygon<f64>,
    config: &StripeConfig,
) -> Vec<Polygon<f64>> {
    multipolygon
        .0
        .into_iter()
        .flat_map(|polygon| stripe_polygon(polygon, config))
        .collect()
}

fn split(polygon: Polygon<f64>, config: &StripeConfig, depth: usize, out: &mut Vec<Polygon<f64>>) {
    let Some(rect) = polygon.bounding_rect() else {
        return;
    };
    let (min, max) = (rect.min(), rect.max());
    let line = snap(rect.center().x, config);

    let straddles = line - min.x > STRADDLE_TOLERANCE && max.x - line > STRADDLE_TOLERANCE;
    if !straddles {
        out.push(polygon);
        return;
    }
    if depth >= MAX_DEPTH {
        log::warn!("Stripe split depth exceeded at x={line}, keeping piece as is");
        out.push(polygon);
        return;
    }

    let halves = [
        Rect::new(min, Coord { x: line, y: max.y }),
        Rect::new(Coord { x: line, y: min.y }, max),
    ];

    for half in halves {
        for piece in polygon.intersection(&half.to_polygon()).0 {
            let piece = pin_to_line(&piece, line);
            if piece.unsigned_area() > 0.0 {
                split(piece, config, depth + 1, out);
            }
        }
    }
}

fn pin_to_line(polygon: &Polygon<f64>, line: f64) -> Polygon<f64> {
    polygon.map_coords(|c| {
        if (c.x - line).abs() < PIN_DISTANCE {
            Coord { x: line, y: c.y }
        } else {
            c
        }
    })
}

/// Stripe lines strictly between `from` and `to`, in walking order.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn crossings(from: f64, to: f64, config: &StripeConfig) -> Vec<f64> {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    let first = ((lo - config.x0) / config.dx).floor() as i64;
    let last = ((hi - config.x0) / config.dx).ceil() as i64;

    let mut xs: Vec<f64> = (first..=last)
        .map(|k| round4((k as f64).mul_add(config.dx, config.x0)))
        .filter(|&x| x > lo && x < hi)
        .collect();
    if from > to {
        xs.reverse();
    }
    xs
}

/// Clips `line` at every stripe line it crosses. Each returned piece has
/// at least two points and lies within a single stripe.
#[must_use]
pub fn stripe_line(line: &LineString<f64>, config: &StripeConfig) -> Vec<LineString<f64>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();

    for segment in line.lines() {
        if current.is_empty() {
            current.push(segment.start);
        }
        let delta = segment.delta();
        for x in crossings(segment.start.x, segment.end.x, config) {
            let t = (x - segment.start.x) / delta.x;
            let cut = Coord {
                x,
                y: t.mul_add(delta.y, segment.start.y),
            };
            current.push(cut);
            pieces.push(LineString::from(std::mem::take(&mut current)));
            current.push(cut);
        }
        current.push(segment.end);
    }

    if current.len() > 1 {
        pieces.push(LineString::from(current));
    }
    pieces
}
