//! Hilbert-curve hashing of geographic points.
//!
//! Points close on the map get close hashes, so sorting feature ids keeps
//! spatial neighbours together in the output files.

use geo::Point;

/// Curve order. The grid has `2^ORDER` cells per axis.
pub const ORDER: u32 = 24;

const SIDE: u64 = 1 << ORDER;

/// Maps a grid cell to its distance along the Hilbert curve.
#[must_use]
pub fn xy_to_distance(mut x: u64, mut y: u64) -> u64 {
    let mut d = 0;
    let mut s = SIDE / 2;

    while s > 0 {
        let rx = u64::from(x & s > 0);
        let ry = u64::from(y & s > 0);
        d += s * s * ((3 * rx) ^ ry);

        if ry == 0 {
            if rx == 1 {
                x = SIDE - 1 - x;
                y = SIDE - 1 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }

        s /= 2;
    }

    d
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn to_cell(value: f64, min: f64, max: f64) -> u64 {
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    ((t * (SIDE - 1) as f64).round() as u64).min(SIDE - 1)
}

/// Hilbert distance of a lon/lat point.
#[must_use]
pub fn encode(point: Point<f64>) -> u64 {
    xy_to_distance(
        to_cell(point.x(), -180.0, 180.0),
        to_cell(point.y(), -90.0, 90.0),
    )
}

/// Hilbert distance of a lon/lat point as fixed-width lowercase hex.
#[must_use]
pub fn encode_hex(point: Point<f64>) -> String {
    format!("{:012x}", encode(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_of_the_grid() {
        assert_eq!(xy_to_distance(0, 0), 0);
        assert_eq!(xy_to_distance(SIDE - 1, 0), SIDE * SIDE - 1);
    }

    #[test]
    fn distance_is_a_bijection_on_a_small_block() {
        let mut seen = std::collections::BTreeSet::new();
        for x in 0..16 {
            for y in 0..16 {
                seen.insert(xy_to_distance(x, y));
            }
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn hex_is_fixed_width_and_stable() {
        let a = encode_hex(Point::new(13.4, 52.5));
        let b = encode_hex(Point::new(13.4, 52.5));
        assert_eq!(a.len(), 12);
        assert_eq!(a, b);
        assert_ne!(a, encode_hex(Point::new(-70.0, -33.0)));
    }

    #[test]
    fn out_of_range_coordinates_are_clamped() {
        assert_eq!(
            encode(Point::new(200.0, 95.0)),
            encode(Point::new(180.0, 90.0))
        );
    }
}
