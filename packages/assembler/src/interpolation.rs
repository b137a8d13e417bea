//! House-number interpolation along a line.

use geo::{Euclidean, InterpolatableLine as _, LineString, Point};

use crate::housenumber::MAX_HOUSENUMBER;

/// Step between synthesized numbers for an `addr:interpolation` value:
/// `all` is 1, `even`/`odd` are 2, a positive integer is itself.
#[must_use]
pub fn parse_step(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") {
        return Some(1);
    }
    if value.eq_ignore_ascii_case("even") || value.eq_ignore_ascii_case("odd") {
        return Some(2);
    }
    value.parse::<i32>().ok().filter(|step| *step > 0)
}

/// Numbers from `start` to `end` (both inclusive, either direction) in
/// increments of `step`, each placed at its proportional arc-length
/// position along `line`.
///
/// Ends further apart than [`MAX_HOUSENUMBER`] yield nothing.
#[must_use]
pub fn interpolate_numbers(
    line: &LineString<f64>,
    start: i32,
    end: i32,
    step: i32,
) -> Vec<(i32, Point<f64>)> {
    let gap = start.abs_diff(end);
    if gap > MAX_HOUSENUMBER.unsigned_abs() {
        log::warn!("Interpolation range {start}..{end} is too wide, skipped");
        return Vec::new();
    }

    let step = step.max(1);
    let span = f64::from(end) - f64::from(start);
    let direction = if end >= start { 1 } else { -1 };

    let mut points = Vec::new();
    let mut n = start;
    loop {
        let fraction = if gap == 0 {
            0.0
        } else {
            (f64::from(n) - f64::from(start)) / span
        };
        if let Some(point) = line.point_at_ratio_from_start(&Euclidean, fraction) {
            points.push((n, point));
        }

        let next = step
            .checked_mul(direction)
            .and_then(|delta| n.checked_add(delta));
        match next {
            Some(next) if (direction > 0 && next <= end) || (direction < 0 && next >= end) => {
                n = next;
            }
            _ => break,
        }
    }
    points
}
