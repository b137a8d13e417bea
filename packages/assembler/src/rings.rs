//! Ring and multipolygon assembly from way lines.

use geo::{Area, Contains, Coord, LineString, MultiPolygon, Point, Polygon};

/// Whether `ring` can be the shell of a polygon: closed, at least four
/// points, non-zero area.
#[must_use]
pub fn is_valid_ring(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
        && ring.is_closed()
        && Polygon::new(ring.clone(), vec![]).unsigned_area() > 0.0
}

/// Polygon from a single closed coordinate list, if it forms a valid ring.
#[must_use]
pub fn ring_polygon(coords: Vec<Coord<f64>>) -> Option<Polygon<f64>> {
    let ring = LineString::from(coords);
    is_valid_ring(&ring).then(|| Polygon::new(ring, vec![]))
}

fn try_extend(chain: &mut Vec<Coord<f64>>, line: &[Coord<f64>]) -> bool {
    let (Some(&head), Some(&tail)) = (chain.first(), chain.last()) else {
        return false;
    };
    let (Some(&start), Some(&end)) = (line.first(), line.last()) else {
        return false;
    };

    if start == tail {
        chain.extend_from_slice(&line[1..]);
    } else if end == tail {
        chain.extend(line.iter().rev().skip(1));
    } else if end == head {
        let mut joined = line.to_vec();
        joined.extend_from_slice(&chain[1..]);
        *chain = joined;
    } else if start == head {
        let mut joined: Vec<Coord<f64>> = line.iter().rev().copied().collect();
        joined.extend_from_slice(&chain[1..]);
        *chain = joined;
    } else {
        return false;
    }
    true
}

/// Joins lines that share endpoints into closed rings.
///
/// Lines are reversed as needed. Chains that never close are discarded.
#[must_use]
pub fn merge_rings(lines: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut pending: Vec<Vec<Coord<f64>>> = lines.into_iter().filter(|l| l.len() >= 2).collect();
    let mut rings = Vec::new();

    while let Some(mut chain) = pending.pop() {
        loop {
            if chain.first() == chain.last() {
                if chain.len() >= 4 {
                    rings.push(LineString::from(chain));
                }
                break;
            }

            let Some(position) = pending.iter().position(|line| {
                let mut extended = chain.clone();
                try_extend(&mut extended, line)
            }) else {
                log::debug!("Dropping unclosed chain of {} points", chain.len());
                break;
            };

            let line = pending.swap_remove(position);
            try_extend(&mut chain, &line);
        }
    }

    rings
}

/// Builds a multipolygon from outer and inner member lines.
///
/// Each inner ring goes to the first outer polygon containing its first
/// vertex; inner rings outside every shell are ignored. Returns `None` when
/// no valid outer ring can be formed.
#[must_use]
pub fn build_multipolygon(
    outer: Vec<Vec<Coord<f64>>>,
    inner: Vec<Vec<Coord<f64>>>,
) -> Option<MultiPolygon<f64>> {
    let shells: Vec<Polygon<f64>> = merge_rings(outer)
        .into_iter()
        .filter(is_valid_ring)
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();
    if shells.is_empty() {
        return None;
    }

    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for ring in merge_rings(inner).into_iter().filter(is_valid_ring) {
        let first = Point::from(ring.0[0]);
        if let Some(i) = shells.iter().position(|shell| shell.contains(&first)) {
            holes[i].push(ring);
        }
    }

    Some(MultiPolygon::new(
        shells
            .into_iter()
            .zip(holes)
            .map(|(shell, interiors)| {
                let (exterior, _) = shell.into_inner();
                Polygon::new(exterior, interiors)
            })
            .collect(),
    ))
}
