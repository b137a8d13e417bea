//! Stable feature ids.

use geo::Point;

use crate::{FeatureType, hilbert};

/// Builds the id of a feature: `"{ftype}-{hilbert}-{source id}"`.
///
/// `source_id` is usually the OSM id, but callers may pass a compound
/// segment (for example `"12-3"` for the third point of interpolation way
/// 12). Nothing after the second `-` is interpreted.
#[must_use]
pub fn feature_id(ftype: FeatureType, point: Point<f64>, source_id: &str) -> String {
    format!("{ftype}-{}-{source_id}", hilbert::encode_hex(point))
}
