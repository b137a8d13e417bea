//! Stripe numbering and file naming.
//!
//! Stripe `k` of a grid covers `[x0 + (k - offset)·dx, x0 + (k - offset + 1)·dx)`,
//! where `offset` numbers the stripe holding -180 as 0. Stripe edges are the
//! same lines the partitioner cuts polygons on.

use gazetteer_feature_models::StripeConfig;

/// Number of stripes between -180 and the grid origin.
#[allow(clippy::cast_possible_truncation)]
fn origin_offset(grid: &StripeConfig) -> i64 {
    ((180.0 + grid.x0) / grid.dx).round() as i64
}

/// Index of the stripe containing `lon`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn stripe_index(lon: f64, grid: &StripeConfig) -> u32 {
    let index = ((lon - grid.x0) / grid.dx).floor() as i64 + origin_offset(grid);
    u32::try_from(index.max(0)).unwrap_or(u32::MAX)
}

/// File name of a stripe: `stripe0042.gjson`.
#[must_use]
pub fn stripe_file_name(index: u32) -> String {
    format!("stripe{index:04}.gjson")
}

/// Parses a stripe index back out of a file name.
#[must_use]
pub fn parse_stripe_file_name(name: &str) -> Option<u32> {
    name.strip_prefix("stripe")?
        .strip_suffix(".gjson")?
        .parse()
        .ok()
}

/// Western edge of a stripe.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stripe_min_lon(index: u32, grid: &StripeConfig) -> f64 {
    let k = i64::from(index) - origin_offset(grid);
    (k as f64).mul_add(grid.dx, grid.x0)
}
