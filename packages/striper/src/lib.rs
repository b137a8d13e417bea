#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Longitude stripe partitioning.
//!
//! Assembled features are routed into `stripeNNNN.gjson` files, one per
//! `dx`-wide longitude band. Points go to the stripe of their longitude;
//! polygons and lines are first cut so that no piece crosses a stripe line,
//! then each piece goes to the stripe of its bounding box centroid.
//!
//! [`Slicer`] implements every assembler sink, so one instance can be
//! handed to all builders of a slicing run.

pub mod geometry;
pub mod pool;
pub mod slicer;
pub mod writer;

pub use slicer::{SliceReport, Slicer};

/// Errors from the partitioning stage.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature serialization error.
    #[error("Feature error: {0}")]
    Feature(#[from] gazetteer_feature::FeatureError),

    /// Worker pool error.
    #[error("Worker pool error: {0}")]
    Pool(String),
}
