#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial join over stripe partitions.
//!
//! Each `stripeNNNN.gjson` file is joined on its own: features are loaded
//! into typed arenas ([`partition::Partition`]), indexed in R-trees, and
//! linked to each other by position. Addresses end up carrying their
//! containing boundaries, nearby streets, proximity cells and associated
//! street; streets carry boundary rows and junctions; POIs are merged with
//! their polygonal twins and matched to addresses.
//!
//! [`joiner::Joiner`] runs one blocking task per partition, a bounded
//! number at a time, and collects failures into a [`joiner::JoinReport`]
//! instead of aborting the run.

pub mod joiner;
pub mod partition;
pub mod pois;
pub mod rows;
pub mod strategy;
pub mod task;

use std::path::PathBuf;

use gazetteer_feature::FeatureError;

pub use joiner::{JoinReport, Joiner};
pub use task::{JoinContext, JoinSliceTask, PartitionStats};

/// Errors from the join stage.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature (de)serialization error.
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// A line of a partition file could not be parsed.
    #[error("Failed to parse {}:{line}: {source}", path.display())]
    Parse {
        /// Partition file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Underlying error.
        source: FeatureError,
    },

    /// A written line does not read back as the record that produced it.
    #[error("Write check failed for {id} ({ftype}): read back {found_id} ({found_ftype})")]
    PostCondition {
        /// Id of the record.
        id: String,
        /// Feature type tag of the record.
        ftype: String,
        /// Id recovered from the written line.
        found_id: String,
        /// Feature type tag recovered from the written line.
        found_ftype: String,
    },

    /// Async task join error.
    #[error("Task join error: {0}")]
    Task(#[from] tokio::task::JoinError),
}
