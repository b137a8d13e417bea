//! Per-partition line writers.
//!
//! Every stripe file has its own lock, so tasks writing to different
//! stripes never wait on each other and lines written to the same stripe
//! never interleave.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use gazetteer_feature::Feature;
use gazetteer_feature::stripe::{stripe_file_name, stripe_index};
use gazetteer_feature_models::StripeConfig;

use crate::StripeError;

type Partition = Arc<Mutex<BufWriter<File>>>;

/// Appends lines to `stripeNNNN.gjson` files in one directory.
pub struct PartitionWriter {
    dir: PathBuf,
    grid: StripeConfig,
    partitions: Mutex<BTreeMap<u32, Partition>>,
}

impl PartitionWriter {
    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// * If the directory cannot be created
    pub fn create(dir: impl Into<PathBuf>, grid: StripeConfig) -> Result<Self, StripeError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            grid,
            partitions: Mutex::new(BTreeMap::new()),
        })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stripe index of a longitude under this writer's stripe grid.
    #[must_use]
    pub fn index_of(&self, lon: f64) -> u32 {
        stripe_index(lon, &self.grid)
    }

    fn partition(&self, index: u32) -> Result<Partition, StripeError> {
        let mut partitions = self
            .partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(partition) = partitions.get(&index) {
            return Ok(Arc::clone(partition));
        }

        let path = self.dir.join(stripe_file_name(index));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::debug!("Opened partition {}", path.display());

        let partition = Arc::new(Mutex::new(BufWriter::new(file)));
        partitions.insert(index, Arc::clone(&partition));
        Ok(partition)
    }

    /// Appends one line (without its terminator) to stripe `index`.
    ///
    /// # Errors
    ///
    /// * If the stripe file cannot be opened or written
    pub fn write_line(&self, index: u32, line: &str) -> Result<(), StripeError> {
        let partition = self.partition(index)?;
        let mut writer = partition.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Serializes `feature` into the stripe containing `lon`. Returns the
    /// stripe index.
    ///
    /// # Errors
    ///
    /// * If the feature cannot be serialized
    /// * If the stripe file cannot be opened or written
    pub fn write_feature(&self, feature: &Feature, lon: f64) -> Result<u32, StripeError> {
        let index = self.index_of(lon);
        self.write_line(index, &feature.to_line()?)?;
        Ok(index)
    }

    /// Flushes every open stripe.
    ///
    /// # Errors
    ///
    /// * If any buffered data cannot be written
    pub fn flush(&self) -> Result<(), StripeError> {
        let partitions = self
            .partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for partition in partitions.values() {
            partition
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush()?;
        }
        Ok(())
    }

    /// Indices of the stripes written so far, ascending.
    #[must_use]
    pub fn partitions(&self) -> Vec<u32> {
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}
