//! Join orchestration over a directory of stripes.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead as _, BufReader};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gazetteer_feature::Feature;
use gazetteer_feature::codec::read_header;
use gazetteer_feature::stripe::{parse_stripe_file_name, stripe_index};
use gazetteer_feature_models::{GazetteerConfig, StripeConfig};
use gazetteer_feature_models::progress::{ProgressCallback, StripeOutcome};
use geo::BoundingRect;

use crate::JoinError;
use crate::partition::Partition;
use crate::strategy::Strategies;
use crate::task::{JoinContext, JoinSliceTask, PartitionStats};

/// Outcome of a join run. Partition failures do not stop the run; they
/// are collected here.
#[derive(Debug, Default)]
pub struct JoinReport {
    /// Joined partitions with their counters, sorted by path.
    pub joined: Vec<(PathBuf, PartitionStats)>,
    /// Failed partitions with the error message, sorted by path.
    pub failed: Vec<(PathBuf, String)>,
}

impl JoinReport {
    /// Whether every partition was joined.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total lines written over every joined partition.
    #[must_use]
    pub fn total_written(&self) -> usize {
        self.joined
            .iter()
            .map(|(_, stats)| stats.total_written())
            .sum()
    }
}

/// Joins every stripe of a directory.
pub struct Joiner {
    stripes_dir: PathBuf,
    out_dir: PathBuf,
    threads: usize,
    grid: StripeConfig,
    context: Arc<JoinContext>,
}

/// Stripe files of `dir` with their index, sorted by name.
///
/// # Errors
///
/// * If the directory cannot be listed
pub fn stripe_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>, JoinError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_stripe_file_name);
        if let Some(index) = index {
            files.push((index, path));
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Stripe range covered by the boundaries whose source id is allowed.
/// `None` when no such boundary exists.
fn allowed_range(
    files: &[(u32, PathBuf)],
    allow: &HashSet<String>,
    grid: &StripeConfig,
) -> Result<Option<(u32, u32)>, JoinError> {
    let mut range: Option<(u32, u32)> = None;

    for (_, path) in files {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let Ok(header) = read_header(&line) else {
                continue;
            };
            if !header.ftype.is_boundary() {
                continue;
            }
            let boundary = Feature::from_line(&line)?;
            let allowed = boundary
                .source_id_segment()
                .is_some_and(|source| allow.contains(source));
            if !allowed {
                continue;
            }
            let Some(rect) = boundary.geometry.bounding_rect() else {
                continue;
            };
            let west = stripe_index(rect.min().x, grid);
            let east = stripe_index(rect.max().x, grid);
            range = Some(range.map_or((west, east), |(min, max)| (min.min(west), max.max(east))));
        }
    }

    Ok(range)
}

impl Joiner {
    /// Prepares a join of `stripes_dir`. Common boundaries are loaded from
    /// `join.common_boundaries_file` when that file exists.
    ///
    /// # Errors
    ///
    /// * If the common boundaries file exists but cannot be read
    pub fn new(
        stripes_dir: impl Into<PathBuf>,
        config: &GazetteerConfig,
        strategies: Strategies,
    ) -> Result<Self, JoinError> {
        let stripes_dir = stripes_dir.into();
        let join = config.join.clone();

        let common_path = stripes_dir.join(&join.common_boundaries_file);
        let common = if common_path.is_file() {
            let common = Partition::read(&common_path)?.boundaries;
            log::info!(
                "Loaded {} common boundaries from {}",
                common.len(),
                common_path.display()
            );
            common
        } else {
            Vec::new()
        };

        let out_dir = join
            .out_dir
            .as_ref()
            .map_or_else(|| stripes_dir.join("joined"), PathBuf::from);
        let threads = join
            .threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get))
            .max(1);

        Ok(Self {
            stripes_dir,
            out_dir,
            threads,
            grid: config.stripe.clone(),
            context: Arc::new(JoinContext::new(join, strategies, common)),
        })
    }

    /// Directory the joined stripes are written to.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Number of partitions joined concurrently.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    async fn select_files(&self) -> Result<Vec<(u32, PathBuf)>, JoinError> {
        let dir = self.stripes_dir.clone();
        let files = tokio::task::spawn_blocking(move || stripe_files(&dir)).await??;
        if self.context.allow.is_empty() {
            return Ok(files);
        }

        let allow = self.context.allow.clone();
        let grid = self.grid.clone();
        let (files, range) = tokio::task::spawn_blocking(move || {
            let range = allowed_range(&files, &allow, &grid);
            (files, range)
        })
        .await?;

        match range? {
            Some((west, east)) => {
                log::info!("Allowed boundaries span stripes {west}..={east}");
                Ok(files
                    .into_iter()
                    .filter(|(index, _)| (west..=east).contains(index))
                    .collect())
            }
            None => {
                log::warn!("No allowed boundary found in the stripes, joining every stripe");
                Ok(files)
            }
        }
    }

    /// Joins every selected stripe, at most [`Self::threads`] at a time.
    ///
    /// # Errors
    ///
    /// * If the stripes directory cannot be listed
    /// * If the output directory cannot be created
    ///
    /// Failures of single partitions are reported in the [`JoinReport`].
    pub async fn run(
        &self,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<JoinReport, JoinError> {
        use futures::stream::{self, StreamExt as _};

        let files = self.select_files().await?;
        tokio::fs::create_dir_all(&self.out_dir).await?;

        log::info!(
            "Joining {} stripes from {} (threads={})",
            files.len(),
            self.stripes_dir.display(),
            self.threads
        );
        if let Some(p) = &progress {
            p.join_started(files.len() as u64);
        }

        let results: Vec<_> = stream::iter(files.into_iter().map(|(index, src)| {
            let out = self.out_dir.join(src.file_name().unwrap_or_default());
            let task = JoinSliceTask::new(src.clone(), out, self.context.clone());
            let progress = progress.clone();
            async move {
                let result = tokio::task::spawn_blocking(move || task.run()).await;
                if let Some(p) = &progress {
                    let outcome = match &result {
                        Ok(Ok(stats)) => StripeOutcome::Joined(stats.total_written()),
                        _ => StripeOutcome::Failed,
                    };
                    p.stripe_joined(index, outcome);
                }
                (src, result)
            }
        }))
        .buffer_unordered(self.threads)
        .collect()
        .await;

        let mut report = JoinReport::default();
        for (src, result) in results {
            match result {
                Ok(Ok(stats)) => report.joined.push((src, stats)),
                Ok(Err(e)) => {
                    log::error!("Failed to join stripe {}: {e}", src.display());
                    report.failed.push((src, e.to_string()));
                }
                Err(e) => {
                    log::error!("Join task for stripe {} panicked: {e}", src.display());
                    report.failed.push((src, e.to_string()));
                }
            }
        }
        report.joined.sort_by(|a, b| a.0.cmp(&b.0));
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        let summary = format!(
            "Joined {} stripes ({} lines), {} failed",
            report.joined.len(),
            report.total_written(),
            report.failed.len()
        );
        log::info!("{summary}");
        if let Some(p) = &progress {
            p.finished(&summary);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use gazetteer_feature::stripe::stripe_file_name;
    use gazetteer_feature::{FeatureType, Meta, SourceKind, properties_from_tags};
    use geo::{Geometry, Point, Rect};

    use super::*;

    fn boundary(id: i64, min_x: f64, max_x: f64) -> Feature {
        Feature::new(
            format!("admbnd-000000000000-{id}"),
            FeatureType::AdminBoundary,
            Geometry::Polygon(Rect::new((min_x, 0.0), (max_x, 1.0)).to_polygon()),
            properties_from_tags([("admin_level", "8")]),
            Meta::new(id, SourceKind::Relation),
        )
    }

    fn address(id: i64, x: f64) -> Feature {
        Feature::new(
            format!("adrpnt-000000000000-{id}"),
            FeatureType::AddressPoint,
            Geometry::Point(Point::new(x, 0.5)),
            properties_from_tags([("addr:housenumber", "1")]),
            Meta::new(id, SourceKind::Node),
        )
    }

    fn write_stripe(dir: &Path, index: u32, features: &[Feature]) {
        let lines: Vec<String> = features.iter().map(|f| f.to_line().unwrap()).collect();
        std::fs::write(dir.join(stripe_file_name(index)), lines.join("\n") + "\n").unwrap();
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gazetteer_joiner_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[derive(Default)]
    struct Counter {
        total: AtomicU64,
        done: AtomicU64,
        failed: std::sync::Mutex<Vec<u32>>,
    }

    impl ProgressCallback for Counter {
        fn join_started(&self, stripes: u64) {
            self.total.store(stripes, Ordering::SeqCst);
        }

        fn stripe_joined(&self, index: u32, outcome: StripeOutcome) {
            self.done.fetch_add(1, Ordering::SeqCst);
            if outcome == StripeOutcome::Failed {
                self.failed.lock().unwrap().push(index);
            }
        }
    }

    #[tokio::test]
    async fn joins_every_stripe_and_isolates_failures() {
        let dir = temp_dir("all");
        write_stripe(&dir, 1800, &[boundary(1, 0.02, 0.08), address(10, 0.05)]);
        write_stripe(&dir, 1801, &[boundary(2, 0.12, 0.18), address(11, 0.15)]);
        std::fs::write(dir.join(stripe_file_name(1802)), "not json\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut config = GazetteerConfig::default();
        config.join.threads = Some(2);
        let joiner = Joiner::new(&dir, &config, Strategies::default()).unwrap();
        let counter = Arc::new(Counter::default());
        let report = joiner.run(Some(counter.clone())).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.joined.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("stripe1802.gjson"));
        assert_eq!(report.total_written(), 2);
        assert_eq!(counter.total.load(Ordering::SeqCst), 3);
        assert_eq!(counter.done.load(Ordering::SeqCst), 3);
        assert_eq!(*counter.failed.lock().unwrap(), vec![1802]);

        let joined = std::fs::read_to_string(dir.join("joined").join("stripe1801.gjson")).unwrap();
        let feature = Feature::from_line(joined.lines().next().unwrap()).unwrap();
        assert_eq!(feature.meta.id, 11);
        assert_eq!(feature.attributes["boundaries"][0]["osmId"], 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn allow_set_restricts_stripes() {
        let dir = temp_dir("allow");
        write_stripe(&dir, 1800, &[boundary(1, 0.02, 0.08), address(10, 0.05)]);
        write_stripe(&dir, 1801, &[boundary(2, 0.12, 0.18), address(11, 0.15)]);
        write_stripe(&dir, 1805, &[address(12, 0.55)]);

        let mut config = GazetteerConfig::default();
        config.join.necessary_boundaries = vec!["2".to_string()];
        let joiner = Joiner::new(&dir, &config, Strategies::default()).unwrap();
        let report = joiner.run(None).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.joined.len(), 1);
        assert!(report.joined[0].0.ends_with("stripe1801.gjson"));
        assert_eq!(report.total_written(), 1);
        assert!(!dir.join("joined").join("stripe1805.gjson").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn common_boundaries_and_out_dir_come_from_config() {
        let dir = temp_dir("common");
        write_stripe(&dir, 1800, &[boundary(1, 0.02, 0.08), address(10, 0.05), address(13, 0.09)]);
        let country = boundary(99, -10.0, 10.0).to_line().unwrap();
        std::fs::write(dir.join("common.gjson"), country + "\n").unwrap();
        let out = dir.join("custom");

        let mut config = GazetteerConfig::default();
        config.join.out_dir = Some(out.to_string_lossy().to_string());
        let joiner = Joiner::new(&dir, &config, Strategies::default()).unwrap();
        assert_eq!(joiner.out_dir(), out.as_path());

        let report = joiner.run(None).await.unwrap();
        assert!(report.is_success());

        let joined = std::fs::read_to_string(out.join("stripe1800.gjson")).unwrap();
        let lines: Vec<&str> = joined.lines().collect();
        assert_eq!(lines.len(), 1);
        let feature = Feature::from_line(lines[0]).unwrap();
        assert_eq!(feature.meta.id, 10);
        assert_eq!(feature.attributes["boundaries"][0]["osmId"], 1);
        assert_eq!(feature.attributes["boundaries"][1]["osmId"], 99);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stripe_files_are_sorted_and_filtered() {
        let dir = temp_dir("list");
        write_stripe(&dir, 1801, &[]);
        write_stripe(&dir, 1799, &[]);
        std::fs::write(dir.join("common.gjson"), "").unwrap();

        let files = stripe_files(&dir).unwrap();
        let indices: Vec<u32> = files.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1799, 1801]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
