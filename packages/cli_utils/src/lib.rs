#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal rendering for the gazetteer CLI.
//!
//! [`SliceProgress`] and [`JoinProgress`] draw the events of
//! [`ProgressCallback`] with `indicatif`, and [`init_logger`] routes `log`
//! output through the same [`MultiProgress`] so log lines do not tear the
//! bars.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gazetteer_feature_models::EntityKind;
use gazetteer_feature_models::progress::{ProgressCallback, StripeOutcome};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(100);

/// Topology reads of a slicing run: one bar over the reads and a spinner
/// counting the entities of the current read.
pub struct SliceProgress {
    reads: ProgressBar,
    entities: ProgressBar,
}

impl SliceProgress {
    /// Adds both indicators to `multi`. `reads` is the number of topology
    /// reads the run makes.
    #[must_use]
    pub fn new(multi: &MultiProgress, reads: u64) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new(reads));
        bar.set_style(
            ProgressStyle::with_template("{msg:24} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message("Opening extract");

        let entities = multi.add(ProgressBar::new_spinner());
        entities.enable_steady_tick(TICK);
        entities.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {human_pos} {msg} [{per_sec}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        Arc::new(Self { reads: bar, entities })
    }
}

impl ProgressCallback for SliceProgress {
    fn read_started(&self, kind: EntityKind, second_pass: bool) {
        let pass = if second_pass { "Building" } else { "Indexing" };
        self.reads.set_message(format!("{pass} {kind}s"));
        self.entities.set_position(0);
        self.entities.set_message(format!("{kind}s"));
    }

    fn entities_read(&self, count: u64) {
        self.entities.inc(count);
    }

    fn read_finished(&self) {
        self.reads.inc(1);
    }

    fn finished(&self, summary: &str) {
        self.entities.finish_and_clear();
        self.reads.finish_with_message(summary.to_string());
    }
}

/// Stripes of a join run. Shows a spinner while the stripes are listed,
/// then a bar over them with a running failure count.
pub struct JoinProgress {
    stripes: ProgressBar,
    lines: AtomicU64,
    failed: AtomicU64,
}

impl JoinProgress {
    /// Adds the indicator to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(TICK);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Listing stripes");

        Arc::new(Self {
            stripes: bar,
            lines: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    fn describe(&self) -> String {
        let lines = self.lines.load(Ordering::Relaxed);
        match self.failed.load(Ordering::Relaxed) {
            0 => format!("{lines} lines"),
            failed => format!("{lines} lines, {failed} failed"),
        }
    }
}

impl ProgressCallback for JoinProgress {
    fn join_started(&self, stripes: u64) {
        self.stripes.set_length(stripes);
        self.stripes.set_position(0);
        self.stripes.set_style(
            ProgressStyle::with_template("  stripes {wide_bar:.yellow/dim} {pos}/{len} {msg} [{eta}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        self.stripes.set_message(self.describe());
    }

    fn stripe_joined(&self, index: u32, outcome: StripeOutcome) {
        match outcome {
            StripeOutcome::Joined(lines) => {
                self.lines
                    .fetch_add(u64::try_from(lines).unwrap_or(u64::MAX), Ordering::Relaxed);
            }
            StripeOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!("Stripe {index} failed");
            }
        }
        self.stripes.set_message(self.describe());
        self.stripes.inc(1);
    }

    fn finished(&self, summary: &str) {
        self.stripes.finish_with_message(summary.to_string());
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
/// The filter is read from `RUST_LOG`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
