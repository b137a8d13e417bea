#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point of the striped gazetteer.
//!
//! `slice` streams a PBF extract through the assembler and writes every
//! feature into longitude stripes; `join` enriches each stripe on its own.
//!
//! Uses `indicatif-log-bridge` (via [`gazetteer_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod config;
mod slice;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use gazetteer_cli_utils::{JoinProgress, SliceProgress};
use gazetteer_join::Joiner;
use gazetteer_join::strategy::Strategies;

use crate::config::JoinOverrides;

#[derive(Parser)]
#[command(name = "gazetteer", about = "Striped OSM gazetteer builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble addresses, boundaries, streets and POIs from a PBF extract
    /// and write them into longitude stripes
    Slice {
        /// OSM PBF extract to read
        #[arg(long)]
        input: PathBuf,
        /// Directory the `stripeNNNN.gjson` files are written to
        #[arg(long)]
        out: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Spatially join every stripe of a directory
    Join {
        /// Directory holding the `stripeNNNN.gjson` files
        #[arg(long)]
        stripes: PathBuf,
        /// Output directory (defaults to `<stripes>/joined`)
        #[arg(long)]
        out: Option<String>,
        /// OSM id of a boundary records must fall in. Repeatable.
        #[arg(long = "boundary")]
        boundaries: Vec<String>,
        /// Number of stripes joined concurrently
        #[arg(long)]
        threads: Option<usize>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = gazetteer_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Slice { input, out, config } => {
            let config = config::load(config.as_deref())?;

            let progress = SliceProgress::new(&multi, slice::READS);
            let stripe = config.stripe;
            let report = tokio::task::spawn_blocking(move || {
                slice::run(&input, &out, stripe, progress)
            })
            .await??;

            if report.drain.outstanding > 0 || report.drain.panicked > 0 {
                log::warn!(
                    "{} boundary splits unfinished, {} panicked",
                    report.drain.outstanding,
                    report.drain.panicked
                );
            }
            log::info!(
                "Slicing finished in {:.1}s: {} lines in {} stripes",
                start.elapsed().as_secs_f64(),
                report.written.values().sum::<usize>(),
                report.partitions.len()
            );
        }
        Commands::Join {
            stripes,
            out,
            boundaries,
            threads,
            config,
        } => {
            let mut config = config::load(config.as_deref())?;
            JoinOverrides {
                out,
                boundaries,
                threads,
            }
            .apply(&mut config);

            let joiner = Joiner::new(stripes, &config, Strategies::default())?;
            let progress = JoinProgress::new(&multi);
            let report = joiner.run(Some(progress)).await?;

            log::info!(
                "Join finished in {:.1}s, output in {}",
                start.elapsed().as_secs_f64(),
                joiner.out_dir().display()
            );

            if !report.is_success() {
                for (path, error) in &report.failed {
                    log::error!("{}: {error}", path.display());
                }
                return Err(format!("{} stripes failed to join", report.failed.len()).into());
            }
        }
    }

    Ok(())
}
