//! `gazetteer slice`: assemble a PBF extract and write it as stripes.

use std::path::Path;
use std::sync::Arc;

use gazetteer_assembler::addresses::AddrPointsBuilder;
use gazetteer_assembler::boundaries::BoundaryBuilder;
use gazetteer_assembler::highways::HighwayBuilder;
use gazetteer_assembler::pois::PoiBuilder;
use gazetteer_assembler::{Entity, Pass, TopologyReader, drive};
use gazetteer_feature_models::{EntityKind, StripeConfig};
use gazetteer_feature_models::progress::ProgressCallback;
use gazetteer_osm::{OsmError, PbfTopology};
use gazetteer_striper::{SliceReport, Slicer, StripeError};

/// Number of reads [`drive`] makes over the topology.
pub const READS: u64 = 5;

const REPORT_EVERY: u64 = 10_000;

/// Errors from a slicing run.
#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    /// The PBF extract could not be read.
    #[error(transparent)]
    Osm(#[from] OsmError),

    /// A stripe could not be written.
    #[error(transparent)]
    Stripe(#[from] StripeError),
}

/// Topology reader that reports each read and the entities passing
/// through it.
pub struct ReportingReader<R> {
    inner: R,
    progress: Arc<dyn ProgressCallback>,
}

impl<R> ReportingReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R, progress: Arc<dyn ProgressCallback>) -> Self {
        Self { inner, progress }
    }
}

impl<R: TopologyReader> TopologyReader for ReportingReader<R> {
    type Error = R::Error;

    fn read(
        &mut self,
        pass: Pass,
        kind: EntityKind,
        visit: &mut dyn FnMut(&Entity),
    ) -> Result<(), Self::Error> {
        self.progress.read_started(kind, pass == Pass::Second);

        let mut pending = 0;
        self.inner.read(pass, kind, &mut |entity| {
            visit(entity);
            pending += 1;
            if pending == REPORT_EVERY {
                self.progress.entities_read(pending);
                pending = 0;
            }
        })?;
        self.progress.entities_read(pending);

        self.progress.read_finished();
        Ok(())
    }
}

/// Runs every builder over `reader` into a fresh [`Slicer`] at `out`.
///
/// # Errors
///
/// * If the reader fails
/// * If the stripes cannot be written
pub fn slice<R>(
    reader: &mut R,
    out: &Path,
    config: StripeConfig,
) -> Result<SliceReport, SliceError>
where
    R: TopologyReader,
    SliceError: From<R::Error>,
{
    let slicer = Arc::new(Slicer::new(out, config)?);

    let mut addresses = AddrPointsBuilder::new(slicer.clone());
    let mut boundaries = BoundaryBuilder::new(slicer.clone());
    let mut highways = HighwayBuilder::new(slicer.clone());
    let mut pois = PoiBuilder::new(slicer.clone());

    drive(
        reader,
        &mut [&mut addresses, &mut boundaries, &mut highways, &mut pois],
    )?;

    Ok(slicer.finish()?)
}

/// Slices the PBF extract at `input` into `out`.
///
/// # Errors
///
/// * If the extract is missing or unreadable
/// * If the stripes cannot be written
pub fn run(
    input: &Path,
    out: &Path,
    config: StripeConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<SliceReport, SliceError> {
    let topology = PbfTopology::open(input)?;
    let mut reader = ReportingReader::new(topology, progress.clone());
    let report = slice(&mut reader, out, config)?;

    progress.finished(&format!(
        "Sliced into {} stripes",
        report.partitions.len()
    ));
    Ok(report)
}
