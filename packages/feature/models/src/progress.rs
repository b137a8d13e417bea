//! Progress of slicing and joining runs.
//!
//! The slicer reports each topology read and the entities flowing through
//! it; the joiner reports each stripe as it completes. Rendering is left to
//! the binary.

use crate::EntityKind;

/// How one stripe join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeOutcome {
    /// The stripe was joined and this many lines were written.
    Joined(usize),
    /// The stripe failed; the error is in the join report.
    Failed,
}

/// Receives progress events from the slice and join runs.
///
/// Every method has an empty default so a listener only implements the
/// events it renders.
pub trait ProgressCallback: Send + Sync {
    /// A read over every `kind` entity of the topology starts.
    /// `second_pass` is false while the join indices are being filled.
    fn read_started(&self, _kind: EntityKind, _second_pass: bool) {}

    /// `count` more entities went through the current read.
    fn entities_read(&self, _count: u64) {}

    /// The current topology read is complete.
    fn read_finished(&self) {}

    /// `stripes` partition files are about to be joined.
    fn join_started(&self, _stripes: u64) {}

    /// Stripe `index` finished.
    fn stripe_joined(&self, _index: u32, _outcome: StripeOutcome) {}

    /// The run is over.
    fn finished(&self, _summary: &str) {}
}
