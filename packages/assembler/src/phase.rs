//! Builder lifecycle.

use gazetteer_feature::EntityKind;

/// Where a builder stands in the two-pass protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerPhase {
    /// First pass, relations.
    IndexRelations,
    /// First pass, ways.
    IndexWays,
    /// Second pass, nodes.
    Coordinates,
    /// Second pass, ways.
    BuildWays,
    /// Second pass, relations.
    BuildRelations,
    /// Protocol complete.
    Done,
}

impl AssemblerPhase {
    /// Whether an entity of `kind` may arrive in this phase.
    #[must_use]
    pub const fn accepts(self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::IndexRelations | Self::BuildWays | Self::BuildRelations, EntityKind::Relation)
                | (Self::IndexWays | Self::BuildWays, EntityKind::Way)
                | (Self::Coordinates, EntityKind::Node)
        )
    }
}

/// Phase tracker shared by all builders.
#[derive(Debug)]
pub struct PhaseGate {
    owner: &'static str,
    phase: AssemblerPhase,
}

impl PhaseGate {
    /// Starts in [`AssemblerPhase::IndexRelations`].
    #[must_use]
    pub const fn new(owner: &'static str) -> Self {
        Self {
            owner,
            phase: AssemblerPhase::IndexRelations,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> AssemblerPhase {
        self.phase
    }

    /// Checks that an entity of `kind` may be handled now.
    ///
    /// # Panics
    ///
    /// Panics if the current phase does not accept `kind`.
    pub fn check(&self, kind: EntityKind) {
        assert!(
            self.phase.accepts(kind),
            "{}: {kind} delivered during {:?}",
            self.owner,
            self.phase
        );
    }

    /// Moves from `from` to `to`.
    ///
    /// # Panics
    ///
    /// Panics if the current phase is not `from`.
    pub fn advance(&mut self, from: AssemblerPhase, to: AssemblerPhase) {
        assert!(
            self.phase == from,
            "{}: expected {from:?} before {to:?}, found {:?}",
            self.owner,
            self.phase
        );
        self.phase = to;
    }

    /// Ends the protocol. Valid after the second pass ways or relations.
    ///
    /// # Panics
    ///
    /// Panics if called before the second pass started.
    pub fn finish(&mut self) {
        assert!(
            matches!(
                self.phase,
                AssemblerPhase::BuildWays | AssemblerPhase::BuildRelations
            ),
            "{}: second pass done signalled during {:?}",
            self.owner,
            self.phase
        );
        self.phase = AssemblerPhase::Done;
    }
}
