//! Missing-witness ledger.
//!
//! One ledger lives for the whole pass. Entries are appended in the order
//! failures are found and never removed; a requirement that fails twice
//! for the same conformance is recorded once. Each conformance remembers
//! where its entries start, so diagnostics can be produced from its own
//! slice even when nested checks interleave entries for other
//! conformances.

use std::ops::Range;

use quill_ir::{DeclId, TyId};
use rustc_hash::FxHashSet;

use crate::conformance::ConformanceKey;

/// Why an associated type's witness was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintFailure {
    /// `ty` does not conform to `protocol`.
    Conformance { ty: TyId, protocol: DeclId },
    /// `ty` should have been `expected`.
    SameType { ty: TyId, expected: TyId },
}

/// Extra context attached to a missing witness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MissingWitnessContext {
    Constraint(ConstraintFailure),
    /// A derivation provider claimed the requirement but produced nothing.
    DerivationFailed,
}

/// A requirement left without a witness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MissingWitness {
    pub conformance: ConformanceKey,
    pub requirement: DeclId,
    pub context: Option<MissingWitnessContext>,
}

/// Append-only, deduplicated record of missing witnesses.
#[derive(Clone, Debug, Default)]
pub struct MissingWitnessLedger {
    entries: Vec<MissingWitness>,
    /// (conformance, requirement) pairs already recorded.
    seen: FxHashSet<(ConformanceKey, DeclId)>,
}

impl MissingWitnessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a missing witness. Returns `false` if the requirement was
    /// already recorded for this conformance; the first context wins.
    pub fn insert(&mut self, missing: MissingWitness) -> bool {
        if !self.seen.insert((missing.conformance, missing.requirement)) {
            tracing::trace!(requirement = ?missing.requirement, "missing witness already recorded");
            return false;
        }
        tracing::debug!(
            requirement = ?missing.requirement,
            index = self.entries.len(),
            "recorded missing witness"
        );
        self.entries.push(missing);
        true
    }

    pub fn contains(&self, conformance: ConformanceKey, requirement: DeclId) -> bool {
        self.seen.contains(&(conformance, requirement))
    }

    pub fn entries(&self) -> &[MissingWitness] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in `range`.
    ///
    /// # Panics
    /// Panics if the range does not lie within the ledger.
    pub fn slice(&self, range: Range<usize>) -> &[MissingWitness] {
        assert!(
            range.start <= range.end && range.end <= self.entries.len(),
            "ledger range {range:?} outside 0..{}",
            self.entries.len()
        );
        &self.entries[range]
    }
}
