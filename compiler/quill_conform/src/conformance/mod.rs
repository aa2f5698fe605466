//! Conformance records.
//!
//! A [`Conformance`] is the checker's record for one (protocol, adopting
//! type) pair: what witnesses each requirement, where it stands in its
//! lifecycle, and which slice of the pass ledger belongs to it.

use std::collections::BTreeMap;
use std::fmt;

use quill_ir::{AccessLevel, DeclGraph, DeclId, Isolation, TyId, Version};
use smallvec::SmallVec;

use crate::matcher::Adjustment;

/// Identity of a conformance: `adoptee: protocol`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConformanceKey {
    pub protocol: DeclId,
    pub adoptee: TyId,
}

/// Lifecycle of a conformance.
///
/// ```text
/// Uninitialized → ResolvingTypeWitnesses → ResolvingValueWitnesses → Checked
///                          ↓                          ↓
///                       Invalid                    Invalid
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConformanceState {
    Uninitialized,
    ResolvingTypeWitnesses,
    ResolvingValueWitnesses,
    Checked,
    Invalid,
}

impl ConformanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConformanceState::Checked | ConformanceState::Invalid)
    }

    pub fn can_transition_to(self, next: ConformanceState) -> bool {
        use ConformanceState::{
            Checked, Invalid, ResolvingTypeWitnesses, ResolvingValueWitnesses, Uninitialized,
        };
        matches!(
            (self, next),
            (Uninitialized, ResolvingTypeWitnesses)
                | (ResolvingTypeWitnesses, ResolvingValueWitnesses | Invalid)
                | (ResolvingValueWitnesses, Checked | Invalid)
        )
    }
}

/// A witness the compiler synthesizes instead of finding in source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SynthesizedWitness {
    pub protocol: DeclId,
    pub requirement: DeclId,
    pub adoptee: TyId,
    /// Requirement signature with `Self` replaced by the adoptee.
    pub signature: Option<TyId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WitnessDecl {
    Declared(DeclId),
    Synthesized(SynthesizedWitness),
}

impl WitnessDecl {
    pub fn declared(&self) -> Option<DeclId> {
        match self {
            WitnessDecl::Declared(id) => Some(*id),
            WitnessDecl::Synthesized(_) => None,
        }
    }
}

/// Which resolution strategy produced a witness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WitnessOrigin {
    /// Found by name in the adopting type or its extensions.
    Lookup,
    /// Synthesized by a derivation provider.
    Derived,
    /// Inherited from a protocol extension.
    Default,
}

/// Callers reach the witness across a concurrency boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IsolationCrossing {
    /// Isolation the requirement promises callers.
    pub from: Isolation,
    /// Isolation the witness runs in; calls must hop here.
    pub to: Isolation,
}

/// A rule a found witness breaks. Reported, but the witness still stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PolicyViolation {
    Access {
        required: AccessLevel,
        found: AccessLevel,
    },
    SetterAccess {
        required: AccessLevel,
        found: AccessLevel,
    },
    PostDates {
        introduced: Version,
        required: Version,
    },
    Unavailable,
    Isolation {
        requirement: Isolation,
        witness: Isolation,
    },
    NonFinalSelfResult,
    NonFinalSelfInvariant,
    RequiredInitializer,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Witness {
    pub decl: WitnessDecl,
    pub origin: WitnessOrigin,
    /// Relaxations the matcher applied, in parameter order.
    pub adjustments: SmallVec<[Adjustment; 2]>,
    pub isolation_crossing: Option<IsolationCrossing>,
    pub violations: Vec<PolicyViolation>,
}

/// Final state of one value requirement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WitnessEntry {
    Witness(Witness),
    /// Optional requirement nobody implements.
    OptionalUnfulfilled,
    /// Candidates existed but none fit, or the requirement depends on a
    /// failed associated type.
    Invalid,
    Missing,
}

impl WitnessEntry {
    pub fn witness(&self) -> Option<&Witness> {
        match self {
            WitnessEntry::Witness(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            WitnessEntry::Witness(_) | WitnessEntry::OptionalUnfulfilled
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeWitnessSource {
    /// A type alias, nested type or generic parameter of the adoptee.
    Explicit(DeclId),
    /// Bound while matching `witness` against value `requirement`.
    Inferred { requirement: DeclId, witness: DeclId },
    /// The associated type's default, or a protocol-extension type alias.
    Defaulted(DeclId),
    Derived,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeWitness {
    pub ty: TyId,
    pub source: TypeWitnessSource,
}

/// Final state of one associated-type requirement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeWitnessEntry {
    Resolved(TypeWitness),
    Unresolved,
    /// Resolved, but the type violates the protocol's constraints.
    Failed(TypeWitness),
}

impl TypeWitnessEntry {
    pub fn resolved(&self) -> Option<TyId> {
        match self {
            TypeWitnessEntry::Resolved(tw) => Some(tw.ty),
            _ => None,
        }
    }
}

/// Half-open index range into the pass ledger. `end` is unset while the
/// conformance is still being checked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LedgerRange {
    pub(crate) start: usize,
    pub(crate) end: Option<usize>,
}

/// The record for one (protocol, adopting type) pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Conformance {
    key: ConformanceKey,
    /// Nominal declaration whose members are searched for witnesses.
    context: DeclId,
    state: ConformanceState,
    /// Keyed by requirement; `DeclId` order is declaration order.
    value_witnesses: BTreeMap<DeclId, WitnessEntry>,
    type_witnesses: BTreeMap<DeclId, TypeWitnessEntry>,
    ledger_range: Option<LedgerRange>,
    /// Requirements in the order they were settled.
    resolution_order: Vec<DeclId>,
}

impl Conformance {
    pub fn new(protocol: DeclId, adoptee: TyId, context: DeclId) -> Self {
        Conformance {
            key: ConformanceKey { protocol, adoptee },
            context,
            state: ConformanceState::Uninitialized,
            value_witnesses: BTreeMap::new(),
            type_witnesses: BTreeMap::new(),
            ledger_range: None,
            resolution_order: Vec::new(),
        }
    }

    /// Conformance of the nominal `nominal`, applied to its own generic
    /// parameters, to `protocol`.
    pub fn for_nominal(graph: &dyn DeclGraph, protocol: DeclId, nominal: DeclId) -> Self {
        let args = match graph.decl(nominal).kind.generics() {
            Some(sig) => graph
                .generic_signature(sig)
                .params
                .iter()
                .map(|p| graph.types().generic_param(p.key))
                .collect(),
            None => Vec::new(),
        };
        let adoptee = graph.types().nominal(nominal, args);
        Self::new(protocol, adoptee, nominal)
    }

    pub fn key(&self) -> ConformanceKey {
        self.key
    }

    pub fn protocol(&self) -> DeclId {
        self.key.protocol
    }

    pub fn adoptee(&self) -> TyId {
        self.key.adoptee
    }

    pub fn context(&self) -> DeclId {
        self.context
    }

    pub fn state(&self) -> ConformanceState {
        self.state
    }

    pub fn witness(&self, requirement: DeclId) -> Option<&WitnessEntry> {
        self.value_witnesses.get(&requirement)
    }

    pub fn type_witness(&self, assoc: DeclId) -> Option<&TypeWitnessEntry> {
        self.type_witnesses.get(&assoc)
    }

    pub fn value_witnesses(&self) -> impl Iterator<Item = (DeclId, &WitnessEntry)> {
        self.value_witnesses.iter().map(|(&k, v)| (k, v))
    }

    pub fn type_witnesses(&self) -> impl Iterator<Item = (DeclId, &TypeWitnessEntry)> {
        self.type_witnesses.iter().map(|(&k, v)| (k, v))
    }

    /// Resolved associated types, for substitution.
    pub fn resolved_type_witnesses(&self) -> impl Iterator<Item = (DeclId, TyId)> + '_ {
        self.type_witnesses
            .iter()
            .filter_map(|(&k, v)| v.resolved().map(|ty| (k, ty)))
    }

    pub fn resolution_order(&self) -> &[DeclId] {
        &self.resolution_order
    }

    /// Checked, with every requirement witnessed or optional.
    pub fn is_satisfied(&self) -> bool {
        self.state == ConformanceState::Checked
            && self.value_witnesses.values().all(WitnessEntry::is_satisfied)
            && self
                .type_witnesses
                .values()
                .all(|tw| matches!(tw, TypeWitnessEntry::Resolved(_)))
    }

    pub fn has_violations(&self) -> bool {
        self.value_witnesses
            .values()
            .filter_map(WitnessEntry::witness)
            .any(|w| !w.violations.is_empty())
    }

    pub(crate) fn set_state(&mut self, next: ConformanceState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal conformance transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Entries may still be recorded on an `Invalid` conformance while its
    /// check finishes; a `Checked` conformance is immutable.
    ///
    /// # Panics
    /// Panics if the conformance is checked or the requirement already has
    /// an entry.
    pub(crate) fn record_witness(&mut self, requirement: DeclId, entry: WitnessEntry) {
        assert!(
            self.state != ConformanceState::Checked,
            "recording a witness on a checked conformance"
        );
        let previous = self.value_witnesses.insert(requirement, entry);
        assert!(previous.is_none(), "{requirement:?} resolved twice");
        self.resolution_order.push(requirement);
    }

    /// # Panics
    /// Panics if the conformance is checked, or if an associated type is
    /// recorded twice other than to mark it failed.
    pub(crate) fn record_type_witness(&mut self, assoc: DeclId, entry: TypeWitnessEntry) {
        assert!(
            self.state != ConformanceState::Checked,
            "recording a type witness on a checked conformance"
        );
        match self.type_witnesses.insert(assoc, entry) {
            None => self.resolution_order.push(assoc),
            Some(TypeWitnessEntry::Resolved(_)) if matches!(entry, TypeWitnessEntry::Failed(_)) => {}
            Some(previous) => panic!("{assoc:?} resolved twice: {previous:?} then {entry:?}"),
        }
    }

    /// Take over the outcome of an earlier check of the same key, keeping
    /// this record's context.
    ///
    /// # Panics
    /// Panics if the keys differ or `done` is not terminal.
    pub(crate) fn replay(&mut self, done: &Conformance) {
        assert_eq!(self.key, done.key, "replaying another conformance");
        assert!(done.state.is_terminal(), "replaying an unfinished check");
        self.state = done.state;
        self.value_witnesses.clone_from(&done.value_witnesses);
        self.type_witnesses.clone_from(&done.type_witnesses);
        self.ledger_range = done.ledger_range;
        self.resolution_order.clone_from(&done.resolution_order);
    }

    pub(crate) fn ledger_range(&self) -> Option<LedgerRange> {
        self.ledger_range
    }

    pub(crate) fn begin_ledger_range(&mut self, start: usize) {
        if self.ledger_range.is_none() {
            self.ledger_range = Some(LedgerRange { start, end: None });
        }
    }

    pub(crate) fn close_ledger_range(&mut self, end: usize) {
        if let Some(range) = &mut self.ledger_range {
            range.end = Some(end);
        }
    }
}

impl fmt::Debug for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conformance")
            .field("protocol", &self.key.protocol)
            .field("adoptee", &self.key.adoptee)
            .field("state", &self.state)
            .field("value_witnesses", &self.value_witnesses.len())
            .field("type_witnesses", &self.type_witnesses.len())
            .finish_non_exhaustive()
    }
}
