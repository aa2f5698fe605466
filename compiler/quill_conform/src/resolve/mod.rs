//! Value witness resolution.
//!
//! Each value requirement goes through lookup, then derivation, then
//! protocol defaults, stopping at the first strategy that produces a
//! witness. Lookup's rejected candidates are held back until the
//! fallbacks have had their turn: if one succeeds the candidates become a
//! near-miss warning, otherwise they are the error.

use quill_ir::{DeclId, DeclKind, GenericRequirement};
use smallvec::SmallVec;

use crate::checker::{ConformanceChecker, FailedLookup};
use crate::conformance::{Witness, WitnessDecl, WitnessEntry, WitnessOrigin};
use crate::ledger::MissingWitnessContext;
use crate::lookup::{default_candidates, lookup_value_witnesses};
use crate::matcher::{match_witness, Adjustment, RequirementMatch};
use crate::requirement::{referenced_associated_types, ProtocolRequirement};

/// Outcome of resolving one value requirement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResolveWitnessResult {
    /// A witness was recorded, or an optional requirement was left
    /// unfulfilled.
    Success,
    /// Candidates were found and none fit.
    ExplicitFailed,
    /// Nothing was found.
    Missing,
}

impl ResolveWitnessResult {
    pub(crate) fn from_entry(entry: &WitnessEntry) -> Self {
        match entry {
            WitnessEntry::Witness(_) | WitnessEntry::OptionalUnfulfilled => {
                ResolveWitnessResult::Success
            }
            WitnessEntry::Invalid => ResolveWitnessResult::ExplicitFailed,
            WitnessEntry::Missing => ResolveWitnessResult::Missing,
        }
    }
}

/// Index of the best viable match: fewest adjustments, then earliest
/// candidate.
pub(crate) fn find_best_witness(matches: &[RequirementMatch]) -> Option<usize> {
    matches
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_viable())
        .min_by_key(|(index, m)| (m.adjustments.len(), *index))
        .map(|(index, _)| index)
}

impl ConformanceChecker<'_, '_> {
    pub(crate) fn resolve_value_witnesses(&mut self) {
        let requirements: Vec<ProtocolRequirement> = self
            .requirements
            .iter()
            .filter(|r| r.kind.is_value())
            .cloned()
            .collect();
        for req in &requirements {
            if self.conformance.witness(req.decl).is_none() {
                self.resolve_value_requirement(req);
            }
        }
    }

    /// Settle the associated types `req` mentions, then resolve it. A
    /// requirement over a failed associated type is invalid without a
    /// search.
    pub(crate) fn resolve_value_requirement(
        &mut self,
        req: &ProtocolRequirement,
    ) -> ResolveWitnessResult {
        for assoc in referenced_associated_types(self.graph, req) {
            self.resolve_single_type_witness(assoc);
            let resolved = self
                .conformance
                .type_witness(assoc)
                .and_then(|entry| entry.resolved())
                .is_some();
            if !resolved {
                tracing::debug!(requirement = ?req.decl, ?assoc, "associated type did not resolve");
                self.conformance.record_witness(req.decl, WitnessEntry::Invalid);
                return ResolveWitnessResult::ExplicitFailed;
            }
        }
        self.resolve_witness_trying_all_strategies(req)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(requirement = ?req.decl))]
    pub(crate) fn resolve_witness_trying_all_strategies(
        &mut self,
        req: &ProtocolRequirement,
    ) -> ResolveWitnessResult {
        if self.resolve_witness_via_lookup(req) == ResolveWitnessResult::Success {
            return ResolveWitnessResult::Success;
        }
        let failure = self.pending_failure.take();

        let derivation = self.resolve_witness_via_derivation(req);
        let fallback = match derivation {
            ResolveWitnessResult::Success => Some(WitnessOrigin::Derived),
            _ if self.resolve_witness_via_default(req) == ResolveWitnessResult::Success => {
                Some(WitnessOrigin::Default)
            }
            _ => None,
        };
        if let Some(origin) = fallback {
            if let Some(failure) = &failure {
                self.diagnose_near_miss(req, failure, origin);
            }
            return ResolveWitnessResult::Success;
        }

        if let Some(failure) = failure {
            self.diagnose_failed_witness(req, &failure);
            self.conformance.record_witness(req.decl, WitnessEntry::Invalid);
            return ResolveWitnessResult::ExplicitFailed;
        }
        tracing::debug!(requirement = ?req.decl, "no witness");
        self.conformance.record_witness(req.decl, WitnessEntry::Missing);
        let context = (derivation == ResolveWitnessResult::ExplicitFailed)
            .then_some(MissingWitnessContext::DerivationFailed);
        self.record_missing(req.decl, context);
        ResolveWitnessResult::Missing
    }

    /// Match every candidate lookup finds and record the best. Rejected
    /// candidates are kept in `pending_failure`.
    pub(crate) fn resolve_witness_via_lookup(
        &mut self,
        req: &ProtocolRequirement,
    ) -> ResolveWitnessResult {
        let lookup = lookup_value_witnesses(self.graph, self.conformance.context(), req);
        if lookup.is_empty() {
            return ResolveWitnessResult::Missing;
        }
        let cx = self.match_context();
        let matches: Vec<RequirementMatch> = lookup
            .candidates
            .iter()
            .map(|&candidate| {
                self.pass.stats.matches_attempted += 1;
                match_witness(&cx, &mut self.pass.env_cache, req, candidate)
            })
            .collect();

        match find_best_witness(&matches) {
            Some(best) => {
                let best = &matches[best];
                self.record_found_witness(
                    req,
                    best.witness,
                    best.adjustments.clone(),
                    WitnessOrigin::Lookup,
                );
                ResolveWitnessResult::Success
            }
            None => {
                self.pending_failure = Some(FailedLookup {
                    matches,
                    ignoring_names: lookup.ignoring_names,
                });
                ResolveWitnessResult::ExplicitFailed
            }
        }
    }

    /// Ask each derivation provider in turn. `ExplicitFailed` means a
    /// provider accepted the protocol but could not synthesize this
    /// requirement.
    pub(crate) fn resolve_witness_via_derivation(
        &mut self,
        req: &ProtocolRequirement,
    ) -> ResolveWitnessResult {
        let context = self.conformance.context();
        let mut claimed = false;
        for deriver in self.derivers() {
            if !deriver.can_derive(self.graph, req.protocol, context, &mut *self.pass) {
                continue;
            }
            claimed = true;
            if let Some(synthesized) =
                deriver.synthesize(self.graph, req, self.conformance.adoptee())
            {
                tracing::debug!(requirement = ?req.decl, "derived witness");
                self.pass.stats.witnesses_derived += 1;
                self.conformance.record_witness(
                    req.decl,
                    WitnessEntry::Witness(Witness {
                        decl: WitnessDecl::Synthesized(synthesized),
                        origin: WitnessOrigin::Derived,
                        adjustments: SmallVec::new(),
                        isolation_crossing: None,
                        violations: Vec::new(),
                    }),
                );
                return ResolveWitnessResult::Success;
            }
        }
        if claimed {
            ResolveWitnessResult::ExplicitFailed
        } else {
            ResolveWitnessResult::Missing
        }
    }

    /// Use a protocol-extension default whose constraints the adoptee
    /// meets; failing that, an optional requirement is left unfulfilled.
    pub(crate) fn resolve_witness_via_default(
        &mut self,
        req: &ProtocolRequirement,
    ) -> ResolveWitnessResult {
        let cx = self.match_context();
        for candidate in default_candidates(self.graph, req) {
            let Some(extension) = self.graph.decl(candidate).parent else {
                continue;
            };
            if !self.extension_applies(extension) {
                tracing::trace!(?candidate, "default's extension does not apply");
                continue;
            }
            let found = match_witness(&cx, &mut self.pass.env_cache, req, candidate);
            if found.is_viable() {
                self.record_found_witness(req, candidate, found.adjustments, WitnessOrigin::Default);
                return ResolveWitnessResult::Success;
            }
        }
        if req.is_optional {
            self.conformance
                .record_witness(req.decl, WitnessEntry::OptionalUnfulfilled);
            return ResolveWitnessResult::Success;
        }
        ResolveWitnessResult::Missing
    }

    /// Whether the adoptee meets a protocol extension's where-clause.
    /// Requirements that still mention an unresolved associated type do
    /// not hold.
    fn extension_applies(&mut self, extension: DeclId) -> bool {
        let where_clause = match &self.graph.decl(extension).kind {
            DeclKind::Extension(ext) => ext.where_clause.clone(),
            _ => return true,
        };
        let pool = self.graph.types();
        where_clause.into_iter().all(|requirement| match requirement {
            GenericRequirement::Conforms { subject, protocol } => {
                let ty = self.substitute_self(subject);
                !pool.has_unresolved(ty) && self.conforms(ty, protocol)
            }
            GenericRequirement::SameType { first, second } => {
                let first = self.substitute_self(first);
                let second = self.substitute_self(second);
                !pool.has_unresolved(first) && first == second
            }
        })
    }

    fn record_found_witness(
        &mut self,
        req: &ProtocolRequirement,
        witness: DeclId,
        adjustments: SmallVec<[Adjustment; 2]>,
        origin: WitnessOrigin,
    ) {
        tracing::debug!(requirement = ?req.decl, ?witness, ?origin, "witness");
        let policy = self.check_witness_policies(req, witness, origin);
        self.conformance.record_witness(
            req.decl,
            WitnessEntry::Witness(Witness {
                decl: WitnessDecl::Declared(witness),
                origin,
                adjustments,
                isolation_crossing: policy.isolation_crossing,
                violations: policy.violations,
            }),
        );
    }
}
