//! Associated type resolution.
//!
//! Strategies run in order, each over every still-unresolved associated
//! type before the next starts: explicit declarations, inference from
//! value witnesses, derivation, then protocol defaults. Defaults may
//! mention other associated types, so they are applied to a fixpoint.

use std::collections::VecDeque;

use quill_ir::{
    DeclGraph, DeclId, DeclKind, FnFlags, GenericRequirement, TyId, TypeData, TypeFolder,
    TypePool,
};

use crate::conformance::{TypeWitness, TypeWitnessEntry, TypeWitnessSource};
use crate::ledger::{ConstraintFailure, MissingWitnessContext};
use crate::lookup::{lookup_value_witnesses, type_witness_candidates};
use crate::matcher::{match_witness, SignatureOpener, TypeAdjustment};
use crate::requirement::{referenced_associated_types, ProtocolRequirement};

use super::ConformanceChecker;

impl ConformanceChecker<'_, '_> {
    pub(crate) fn resolve_type_witnesses(&mut self) {
        let assocs: Vec<ProtocolRequirement> = self
            .requirements
            .iter()
            .filter(|r| r.is_associated_type())
            .cloned()
            .collect();

        for assoc in &assocs {
            if self.conformance.type_witness(assoc.decl).is_none() {
                if let Some(witness) = self.resolve_type_witness_via_lookup(assoc) {
                    self.record_resolved(assoc, witness);
                }
            }
        }
        for assoc in &assocs {
            if self.conformance.type_witness(assoc.decl).is_none() {
                if let Some(witness) = self.resolve_type_witness_via_inference(assoc) {
                    self.record_resolved(assoc, witness);
                }
            }
        }
        for assoc in &assocs {
            if self.conformance.type_witness(assoc.decl).is_none() {
                if let Some(witness) = self.resolve_type_witness_via_derivation(assoc) {
                    self.record_resolved(assoc, witness);
                }
            }
        }
        loop {
            let mut progress = false;
            for assoc in &assocs {
                if self.conformance.type_witness(assoc.decl).is_none() {
                    if let Some(witness) = self.resolve_type_witness_via_default(assoc) {
                        self.record_resolved(assoc, witness);
                        progress = true;
                    }
                }
            }
            if !progress {
                break;
            }
        }
        for assoc in &assocs {
            if self.conformance.type_witness(assoc.decl).is_none() {
                self.record_unresolved(assoc);
            }
        }
    }

    /// Resolve one associated type through every strategy, then check its
    /// bounds. Associated types its default mentions are resolved first.
    pub(crate) fn resolve_single_type_witness(&mut self, assoc: DeclId) {
        if self.conformance.type_witness(assoc).is_some() || self.type_stack.contains(&assoc) {
            return;
        }
        let Some(req) = self.requirements.iter().find(|r| r.decl == assoc).cloned() else {
            return;
        };
        self.type_stack.push(assoc);

        let mut witness = self
            .resolve_type_witness_via_lookup(&req)
            .or_else(|| self.resolve_type_witness_via_inference(&req))
            .or_else(|| self.resolve_type_witness_via_derivation(&req));
        if witness.is_none() {
            if let Some((_, default)) = find_defaulted_associated_type(self.graph, req.protocol, assoc)
            {
                for other in self.mentioned_associated_types(default) {
                    self.resolve_single_type_witness(other);
                }
            }
            witness = self.resolve_type_witness_via_default(&req);
        }

        self.type_stack.pop();
        match witness {
            Some(witness) => {
                self.record_resolved(&req, witness);
                self.check_type_witness_bounds(&req, witness.ty);
            }
            None => self.record_unresolved(&req),
        }
    }

    fn record_resolved(&mut self, assoc: &ProtocolRequirement, witness: TypeWitness) {
        tracing::debug!(assoc = ?assoc.decl, ty = ?witness.ty, source = ?witness.source, "type witness");
        self.conformance
            .record_type_witness(assoc.decl, TypeWitnessEntry::Resolved(witness));
    }

    fn record_unresolved(&mut self, assoc: &ProtocolRequirement) {
        tracing::debug!(assoc = ?assoc.decl, "no type witness");
        self.conformance
            .record_type_witness(assoc.decl, TypeWitnessEntry::Unresolved);
        self.record_missing(assoc.decl, None);
    }

    fn resolve_type_witness_via_lookup(&self, assoc: &ProtocolRequirement) -> Option<TypeWitness> {
        let candidates = type_witness_candidates(self.graph, self.conformance.context(), assoc);
        let &(decl, ty) = candidates.first()?;
        Some(TypeWitness {
            ty,
            source: TypeWitnessSource::Explicit(decl),
        })
    }

    /// Infer `assoc` from the value requirements that mention it: a
    /// requirement whose exactly-named candidates agree on one binding
    /// decides it.
    fn resolve_type_witness_via_inference(
        &mut self,
        assoc: &ProtocolRequirement,
    ) -> Option<TypeWitness> {
        let users: Vec<ProtocolRequirement> = self
            .requirements
            .iter()
            .filter(|r| {
                r.kind.is_value() && referenced_associated_types(self.graph, r).contains(&assoc.decl)
            })
            .cloned()
            .collect();

        for req in &users {
            let lookup = lookup_value_witnesses(self.graph, self.conformance.context(), req);
            if lookup.is_empty() || lookup.ignoring_names {
                continue;
            }
            let cx = self.match_context();
            let mut inferred: Option<(TyId, DeclId)> = None;
            let mut ambiguous = false;
            for &candidate in &lookup.candidates {
                self.pass.stats.matches_attempted += 1;
                let found = match_witness(&cx, &mut self.pass.env_cache, req, candidate);
                if !found.is_viable() {
                    continue;
                }
                let Some(&(_, ty)) = found.assoc_bindings.iter().find(|(a, _)| *a == assoc.decl)
                else {
                    continue;
                };
                match inferred {
                    None => inferred = Some((ty, candidate)),
                    Some((previous, _)) if previous != ty => ambiguous = true,
                    Some(_) => {}
                }
            }
            if ambiguous {
                tracing::debug!(requirement = ?req.decl, "candidates disagree on the associated type");
                continue;
            }
            if let Some((ty, witness)) = inferred {
                let mut performed = false;
                let ty = adjust_inferred_associated_type(
                    self.graph.types(),
                    TypeAdjustment::NoescapeToEscaping,
                    ty,
                    &mut performed,
                );
                tracing::trace!(performed, "escaping adjustment on inferred type");
                return Some(TypeWitness {
                    ty,
                    source: TypeWitnessSource::Inferred {
                        requirement: req.decl,
                        witness,
                    },
                });
            }
        }
        None
    }

    fn resolve_type_witness_via_derivation(
        &mut self,
        assoc: &ProtocolRequirement,
    ) -> Option<TypeWitness> {
        let context = self.conformance.context();
        for deriver in self.derivers() {
            if !deriver.can_derive(self.graph, assoc.protocol, context, &mut *self.pass) {
                continue;
            }
            if let Some(ty) = deriver.derive_type_witness(self.graph, assoc, context) {
                return Some(TypeWitness {
                    ty,
                    source: TypeWitnessSource::Derived,
                });
            }
        }
        None
    }

    /// The protocol's default for `assoc`, with `Self` and already-resolved
    /// associated types substituted. Defaults that still mention an
    /// unresolved associated type are not applied yet.
    fn resolve_type_witness_via_default(&self, assoc: &ProtocolRequirement) -> Option<TypeWitness> {
        let (source, default) = find_defaulted_associated_type(self.graph, assoc.protocol, assoc.decl)?;
        let ty = self.substitute_self(default);
        if self.graph.types().has_unresolved(ty) {
            return None;
        }
        Some(TypeWitness {
            ty,
            source: TypeWitnessSource::Defaulted(source),
        })
    }

    /// Check every resolved associated type's bounds, then the protocol's
    /// where-clause.
    pub(crate) fn ensure_requirements_are_satisfied(&mut self) {
        let resolved: Vec<(ProtocolRequirement, TyId)> = self
            .requirements
            .iter()
            .filter(|r| r.is_associated_type())
            .filter_map(|r| {
                let ty = self.conformance.type_witness(r.decl)?.resolved()?;
                Some((r.clone(), ty))
            })
            .collect();
        for (assoc, ty) in &resolved {
            self.check_type_witness_bounds(assoc, *ty);
        }

        let where_clause = match &self.graph.decl(self.conformance.protocol()).kind {
            DeclKind::Protocol(proto) => proto.where_clause.clone(),
            _ => Vec::new(),
        };
        for requirement in where_clause {
            self.check_where_requirement(requirement);
        }
    }

    fn check_type_witness_bounds(&mut self, assoc: &ProtocolRequirement, ty: TyId) {
        let bounds = match &self.graph.decl(assoc.decl).kind {
            DeclKind::AssocType(decl) => decl.bounds.clone(),
            _ => return,
        };
        for protocol in bounds {
            if !self.conforms(ty, protocol) {
                self.fail_type_witness(assoc.decl, ConstraintFailure::Conformance { ty, protocol });
                return;
            }
        }
    }

    /// Check one where-clause requirement, blaming the first associated
    /// type it mentions. Requirements on `Self` itself are inheritance and
    /// are checked as their own conformances.
    fn check_where_requirement(&mut self, requirement: GenericRequirement) {
        let (first, second) = match requirement {
            GenericRequirement::Conforms { subject, .. } => (subject, None),
            GenericRequirement::SameType { first, second } => (first, Some(second)),
        };
        let Some(blame) = self
            .mentioned_associated_types(first)
            .into_iter()
            .chain(second.map(|s| self.mentioned_associated_types(s)).unwrap_or_default())
            .next()
        else {
            return;
        };
        if !matches!(
            self.conformance.type_witness(blame),
            Some(TypeWitnessEntry::Resolved(_))
        ) {
            return;
        }

        let pool = self.graph.types();
        let failure = match requirement {
            GenericRequirement::Conforms { subject, protocol } => {
                let ty = self.substitute_self(subject);
                if pool.has_unresolved(ty) || self.conforms(ty, protocol) {
                    return;
                }
                ConstraintFailure::Conformance { ty, protocol }
            }
            GenericRequirement::SameType { first, second } => {
                let ty = self.substitute_self(first);
                let expected = self.substitute_self(second);
                if pool.has_unresolved(ty)
                    || pool.has_unresolved(expected)
                    || ty == expected
                    || ty == TyId::ERROR
                    || expected == TyId::ERROR
                {
                    return;
                }
                ConstraintFailure::SameType { ty, expected }
            }
        };
        self.fail_type_witness(blame, failure);
    }

    fn fail_type_witness(&mut self, assoc: DeclId, failure: ConstraintFailure) {
        tracing::debug!(?assoc, ?failure, "type witness violates a constraint");
        if let Some(TypeWitnessEntry::Resolved(witness)) = self.conformance.type_witness(assoc).copied()
        {
            self.conformance
                .record_type_witness(assoc, TypeWitnessEntry::Failed(witness));
        }
        self.record_missing(assoc, Some(MissingWitnessContext::Constraint(failure)));
    }

    /// `Self.A` references to this protocol's associated types in `ty`.
    fn mentioned_associated_types(&self, ty: TyId) -> Vec<DeclId> {
        let protocol = self.conformance.protocol();
        let mut found = Vec::new();
        self.graph
            .types()
            .any(ty, &mut |_: TyId, data: &TypeData| {
                if let TypeData::DependentMember { base, assoc } = *data {
                    if base == TyId::SELF
                        && self.graph.decl(assoc).parent == Some(protocol)
                        && !found.contains(&assoc)
                    {
                        found.push(assoc);
                    }
                }
                false
            });
        found
    }

    /// Replace `Self` with the adoptee and `Self.A` with A's resolved
    /// witness, leaving the rest open.
    pub(crate) fn substitute_self(&self, ty: TyId) -> TyId {
        let type_witnesses = self.conformance.resolved_type_witnesses().collect();
        SignatureOpener {
            pool: self.graph.types(),
            self_ty: self.conformance.adoptee(),
            env: None,
            type_witnesses: &type_witnesses,
        }
        .fold(ty)
    }
}

/// Apply `adjustment` to a function type inferred for an associated type.
///
/// Sets `performed` to whether the adjustment changed anything; leaves it
/// untouched when `ty` is not a function.
pub fn adjust_inferred_associated_type(
    pool: &TypePool,
    adjustment: TypeAdjustment,
    ty: TyId,
    performed: &mut bool,
) -> TyId {
    let Some(func) = pool.as_function(ty) else {
        return ty;
    };
    let flag = match adjustment {
        TypeAdjustment::NoescapeToEscaping => FnFlags::ESCAPING,
        TypeAdjustment::NonsendableToSendable => FnFlags::SENDABLE,
    };
    if func.flags.contains(flag) {
        *performed = false;
        return ty;
    }
    *performed = true;
    pool.function(func.params.to_vec(), func.result, func.flags | flag)
}

/// Find the default for associated type `assoc` of `protocol`.
///
/// Looks at the declaration's own default, then same-named type aliases in
/// unconstrained extensions of the protocol, then same-named associated
/// types of inherited protocols, nearest first. Returns the declaration
/// that supplied the default along with the default type.
pub fn find_defaulted_associated_type(
    graph: &dyn DeclGraph,
    protocol: DeclId,
    assoc: DeclId,
) -> Option<(DeclId, TyId)> {
    let decl = graph.decl(assoc);
    let DeclKind::AssocType(assoc_decl) = &decl.kind else {
        return None;
    };
    if let Some(default) = assoc_decl.default {
        return Some((assoc, default));
    }
    let name = decl.name.base;

    let mut queue = VecDeque::from([protocol]);
    let mut visited = Vec::new();
    while let Some(current) = queue.pop_front() {
        if visited.contains(&current) {
            continue;
        }
        visited.push(current);
        let DeclKind::Protocol(proto) = &graph.decl(current).kind else {
            continue;
        };

        if current != protocol {
            for &member in &proto.members {
                let member_decl = graph.decl(member);
                if let DeclKind::AssocType(inherited) = &member_decl.kind {
                    if member_decl.name.base == name {
                        if let Some(default) = inherited.default {
                            return Some((member, default));
                        }
                    }
                }
            }
        }
        for &ext in graph.extensions_of(current) {
            let DeclKind::Extension(extension) = &graph.decl(ext).kind else {
                continue;
            };
            if !extension.where_clause.is_empty() {
                continue;
            }
            for &member in &extension.members {
                let member_decl = graph.decl(member);
                if let DeclKind::TypeAlias(alias) = &member_decl.kind {
                    if member_decl.name.base == name {
                        return Some((member, alias.underlying));
                    }
                }
            }
        }
        queue.extend(proto.inherited.iter().copied());
    }
    None
}
