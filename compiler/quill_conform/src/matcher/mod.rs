//! Witness matcher.
//!
//! Compares one candidate declaration against one requirement. Matching
//! runs in three phases:
//!
//! 1. **setup**: kind and arity, then instantiate both signatures for the
//!    conformance (see [`SignatureOpener`]).
//! 2. **match_types**: unify parameters and result, recording the
//!    relaxations that let a near-fit through as [`Adjustment`]s.
//! 3. **finalize**: effects, settability, failability, the witness's
//!    generic constraints, and argument labels last, so a candidate that is
//!    right in every way but its labels reports exactly that.
//!
//! The matcher never touches conformance state. Its only side effect is
//! populating the environment cache, which is observationally pure.

mod open;
mod unify;

pub(crate) use open::SignatureOpener;

use std::rc::Rc;

use quill_ir::{
    DeclGraph, DeclId, DeclKind, FnFlags, GenericRequirement, GenericSigId, Name, TyId, TypeData,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::env::{RequirementEnvironment, RequirementEnvironmentCache};
use crate::lookup::{declares_conformance, protocol_inherits};
use crate::requirement::{ProtocolRequirement, RequirementKind};
use unify::Unifier;

/// Optionality relaxations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OptionalAdjustment {
    /// Witness returns `T?` where `T` is required.
    ProducesOptional,
    /// Witness returns `T` where `T?` is required.
    ProducesNonOptional,
    /// Witness accepts `T?` where `T` is passed.
    ConsumesOptional,
    /// Witness accepts `T` where `T?` is passed; optional requirements only.
    ConsumesNonOptional,
}

/// Function-type attribute relaxations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeAdjustment {
    /// Witness takes an escaping closure where the requirement's does not escape.
    NoescapeToEscaping,
    /// Witness requires a sendable closure where the requirement does not.
    NonsendableToSendable,
}

/// Effect relaxations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EffectAdjustment {
    /// Synchronous witness for an async requirement.
    SyncToAsync,
    /// Non-throwing witness for a throwing requirement.
    NonThrowingToThrowing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AdjustmentPosition {
    Param(usize),
    Result,
}

/// One relaxation applied while matching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Adjustment {
    Optional {
        position: AdjustmentPosition,
        kind: OptionalAdjustment,
    },
    Type {
        position: AdjustmentPosition,
        kind: TypeAdjustment,
    },
    Effect(EffectAdjustment),
}

/// Why a candidate does not fit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MismatchReason {
    /// Wrong kind of declaration, e.g. a property for a method.
    Kind,
    /// Static for instance or the other way round.
    StaticMismatch,
    Arity {
        expected: usize,
        found: usize,
    },
    Labels {
        expected: Option<Box<[Name]>>,
        found: Option<Box<[Name]>>,
    },
    /// Async witness for a synchronous requirement.
    Async,
    /// Throwing witness for a non-throwing requirement.
    Throws,
    ParamType {
        index: usize,
        expected: TyId,
        found: TyId,
    },
    ResultType {
        expected: TyId,
        found: TyId,
    },
    PropertyType {
        expected: TyId,
        found: TyId,
    },
    /// Witness takes `T` where a non-optional requirement passes `T?`.
    ParamOptionality {
        index: usize,
    },
    /// Read-only witness for a settable requirement.
    NotSettable,
    /// Failable initializer for a non-failable requirement.
    Failability,
    /// The witness's own where-clause does not hold under the bindings.
    GenericConstraint {
        requirement: GenericRequirement,
    },
}

/// Outcome of matching one candidate against one requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequirementMatch {
    pub witness: DeclId,
    /// `None` when the candidate is viable.
    pub mismatch: Option<MismatchReason>,
    pub adjustments: SmallVec<[Adjustment; 2]>,
    /// Instantiated requirement signature under the final bindings.
    pub requirement_type: TyId,
    /// Instantiated witness signature under the final bindings.
    pub witness_type: TyId,
    /// Associated types bound to concrete types while matching.
    pub assoc_bindings: Vec<(DeclId, TyId)>,
}

impl RequirementMatch {
    pub fn is_viable(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Everything but the argument labels fits.
    pub fn is_label_only_mismatch(&self) -> bool {
        matches!(self.mismatch, Some(MismatchReason::Labels { .. }))
    }
}

/// What the matcher knows about the conformance being checked.
pub struct MatchContext<'a> {
    pub graph: &'a dyn DeclGraph,
    pub adoptee: TyId,
    /// Set when the adoptee is a non-final class; `Self` is then covariant.
    pub covariant_class: Option<DeclId>,
    /// Associated types already resolved.
    pub type_witnesses: FxHashMap<DeclId, TyId>,
    /// Signature whose constraints hold on the adoptee's generic parameters.
    pub adoptee_generics: Option<GenericSigId>,
}

impl<'a> MatchContext<'a> {
    pub fn new(graph: &'a dyn DeclGraph, adoptee: TyId) -> Self {
        MatchContext {
            graph,
            adoptee,
            covariant_class: None,
            type_witnesses: FxHashMap::default(),
            adoptee_generics: None,
        }
    }

    #[must_use]
    pub fn with_covariant_self(mut self, class: Option<DeclId>) -> Self {
        self.covariant_class = class;
        self
    }

    #[must_use]
    pub fn with_type_witness(mut self, assoc: DeclId, ty: TyId) -> Self {
        self.type_witnesses.insert(assoc, ty);
        self
    }

    #[must_use]
    pub fn with_adoptee_generics(mut self, signature: Option<GenericSigId>) -> Self {
        self.adoptee_generics = signature;
        self
    }

    /// What `Self` instantiates to.
    pub fn self_type(&self) -> TyId {
        match self.covariant_class {
            Some(class) => self.graph.types().dynamic_self(class),
            None => self.adoptee,
        }
    }
}

/// Match `witness` against `requirement` for the conformance described by
/// `cx`.
pub fn match_witness(
    cx: &MatchContext<'_>,
    cache: &mut RequirementEnvironmentCache,
    requirement: &ProtocolRequirement,
    witness: DeclId,
) -> RequirementMatch {
    let mut matcher = WitnessMatcher::new(cx, requirement, witness);
    let outcome = matcher
        .setup(cache)
        .and_then(|()| matcher.match_types())
        .and_then(|()| matcher.finalize());
    let result = matcher.finish(outcome.err());
    tracing::trace!(
        requirement = ?requirement.decl,
        witness = ?witness,
        viable = result.is_viable(),
        adjustments = result.adjustments.len(),
        "matched witness"
    );
    result
}

/// The declared type a witness is compared through.
pub(crate) fn declared_signature(kind: &DeclKind) -> Option<TyId> {
    match kind {
        DeclKind::Func(f) => Some(f.signature),
        DeclKind::Var(v) => Some(v.ty),
        DeclKind::Subscript(s) => Some(s.signature),
        DeclKind::Init(i) => Some(i.signature),
        _ => None,
    }
}

struct WitnessMatcher<'c, 'a> {
    cx: &'c MatchContext<'a>,
    requirement: &'c ProtocolRequirement,
    witness: DeclId,
    unifier: Unifier<'a>,
    adjustments: SmallVec<[Adjustment; 2]>,
    requirement_env: Option<Rc<RequirementEnvironment>>,
    witness_env: Option<Rc<RequirementEnvironment>>,
    requirement_type: TyId,
    witness_type: TyId,
}

impl<'c, 'a> WitnessMatcher<'c, 'a> {
    fn new(cx: &'c MatchContext<'a>, requirement: &'c ProtocolRequirement, witness: DeclId) -> Self {
        WitnessMatcher {
            cx,
            requirement,
            witness,
            unifier: Unifier::new(cx.graph.types()),
            adjustments: SmallVec::new(),
            requirement_env: None,
            witness_env: None,
            requirement_type: TyId::ERROR,
            witness_type: TyId::ERROR,
        }
    }

    // Phase 1

    fn setup(&mut self, cache: &mut RequirementEnvironmentCache) -> Result<(), MismatchReason> {
        let graph = self.cx.graph;
        let decl = graph.decl(self.witness);
        if !self.requirement.kind.accepts(&decl.kind) {
            return Err(MismatchReason::Kind);
        }
        if decl.is_static() != self.requirement.is_static {
            return Err(MismatchReason::StaticMismatch);
        }
        let (Some(req_sig), Some(wit_sig)) =
            (self.requirement.signature, declared_signature(&decl.kind))
        else {
            return Err(MismatchReason::Kind);
        };

        let class = self.cx.covariant_class;
        let req_env = cache.get(graph, self.requirement.generics, class);
        let wit_env = cache.get(graph, decl.kind.generics(), class);
        self.requirement_type = self.open(req_sig, &req_env);
        self.witness_type = self.open(wit_sig, &wit_env);
        self.requirement_env = Some(req_env);
        self.witness_env = Some(wit_env);

        let pool = graph.types();
        if let (Some(rf), Some(wf)) = (
            pool.as_function(self.requirement_type),
            pool.as_function(self.witness_type),
        ) {
            if rf.params.len() != wf.params.len() {
                return Err(MismatchReason::Arity {
                    expected: rf.params.len(),
                    found: wf.params.len(),
                });
            }
        }
        Ok(())
    }

    fn open(&self, ty: TyId, env: &RequirementEnvironment) -> TyId {
        use quill_ir::TypeFolder;
        SignatureOpener {
            pool: self.cx.graph.types(),
            self_ty: self.cx.self_type(),
            env: Some(env),
            type_witnesses: &self.cx.type_witnesses,
        }
        .fold(ty)
    }

    // Phase 2

    fn match_types(&mut self) -> Result<(), MismatchReason> {
        let pool = self.cx.graph.types();
        match self.requirement.kind {
            RequirementKind::Property => {
                if self
                    .unifier
                    .try_unify(self.requirement_type, self.witness_type)
                {
                    Ok(())
                } else {
                    Err(MismatchReason::PropertyType {
                        expected: self.unifier.apply(self.requirement_type),
                        found: self.unifier.apply(self.witness_type),
                    })
                }
            }
            RequirementKind::Method | RequirementKind::Subscript | RequirementKind::Initializer => {
                let (Some(rf), Some(wf)) = (
                    pool.as_function(self.requirement_type),
                    pool.as_function(self.witness_type),
                ) else {
                    return Err(MismatchReason::Kind);
                };
                for (index, (&r, &w)) in rf.params.iter().zip(wf.params.iter()).enumerate() {
                    self.match_param(index, r, w)?;
                }
                if self.requirement.kind != RequirementKind::Initializer {
                    self.match_result(rf.result, wf.result)?;
                }
                Ok(())
            }
            RequirementKind::AssociatedType => Err(MismatchReason::Kind),
        }
    }

    fn match_param(&mut self, index: usize, req: TyId, wit: TyId) -> Result<(), MismatchReason> {
        let pool = self.cx.graph.types();
        let position = AdjustmentPosition::Param(index);
        if self.unifier.try_unify(req, wit) {
            self.note_function_adjustments(position, req, wit);
            return Ok(());
        }
        if let (None, Some(wit_inner)) = (pool.optional_payload(req), pool.optional_payload(wit)) {
            if self.unifier.try_unify(req, wit_inner) {
                self.push_optional(position, OptionalAdjustment::ConsumesOptional);
                return Ok(());
            }
        }
        if let (Some(req_inner), None) = (pool.optional_payload(req), pool.optional_payload(wit)) {
            if self.unifier.try_unify(req_inner, wit) {
                if !self.requirement.is_optional {
                    return Err(MismatchReason::ParamOptionality { index });
                }
                self.push_optional(position, OptionalAdjustment::ConsumesNonOptional);
                return Ok(());
            }
        }
        Err(MismatchReason::ParamType {
            index,
            expected: self.unifier.apply(req),
            found: self.unifier.apply(wit),
        })
    }

    fn match_result(&mut self, req: TyId, wit: TyId) -> Result<(), MismatchReason> {
        let pool = self.cx.graph.types();
        let position = AdjustmentPosition::Result;
        if self.unifier.try_unify(req, wit) {
            self.note_function_adjustments(position, req, wit);
            return Ok(());
        }
        if let (None, Some(wit_inner)) = (pool.optional_payload(req), pool.optional_payload(wit)) {
            if self.unifier.try_unify(req, wit_inner) {
                self.push_optional(position, OptionalAdjustment::ProducesOptional);
                return Ok(());
            }
        }
        if let (Some(req_inner), None) = (pool.optional_payload(req), pool.optional_payload(wit)) {
            if self.unifier.try_unify(req_inner, wit) {
                self.push_optional(position, OptionalAdjustment::ProducesNonOptional);
                return Ok(());
            }
        }
        Err(MismatchReason::ResultType {
            expected: self.unifier.apply(req),
            found: self.unifier.apply(wit),
        })
    }

    fn push_optional(&mut self, position: AdjustmentPosition, kind: OptionalAdjustment) {
        self.adjustments.push(Adjustment::Optional { position, kind });
    }

    /// Escaping and sendable differences between two function types that
    /// otherwise unified.
    fn note_function_adjustments(&mut self, position: AdjustmentPosition, req: TyId, wit: TyId) {
        let pool = self.cx.graph.types();
        let (Some(rf), Some(wf)) = (
            pool.as_function(self.unifier.apply(req)),
            pool.as_function(self.unifier.apply(wit)),
        ) else {
            return;
        };
        if wf.flags.contains(FnFlags::ESCAPING) && !rf.flags.contains(FnFlags::ESCAPING) {
            self.adjustments.push(Adjustment::Type {
                position,
                kind: TypeAdjustment::NoescapeToEscaping,
            });
        }
        if wf.flags.contains(FnFlags::SENDABLE) && !rf.flags.contains(FnFlags::SENDABLE) {
            self.adjustments.push(Adjustment::Type {
                position,
                kind: TypeAdjustment::NonsendableToSendable,
            });
        }
    }

    // Phase 3

    fn finalize(&mut self) -> Result<(), MismatchReason> {
        let graph = self.cx.graph;
        let pool = graph.types();
        let decl = graph.decl(self.witness);

        if let (Some(rf), Some(wf)) = (
            pool.as_function(self.requirement_type),
            pool.as_function(self.witness_type),
        ) {
            let (req_async, wit_async) = (
                rf.flags.contains(FnFlags::ASYNC),
                wf.flags.contains(FnFlags::ASYNC),
            );
            if wit_async && !req_async {
                return Err(MismatchReason::Async);
            }
            if req_async && !wit_async {
                self.adjustments
                    .push(Adjustment::Effect(EffectAdjustment::SyncToAsync));
            }
            let (req_throws, wit_throws) = (
                rf.flags.contains(FnFlags::THROWS),
                wf.flags.contains(FnFlags::THROWS),
            );
            if wit_throws && !req_throws {
                return Err(MismatchReason::Throws);
            }
            if req_throws && !wit_throws {
                self.adjustments
                    .push(Adjustment::Effect(EffectAdjustment::NonThrowingToThrowing));
            }
        }

        let witness_settable = match &decl.kind {
            DeclKind::Var(v) => v.settable,
            DeclKind::Subscript(s) => s.settable,
            _ => false,
        };
        if self.requirement.settable && !witness_settable {
            return Err(MismatchReason::NotSettable);
        }

        if let DeclKind::Init(init) = &decl.kind {
            if init.failable && !self.requirement.failable {
                return Err(MismatchReason::Failability);
            }
        }

        self.check_generic_constraints()?;

        if self.requirement.kind != RequirementKind::Property
            && decl.name.labels != self.requirement.name.labels
        {
            return Err(MismatchReason::Labels {
                expected: self.requirement.name.labels.clone(),
                found: decl.name.labels.clone(),
            });
        }
        Ok(())
    }

    fn check_generic_constraints(&mut self) -> Result<(), MismatchReason> {
        let Some(env) = self.witness_env.clone() else {
            return Ok(());
        };
        for &requirement in env.requirements() {
            let holds = match requirement {
                GenericRequirement::Conforms { subject, protocol } => {
                    let subject = self.unifier.apply(subject);
                    self.satisfies_conformance(subject, protocol, &env)
                }
                GenericRequirement::SameType { first, second } => {
                    self.unifier.try_unify(first, second)
                }
            };
            if !holds {
                return Err(MismatchReason::GenericConstraint { requirement });
            }
        }
        Ok(())
    }

    /// Whether `ty` is known to conform to `protocol` here. Only declared
    /// and assumed conformances count; nothing is checked recursively.
    fn satisfies_conformance(
        &self,
        ty: TyId,
        protocol: DeclId,
        witness_env: &RequirementEnvironment,
    ) -> bool {
        let graph = self.cx.graph;
        let assumed = |env: Option<&RequirementEnvironment>| {
            env.is_some_and(|env| {
                env.requirements().iter().any(|req| {
                    matches!(*req, GenericRequirement::Conforms { subject, protocol: p }
                        if subject == ty && protocol_inherits(graph, p, protocol))
                })
            })
        };
        match graph.types().get(ty) {
            TypeData::Error | TypeData::DependentMember { .. } => true,
            TypeData::Placeholder(placeholder) => {
                // Unbound witness parameters are not constrained by anything yet
                Some(placeholder.sig) == witness_env.signature()
                    || assumed(self.requirement_env.as_deref())
            }
            TypeData::OpenAssoc(assoc) => match &graph.decl(assoc).kind {
                DeclKind::AssocType(a) => {
                    a.bounds.is_empty()
                        || a.bounds.iter().any(|&b| protocol_inherits(graph, b, protocol))
                }
                _ => false,
            },
            TypeData::GenericParam(_) => self.cx.adoptee_generics.is_some_and(|sig| {
                graph
                    .generic_signature(sig)
                    .conformances_of(ty)
                    .any(|p| protocol_inherits(graph, p, protocol))
            }),
            TypeData::SelfType => protocol_inherits(graph, self.requirement.protocol, protocol),
            TypeData::DynamicSelf(_) | TypeData::Nominal { .. } => {
                (ty == self.cx.self_type()
                    && protocol_inherits(graph, self.requirement.protocol, protocol))
                    || declares_conformance(graph, ty, protocol)
            }
            TypeData::Optional(_) | TypeData::Tuple(_) | TypeData::Function(_) => false,
        }
    }

    fn finish(self, mismatch: Option<MismatchReason>) -> RequirementMatch {
        let pool = self.cx.graph.types();
        let mut assoc_bindings: Vec<(DeclId, TyId)> = Vec::new();
        for ty in [self.requirement_type, self.witness_type] {
            pool.any(ty, &mut |id: TyId, data: &TypeData| {
                if let TypeData::OpenAssoc(assoc) = *data {
                    if let Some(bound) = self.unifier.binding_of(id) {
                        if !pool.has_unresolved(bound)
                            && !assoc_bindings.iter().any(|(a, _)| *a == assoc)
                        {
                            assoc_bindings.push((assoc, bound));
                        }
                    }
                }
                false
            });
        }
        RequirementMatch {
            witness: self.witness,
            mismatch,
            requirement_type: self.unifier.apply(self.requirement_type),
            witness_type: self.unifier.apply(self.witness_type),
            adjustments: self.adjustments,
            assoc_bindings,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
