//! Policy checks on a found witness.
//!
//! None of these reject the witness. Violations are reported and kept on
//! the witness so later passes can see them.

use quill_ir::{
    AccessLevel, DeclFlags, DeclId, DeclKind, FnFlags, Isolation, TyId, TypeData, Version,
};

use crate::conformance::{IsolationCrossing, PolicyViolation, WitnessOrigin};
use crate::matcher::declared_signature;
use crate::requirement::{self_use, ProtocolRequirement, RequirementKind, SelfUse};

use super::ConformanceChecker;

/// Outcome of the policy checks for one witness.
pub(crate) struct PolicyOutcome {
    pub(crate) violations: Vec<PolicyViolation>,
    pub(crate) isolation_crossing: Option<IsolationCrossing>,
}

impl ConformanceChecker<'_, '_> {
    /// Run every policy check on `witness` and report what it breaks.
    pub(crate) fn check_witness_policies(
        &mut self,
        req: &ProtocolRequirement,
        witness: DeclId,
        origin: WitnessOrigin,
    ) -> PolicyOutcome {
        let mut violations = Vec::new();
        violations.extend(self.check_witness_access(req, witness));
        violations.extend(self.check_witness_availability(req, witness));
        let (isolation_crossing, isolation) = self.check_actor_isolation(req, witness);
        violations.extend(isolation);
        if origin == WitnessOrigin::Lookup {
            violations.extend(self.check_non_final_class_witness(req, witness));
        }
        for &violation in &violations {
            self.diagnose_violation(req, witness, violation);
        }
        PolicyOutcome {
            violations,
            isolation_crossing,
        }
    }

    /// The access every witness needs: the lesser of the protocol's and
    /// the adoptee's, never above `public`.
    pub(crate) fn required_access(&self, req: &ProtocolRequirement) -> AccessLevel {
        self.graph
            .access_level(req.protocol)
            .min(self.graph.access_level(self.conformance.context()))
            .min(AccessLevel::Public)
    }

    fn check_witness_access(
        &self,
        req: &ProtocolRequirement,
        witness: DeclId,
    ) -> Option<PolicyViolation> {
        let required = self.required_access(req);
        let found = self.graph.access_level(witness);
        if found < required {
            return Some(PolicyViolation::Access { required, found });
        }
        if !req.settable {
            return None;
        }
        let setter = match &self.graph.decl(witness).kind {
            DeclKind::Var(var) => var.setter_access,
            DeclKind::Subscript(sub) => sub.setter_access,
            _ => None,
        }
        .unwrap_or(found);
        (setter < required).then_some(PolicyViolation::SetterAccess {
            required,
            found: setter,
        })
    }

    /// The earliest version every witness must exist in: the latest of
    /// the deployment target, the requirement's introduction and the
    /// adoptee's introduction.
    pub(crate) fn required_availability(&self, req: &ProtocolRequirement) -> Version {
        let graph = self.graph;
        [req.decl, self.conformance.context()]
            .into_iter()
            .filter_map(|id| graph.availability(id).introduced)
            .fold(self.pass.config.deployment_target, Version::max)
    }

    fn check_witness_availability(
        &self,
        req: &ProtocolRequirement,
        witness: DeclId,
    ) -> Option<PolicyViolation> {
        let availability = self.graph.availability(witness);
        if availability.unavailable && !self.graph.availability(req.decl).unavailable {
            return Some(PolicyViolation::Unavailable);
        }
        let required = self.required_availability(req);
        availability
            .introduced
            .filter(|&introduced| introduced > required)
            .map(|introduced| PolicyViolation::PostDates {
                introduced,
                required,
            })
    }

    /// Compare the witness's isolation with the requirement's.
    ///
    /// A nonisolated witness fits anything. Otherwise the call crosses an
    /// isolation boundary, which an `async` requirement absorbs; a
    /// synchronous one cannot.
    fn check_actor_isolation(
        &self,
        req: &ProtocolRequirement,
        witness: DeclId,
    ) -> (Option<IsolationCrossing>, Option<PolicyViolation>) {
        let requirement = self.graph.isolation(req.decl);
        let found = self.graph.isolation(witness);
        if found == requirement || found == Isolation::Nonisolated {
            return (None, None);
        }
        let crossing = IsolationCrossing {
            from: requirement,
            to: found,
        };
        let is_async = req
            .signature
            .and_then(|sig| self.graph.types().as_function(sig))
            .is_some_and(|func| func.flags.contains(FnFlags::ASYNC));
        if is_async {
            return (Some(crossing), None);
        }
        (
            Some(crossing),
            Some(PolicyViolation::Isolation {
                requirement,
                witness: found,
            }),
        )
    }

    /// Rules for witnesses a subclass inherits: initializers must be
    /// `required`, and `Self` results must really be dynamic `Self`.
    fn check_non_final_class_witness(
        &self,
        req: &ProtocolRequirement,
        witness: DeclId,
    ) -> Option<PolicyViolation> {
        let class = self.covariant_class?;
        let decl = self.graph.decl(witness);
        if decl.parent.and_then(|p| self.graph.nominal_of(p)) != Some(class) {
            return None;
        }
        if req.kind == RequirementKind::Initializer {
            return (!decl.flags.contains(DeclFlags::REQUIRED))
                .then_some(PolicyViolation::RequiredInitializer);
        }
        match self_use(self.graph, req) {
            SelfUse::None => None,
            SelfUse::Invariant => Some(PolicyViolation::NonFinalSelfInvariant),
            SelfUse::CovariantResult => {
                let result = self.declared_result(&decl.kind)?;
                let pool = self.graph.types();
                let payload = pool.optional_payload(result).unwrap_or(result);
                matches!(pool.get(payload), TypeData::Nominal { decl: nominal, .. } if nominal == class)
                    .then_some(PolicyViolation::NonFinalSelfResult)
            }
        }
    }

    /// What a value declaration produces: a property's type, or a
    /// function's or subscript's result.
    fn declared_result(&self, kind: &DeclKind) -> Option<TyId> {
        let signature = declared_signature(kind)?;
        if let DeclKind::Var(_) = kind {
            return Some(signature);
        }
        self.graph
            .types()
            .as_function(signature)
            .map(|func| func.result)
    }
}
