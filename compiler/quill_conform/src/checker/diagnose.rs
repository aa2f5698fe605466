//! Conformance diagnostics.

use quill_diagnostic::{Diagnostic, ErrorCode, Suggestion};
use quill_ir::{DeclId, Span, TyId, TypeData};

use crate::conformance::{PolicyViolation, WitnessOrigin};
use crate::display::TypePrinter;
use crate::ledger::{ConstraintFailure, MissingWitnessContext};
use crate::lookup::declares_conformance;
use crate::requirement::{ProtocolRequirement, RequirementKind};

use super::{ConformanceChecker, ConformancePass, FailedLookup};

impl ConformancePass<'_> {
    /// Explain why `ty` does not conform to `protocol`, for failures found
    /// outside a conformance check (a generic argument, a cast).
    pub fn diagnose_conformance_failure(&mut self, ty: TyId, protocol: DeclId, span: Span) {
        let printer = TypePrinter::new(self.graph);
        let ty_name = printer.ty(ty);
        let protocol_name = printer.decl(protocol);
        let mut diag = Diagnostic::error(ErrorCode::E4001)
            .with_message(format!(
                "type `{ty_name}` does not conform to protocol `{protocol_name}`"
            ))
            .with_label(span, "required here");

        diag = match self.graph.types().get(ty) {
            TypeData::Error => return,
            TypeData::Nominal { .. } | TypeData::DynamicSelf(_) => {
                if declares_conformance(self.graph, ty, protocol) {
                    diag.with_note(format!(
                        "`{ty_name}` declares the conformance, but does not satisfy it"
                    ))
                } else {
                    diag.with_suggestion(Suggestion::text(format!(
                        "add the conformance: `extension {ty_name}: {protocol_name} {{}}`"
                    )))
                }
            }
            TypeData::GenericParam(_) => diag.with_suggestion(Suggestion::text(format!(
                "constrain `{ty_name}` to `{protocol_name}`"
            ))),
            TypeData::Optional(_) | TypeData::Tuple(_) | TypeData::Function(_) => {
                diag.with_note("only nominal types can conform to protocols")
            }
            _ => diag,
        };
        self.sink.report(diag);
    }
}

impl ConformanceChecker<'_, '_> {
    /// Report the ledger entries this check produced: constraint failures
    /// one by one, everything else as a single error with a note per
    /// requirement.
    pub(crate) fn diagnose_missing_witnesses(&mut self) {
        let missing = self.pass.local_missing_witnesses(self.conformance);
        if missing.is_empty() {
            return;
        }
        let graph = self.graph;
        let printer = TypePrinter::new(graph);
        let adoptee = printer.ty(self.conformance.adoptee());
        let protocol = printer.decl(self.conformance.protocol());
        let context_span = graph.decl(self.conformance.context()).span;

        let mut aggregate: Option<Diagnostic> = None;
        for entry in missing {
            let requirement = graph.decl(entry.requirement);
            let name = printer.name(&requirement.name);
            match entry.context {
                Some(MissingWitnessContext::Constraint(failure)) => {
                    let message = match failure {
                        ConstraintFailure::Conformance { ty, protocol: bound } => format!(
                            "type `{}` chosen for `{name}` does not conform to `{}`",
                            printer.ty(ty),
                            printer.decl(bound)
                        ),
                        ConstraintFailure::SameType { ty, expected } => format!(
                            "type `{}` chosen for `{name}` must be the same as `{}`",
                            printer.ty(ty),
                            printer.ty(expected)
                        ),
                    };
                    self.pass.sink.report(
                        Diagnostic::error(ErrorCode::E4012)
                            .with_message(message)
                            .with_label(context_span, format!("in conformance to `{protocol}`"))
                            .with_secondary_label(requirement.span, "associated type declared here"),
                    );
                }
                context => {
                    let kind = RequirementKind::of(&requirement.kind)
                        .map_or("requirement", RequirementKind::describe);
                    let note = if context == Some(MissingWitnessContext::DerivationFailed) {
                        format!("cannot synthesize {kind} `{name}`")
                    } else if let Some(sig) = ProtocolRequirement::from_decl(graph, entry.requirement)
                        .and_then(|r| r.signature)
                    {
                        format!(
                            "protocol requires {kind} `{name}` with type `{}`",
                            printer.ty(sig)
                        )
                    } else {
                        format!("protocol requires {kind} `{name}`")
                    };
                    let diag = aggregate.take().unwrap_or_else(|| {
                        Diagnostic::error(ErrorCode::E4001)
                            .with_message(format!(
                                "type `{adoptee}` does not conform to protocol `{protocol}`"
                            ))
                            .with_label(context_span, "conformance declared here")
                            .with_suggestion(Suggestion::text(
                                "add the missing declarations to the conforming type",
                            ))
                    });
                    aggregate = Some(
                        diag.with_note(note)
                            .with_secondary_label(requirement.span, format!("`{name}` declared here")),
                    );
                }
            }
        }
        if let Some(diag) = aggregate {
            self.pass.sink.report(diag);
        }
    }

    /// Report why lookup's candidates could not witness `req`.
    pub(crate) fn diagnose_failed_witness(
        &mut self,
        req: &ProtocolRequirement,
        failure: &FailedLookup,
    ) {
        let graph = self.graph;
        let printer = TypePrinter::new(graph);
        let req_name = printer.name(&req.name);
        let kind = req.kind.describe();

        if let Some(label_only) = failure.matches.iter().find(|m| m.is_label_only_mismatch()) {
            let witness = graph.decl(label_only.witness);
            let diag = Diagnostic::error(ErrorCode::E4003)
                .with_message(format!(
                    "argument labels of `{}` do not match {kind} `{req_name}`",
                    printer.name(&witness.name)
                ))
                .with_label(witness.span, "labels differ")
                .with_secondary_label(req.span, "requirement declared here")
                .with_suggestion(Suggestion::maybe_incorrect(
                    "rename to match the requirement",
                    witness.span,
                    req_name,
                ));
            self.pass.sink.report(diag);
            return;
        }

        let mut diag = Diagnostic::error(ErrorCode::E4002).with_message(format!(
            "no candidate satisfies {kind} `{req_name}` of protocol `{}`",
            printer.decl(req.protocol)
        ));
        for (index, found) in failure.matches.iter().enumerate() {
            let witness = graph.decl(found.witness);
            let reason = found
                .mismatch
                .as_ref()
                .map_or_else(|| "does not match".to_owned(), |m| printer.mismatch(m));
            if index == 0 {
                diag = diag.with_label(witness.span, reason);
            } else {
                diag = diag.with_secondary_label(witness.span, reason);
            }
            diag = diag.with_note(format!(
                "candidate `{}` has type `{}`",
                printer.name(&witness.name),
                printer.ty(found.witness_type)
            ));
        }
        if failure.ignoring_names {
            diag = diag.with_note(format!(
                "no declaration is named `{req_name}`; candidates share only the base name"
            ));
        }
        self.pass
            .sink
            .report(diag.with_secondary_label(req.span, "requirement declared here"));
    }

    /// A candidate was rejected but a fallback satisfied the requirement;
    /// the user probably meant the candidate.
    pub(crate) fn diagnose_near_miss(
        &mut self,
        req: &ProtocolRequirement,
        failure: &FailedLookup,
        origin: WitnessOrigin,
    ) {
        if !self.pass.config.warn_near_misses {
            return;
        }
        let Some(closest) = failure.matches.first() else {
            return;
        };
        let printer = TypePrinter::new(self.graph);
        let witness = self.graph.decl(closest.witness);
        let fallback = match origin {
            WitnessOrigin::Derived => "a synthesized implementation",
            WitnessOrigin::Default | WitnessOrigin::Lookup => "a default implementation",
        };
        let reason = closest
            .mismatch
            .as_ref()
            .map_or_else(|| "does not match".to_owned(), |m| printer.mismatch(m));
        self.pass.sink.report(
            Diagnostic::warning(ErrorCode::W4001)
                .with_message(format!(
                    "`{}` nearly matches {} `{}` of protocol `{}`",
                    printer.name(&witness.name),
                    req.kind.describe(),
                    printer.name(&req.name),
                    printer.decl(req.protocol)
                ))
                .with_label(witness.span, reason)
                .with_note(format!("the requirement is satisfied by {fallback} instead")),
        );
    }

    pub(crate) fn diagnose_violation(
        &mut self,
        req: &ProtocolRequirement,
        witness: DeclId,
        violation: PolicyViolation,
    ) {
        let graph = self.graph;
        let printer = TypePrinter::new(graph);
        let decl = graph.decl(witness);
        let name = printer.name(&decl.name);
        let kind = req.kind.describe();
        let protocol = printer.decl(req.protocol);

        let diag = match violation {
            PolicyViolation::Access { required, found } => Diagnostic::error(ErrorCode::E4004)
                .with_message(format!(
                    "{kind} `{name}` must be `{required}` to satisfy a requirement of `{protocol}`"
                ))
                .with_label(decl.span, format!("declared `{found}` here"))
                .with_suggestion(Suggestion::maybe_incorrect(
                    format!("mark it `{required}`"),
                    decl.span,
                    required.as_str(),
                )),
            PolicyViolation::SetterAccess { required, found } => {
                Diagnostic::error(ErrorCode::E4005)
                    .with_message(format!(
                        "setter of `{name}` must be `{required}` to satisfy a requirement of `{protocol}`"
                    ))
                    .with_label(decl.span, format!("setter is `{found}`"))
            }
            PolicyViolation::PostDates {
                introduced,
                required,
            } => Diagnostic::error(ErrorCode::E4006)
                .with_message(format!(
                    "`{name}` is only available from version {introduced}, but the conformance to `{protocol}` needs it from {required}"
                ))
                .with_label(decl.span, format!("introduced in {introduced}")),
            PolicyViolation::Unavailable => Diagnostic::error(ErrorCode::E4007)
                .with_message(format!(
                    "unavailable {kind} `{name}` cannot satisfy a requirement of `{protocol}`"
                ))
                .with_label(decl.span, "marked unavailable"),
            PolicyViolation::Isolation { requirement, witness } => {
                let diag = if self.pass.config.strict_isolation {
                    Diagnostic::error(ErrorCode::E4008)
                } else {
                    Diagnostic::warning(ErrorCode::W4002)
                };
                diag.with_message(format!(
                    "{kind} `{name}` is {}, so it cannot satisfy a synchronous requirement of `{protocol}`",
                    printer.isolation(witness)
                ))
                .with_label(decl.span, "isolated here")
                .with_note(format!("the requirement is {}", printer.isolation(requirement)))
                .with_suggestion(Suggestion::text(
                    "make the declaration nonisolated, or the requirement async",
                ))
            }
            PolicyViolation::NonFinalSelfResult => Diagnostic::error(ErrorCode::E4009)
                .with_message(format!(
                    "{kind} `{name}` in a non-final class must return `Self` to satisfy `{protocol}`"
                ))
                .with_label(decl.span, "returns the class type"),
            PolicyViolation::NonFinalSelfInvariant => Diagnostic::error(ErrorCode::E4010)
                .with_message(format!(
                    "a non-final class cannot satisfy {kind} `{}` of `{protocol}`, which uses `Self` in an invariant position",
                    printer.name(&req.name)
                ))
                .with_label(decl.span, "witness declared here")
                .with_suggestion(Suggestion::text("mark the class `final`")),
            PolicyViolation::RequiredInitializer => Diagnostic::error(ErrorCode::E4011)
                .with_message(format!(
                    "initializer `{name}` must be `required` to satisfy a requirement of `{protocol}`"
                ))
                .with_label(decl.span, "not required")
                .with_suggestion(Suggestion::maybe_incorrect(
                    "add `required`",
                    decl.span,
                    "required",
                )),
        };
        self.pass
            .sink
            .report(diag.with_secondary_label(req.span, "requirement declared here"));
    }
}
