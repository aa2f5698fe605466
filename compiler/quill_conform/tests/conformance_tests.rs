//! End-to-end conformance checks through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use quill_conform::testing::Fixture;
use quill_conform::{
    Adjustment, AdjustmentPosition, CheckerConfig, Conformance, ConformancePass, ConformanceState,
    OptionalAdjustment, TypeWitness, TypeWitnessEntry, TypeWitnessSource, WitnessDecl,
    WitnessEntry, WitnessOrigin,
};
use quill_diagnostic::DiagnosticQueue;
use quill_ir::{DeclFlags, DerivationKind, TyId};

#[test]
fn exact_witness() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let string = fx.structure("String");
    let string_ty = fx.ty(string);
    let p = fx.protocol("P");
    let req = fx.func(p, "f(x:)", &[int_ty], string_ty);
    let s = fx.structure("S");
    let witness = fx.func(s, "f(x:)", &[int_ty], string_ty);

    let outcome = fx.check(p, s);
    assert!(outcome.conformance.is_satisfied());
    let found = outcome
        .conformance
        .witness(req)
        .and_then(WitnessEntry::witness)
        .unwrap();
    assert_eq!(found.decl, WitnessDecl::Declared(witness));
    assert_eq!(found.origin, WitnessOrigin::Lookup);
    assert!(found.adjustments.is_empty());
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn optional_result_witness() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let string = fx.structure("String");
    let string_ty = fx.ty(string);
    let p = fx.protocol("P");
    let req = fx.func(p, "f(x:)", &[int_ty], string_ty);
    let s = fx.structure("S");
    let opt = fx.optional(string_ty);
    fx.func(s, "f(x:)", &[int_ty], opt);

    let outcome = fx.check(p, s);
    assert!(outcome.conformance.is_satisfied());
    let found = outcome
        .conformance
        .witness(req)
        .and_then(WitnessEntry::witness)
        .unwrap();
    assert_eq!(
        found.adjustments.as_slice(),
        &[Adjustment::Optional {
            position: AdjustmentPosition::Result,
            kind: OptionalAdjustment::ProducesOptional,
        }]
    );
}

#[test]
fn missing_witness_is_reported_once() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let p = fx.protocol("P");
    let req = fx.func(p, "f(x:)", &[int_ty], int_ty);
    let s = fx.structure("S");

    let outcome = fx.check(p, s);
    assert_eq!(outcome.conformance.witness(req), Some(&WitnessEntry::Missing));
    assert_eq!(outcome.missing.len(), 1);
    assert_eq!(outcome.missing[0].requirement, req);
    assert_eq!(outcome.error_codes(), vec!["E4001"]);
    assert_eq!(
        outcome.diagnostics[0].message,
        "type `S` does not conform to protocol `P`"
    );
    assert_eq!(
        outcome.diagnostics[0].notes,
        vec!["protocol requires method `f(x:)` with type `(Int) -> Int`".to_owned()]
    );
}

#[test]
fn defaulted_associated_type() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let p = fx.protocol("P");
    let element = fx.assoc_type(p, "Element", Some(int_ty));
    let s = fx.structure("S");

    let outcome = fx.check(p, s);
    assert!(outcome.conformance.is_satisfied());
    assert_eq!(
        outcome.conformance.type_witness(element),
        Some(&TypeWitnessEntry::Resolved(TypeWitness {
            ty: int_ty,
            source: TypeWitnessSource::Defaulted(element),
        }))
    );
}

#[test]
fn associated_type_defaulted_by_extension_alias() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let p = fx.protocol("P");
    let element = fx.assoc_type(p, "Element", None);
    let ext = fx.extension(p);
    let alias = fx.typealias(ext, "Element", int_ty);
    let s = fx.structure("S");

    let outcome = fx.check(p, s);
    assert!(outcome.conformance.is_satisfied());
    assert_eq!(
        outcome.conformance.type_witness(element),
        Some(&TypeWitnessEntry::Resolved(TypeWitness {
            ty: int_ty,
            source: TypeWitnessSource::Defaulted(alias),
        }))
    );
}

#[test]
fn derived_equality() {
    let mut fx = Fixture::new();
    let bool_decl = fx.structure("Bool");
    let bool_ty = fx.ty(bool_decl);
    let equatable = fx.derivable_protocol("Equatable", DerivationKind::Equality);
    let eq = fx.func(equatable, "==(_:_:)", &[TyId::SELF, TyId::SELF], bool_ty);
    fx.update(eq, |d| d.flags |= DeclFlags::STATIC);
    let int = fx.structure("Int");
    fx.conform(int, equatable);
    let int_ty = fx.ty(int);
    let point = fx.structure("Point");
    fx.conform(point, equatable);
    fx.stored(point, int_ty);
    fx.stored(point, int_ty);

    let config = CheckerConfig {
        verify_nested_conformances: false,
        ..CheckerConfig::default()
    };
    let outcome = fx.check_with(equatable, point, config);
    assert!(outcome.conformance.is_satisfied());
    assert_eq!(outcome.stats.matches_attempted, 0);
    assert_eq!(outcome.stats.witnesses_derived, 1);
    assert_eq!(outcome.stats.conformances_checked, 1);
    let found = outcome
        .conformance
        .witness(eq)
        .and_then(WitnessEntry::witness)
        .unwrap();
    assert_eq!(found.origin, WitnessOrigin::Derived);
    let WitnessDecl::Synthesized(synthesized) = &found.decl else {
        panic!("expected a synthesized witness, got {:?}", found.decl);
    };
    let point_ty = fx.ty(point);
    assert_eq!(
        synthesized.signature,
        Some(fx.func_ty(&[point_ty, point_ty], bool_ty))
    );
}

#[test]
fn derived_equality_checks_members_when_verifying() {
    let mut fx = Fixture::new();
    let bool_decl = fx.structure("Bool");
    let bool_ty = fx.ty(bool_decl);
    let equatable = fx.derivable_protocol("Equatable", DerivationKind::Equality);
    let eq = fx.func(equatable, "==(_:_:)", &[TyId::SELF, TyId::SELF], bool_ty);
    fx.update(eq, |d| d.flags |= DeclFlags::STATIC);
    let int = fx.structure("Int");
    fx.conform(int, equatable);
    let int_ty = fx.ty(int);
    let point = fx.structure("Point");
    fx.stored(point, int_ty);

    let outcome = fx.check(equatable, point);
    assert!(outcome.conformance.is_satisfied());
    // Int: Equatable is derived too, on the way.
    assert_eq!(outcome.stats.conformances_checked, 2);
    assert_eq!(outcome.stats.witnesses_derived, 2);
}

#[test]
fn rechecking_a_finished_conformance_is_a_no_op() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");
    fx.func(s, "f()", &[], TyId::ERROR);

    let mut outcome = fx.check(p, s);
    assert_eq!(outcome.conformance.state(), ConformanceState::Checked);
    let mut diagnostics = Vec::new();
    let mut pass = ConformancePass::new(&fx.store, &mut diagnostics, CheckerConfig::default());
    pass.check_conformance(&mut outcome.conformance);
    assert_eq!(pass.stats().conformances_checked, 0);
    drop(pass);
    assert!(diagnostics.is_empty());
}

#[test]
fn queue_drops_repeated_failures_across_passes() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");

    let mut queue = DiagnosticQueue::new();
    for _ in 0..2 {
        let mut conformance = Conformance::for_nominal(&fx.store, p, s);
        let mut pass = ConformancePass::new(&fx.store, &mut queue, CheckerConfig::default());
        pass.check_conformance(&mut conformance);
        assert!(!conformance.is_satisfied());
    }
    assert_eq!(queue.error_count(), 1);
    let codes: Vec<&str> = queue.flush().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["E4001"]);
}

#[test]
fn tracing_initializes_once() {
    quill_conform::init_tracing();
    quill_conform::init_tracing();
}
