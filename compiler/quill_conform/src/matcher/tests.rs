use super::*;
use crate::testing::Fixture;
use pretty_assertions::assert_eq;
use quill_ir::{DeclFlags, GenericParamKey};

struct Setup {
    fx: Fixture,
    int: TyId,
    string: TyId,
    protocol: DeclId,
    adoptee: DeclId,
}

fn setup() -> Setup {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let string = fx.structure("String");
    let protocol = fx.protocol("P");
    let adoptee = fx.structure("S");
    Setup {
        int: fx.ty(int),
        string: fx.ty(string),
        fx,
        protocol,
        adoptee,
    }
}

fn run_with(fx: &Fixture, cx: &MatchContext<'_>, req: DeclId, witness: DeclId) -> RequirementMatch {
    let requirement = ProtocolRequirement::from_decl(&fx.store, req).unwrap();
    let mut cache = RequirementEnvironmentCache::new();
    match_witness(cx, &mut cache, &requirement, witness)
}

fn run(fx: &Fixture, adoptee: DeclId, req: DeclId, witness: DeclId) -> RequirementMatch {
    let cx = MatchContext::new(&fx.store, fx.ty(adoptee));
    run_with(fx, &cx, req, witness)
}

#[test]
fn identical_signatures_match_without_adjustments() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.func(protocol, "f(x:)", &[int], string);
    let witness = fx.func(adoptee, "f(x:)", &[int], string);

    let m = run(&fx, adoptee, req, witness);
    assert!(m.is_viable());
    assert!(m.adjustments.is_empty());
    assert_eq!(m.requirement_type, m.witness_type);
}

#[test]
fn optional_result_is_an_adjustment() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.func(protocol, "f(x:)", &[int], string);
    let opt = fx.optional(string);
    let witness = fx.func(adoptee, "f(x:)", &[int], opt);

    let m = run(&fx, adoptee, req, witness);
    assert!(m.is_viable());
    assert_eq!(
        m.adjustments.as_slice(),
        &[Adjustment::Optional {
            position: AdjustmentPosition::Result,
            kind: OptionalAdjustment::ProducesOptional,
        }]
    );
}

#[test]
fn labels_are_checked_last() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.func(protocol, "f(x:)", &[int], string);
    let witness = fx.func(adoptee, "f(y:)", &[int], string);

    let m = run(&fx, adoptee, req, witness);
    assert!(m.is_label_only_mismatch());
    assert_eq!(
        m.mismatch,
        Some(MismatchReason::Labels {
            expected: fx.name("f(x:)").labels,
            found: fx.name("f(y:)").labels,
        })
    );
}

#[test]
fn type_mismatch_wins_over_labels() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.func(protocol, "f(x:)", &[int], string);
    let witness = fx.func(adoptee, "f(y:)", &[string], string);

    let m = run(&fx, adoptee, req, witness);
    assert_eq!(
        m.mismatch,
        Some(MismatchReason::ParamType {
            index: 0,
            expected: int,
            found: string,
        })
    );
}

#[test]
fn arity_mismatch() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.func(protocol, "f(_:)", &[int], string);
    let witness = fx.func(adoptee, "f(_:_:)", &[int, int], string);

    assert_eq!(
        run(&fx, adoptee, req, witness).mismatch,
        Some(MismatchReason::Arity {
            expected: 1,
            found: 2,
        })
    );
}

#[test]
fn effects_may_only_be_dropped() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let plain = fx.func_ty(&[], int);
    let throwing = fx.types().function(Vec::new(), int, FnFlags::THROWS);
    let asynchronous = fx.types().function(Vec::new(), int, FnFlags::ASYNC);

    let sync_req = fx.func_with_signature(protocol, "f()", plain);
    let async_req = fx.func_with_signature(protocol, "g()", asynchronous);
    let throwing_req = fx.func_with_signature(protocol, "h()", throwing);
    let async_witness = fx.func_with_signature(adoptee, "f()", asynchronous);
    let sync_witness = fx.func_with_signature(adoptee, "g()", plain);
    let throwing_witness = fx.func_with_signature(adoptee, "f()", throwing);
    let quiet_witness = fx.func_with_signature(adoptee, "h()", plain);

    assert_eq!(
        run(&fx, adoptee, sync_req, async_witness).mismatch,
        Some(MismatchReason::Async)
    );
    assert_eq!(
        run(&fx, adoptee, sync_req, throwing_witness).mismatch,
        Some(MismatchReason::Throws)
    );
    assert_eq!(
        run(&fx, adoptee, async_req, sync_witness).adjustments.as_slice(),
        &[Adjustment::Effect(EffectAdjustment::SyncToAsync)]
    );
    assert_eq!(
        run(&fx, adoptee, throwing_req, quiet_witness).adjustments.as_slice(),
        &[Adjustment::Effect(EffectAdjustment::NonThrowingToThrowing)]
    );
}

#[test]
fn settable_requirement_needs_settable_witness() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let req = fx.var(protocol, "count", int, true);
    let read_only = fx.var(adoptee, "count", int, false);

    assert_eq!(
        run(&fx, adoptee, req, read_only).mismatch,
        Some(MismatchReason::NotSettable)
    );
}

#[test]
fn property_type_mismatch() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let req = fx.var(protocol, "count", int, false);
    let witness = fx.var(adoptee, "count", string, true);

    assert_eq!(
        run(&fx, adoptee, req, witness).mismatch,
        Some(MismatchReason::PropertyType {
            expected: int,
            found: string,
        })
    );
}

#[test]
fn failable_initializer_needs_failable_requirement() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let req = fx.init(protocol, "init(value:)", &[int], false);
    let failable_req = fx.init(protocol, "init(raw:)", &[int], true);
    let witness = fx.init(adoptee, "init(value:)", &[int], true);
    let plain_witness = fx.init(adoptee, "init(raw:)", &[int], false);

    assert_eq!(
        run(&fx, adoptee, req, witness).mismatch,
        Some(MismatchReason::Failability)
    );
    assert!(run(&fx, adoptee, failable_req, plain_witness).is_viable());
}

#[test]
fn static_requirement_rejects_instance_witness() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let req = fx.func(protocol, "make()", &[], int);
    fx.update(req, |d| d.flags |= DeclFlags::STATIC);
    let witness = fx.func(adoptee, "make()", &[], int);

    assert_eq!(
        run(&fx, adoptee, req, witness).mismatch,
        Some(MismatchReason::StaticMismatch)
    );
}

#[test]
fn non_optional_parameter_needs_optional_requirement() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let opt_int = fx.optional(int);
    let req = fx.func(protocol, "f(_:)", &[opt_int], string);
    let witness = fx.func(adoptee, "f(_:)", &[int], string);
    assert_eq!(
        run(&fx, adoptee, req, witness).mismatch,
        Some(MismatchReason::ParamOptionality { index: 0 })
    );

    fx.update(req, |d| d.flags |= DeclFlags::OPTIONAL);
    assert_eq!(
        run(&fx, adoptee, req, witness).adjustments.as_slice(),
        &[Adjustment::Optional {
            position: AdjustmentPosition::Param(0),
            kind: OptionalAdjustment::ConsumesNonOptional,
        }]
    );
}

#[test]
fn escaping_closure_parameter_is_an_adjustment() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let unit = fx.types().unit();
    let callback = fx.func_ty(&[int], unit);
    let escaping = fx.types().function(vec![int], unit, FnFlags::ESCAPING);
    let req = fx.func(protocol, "run(_:)", &[callback], unit);
    let witness = fx.func(adoptee, "run(_:)", &[escaping], unit);

    let m = run(&fx, adoptee, req, witness);
    assert!(m.is_viable());
    assert_eq!(
        m.adjustments.as_slice(),
        &[Adjustment::Type {
            position: AdjustmentPosition::Param(0),
            kind: TypeAdjustment::NoescapeToEscaping,
        }]
    );
}

#[test]
fn open_associated_type_is_bound() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let element = fx.assoc_type(protocol, "Element", None);
    let element_ty = fx.self_member(element);
    let req = fx.func(protocol, "first()", &[], element_ty);
    let witness = fx.func(adoptee, "first()", &[], int);

    let m = run(&fx, adoptee, req, witness);
    assert!(m.is_viable());
    assert_eq!(m.assoc_bindings, vec![(element, int)]);
    assert_eq!(m.requirement_type, m.witness_type);
}

#[test]
fn resolved_type_witness_is_substituted() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let element = fx.assoc_type(protocol, "Element", None);
    let element_ty = fx.self_member(element);
    let req = fx.func(protocol, "first()", &[], element_ty);
    let witness = fx.func(adoptee, "first()", &[], int);

    let cx = MatchContext::new(&fx.store, fx.ty(adoptee)).with_type_witness(element, string);
    let m = run_with(&fx, &cx, req, witness);
    assert_eq!(
        m.mismatch,
        Some(MismatchReason::ResultType {
            expected: string,
            found: int,
        })
    );
    assert!(m.assoc_bindings.is_empty());
}

#[test]
fn witness_generic_constraints_must_hold() {
    let Setup { mut fx, int, string, protocol, adoptee } = setup();
    let hashable = fx.protocol("Hashable");
    let int_decl = fx.types().nominal_decl(int).unwrap();
    fx.conform(int_decl, hashable);

    let unit = fx.types().unit();
    let t = fx.types().generic_param(GenericParamKey::new(1, 0));
    let hash_int = fx.func(protocol, "insert(_:)", &[int], unit);
    let hash_string = fx.func(protocol, "insert(_:)", &[string], unit);
    let witness = fx.func(adoptee, "insert(_:)", &[t], unit);
    fx.generics(witness, 1, &["T"], |tys| {
        vec![GenericRequirement::Conforms {
            subject: tys[0],
            protocol: hashable,
        }]
    });

    assert!(run(&fx, adoptee, hash_int, witness).is_viable());
    let m = run(&fx, adoptee, hash_string, witness);
    assert!(matches!(
        m.mismatch,
        Some(MismatchReason::GenericConstraint {
            requirement: GenericRequirement::Conforms { protocol, .. },
        }) if protocol == hashable
    ));
}

#[test]
fn covariant_self_accepts_the_class() {
    let mut fx = Fixture::new();
    let protocol = fx.protocol("P");
    let class = fx.class("C");
    let req = fx.func(protocol, "copy()", &[], TyId::SELF);
    let class_ty = fx.ty(class);
    let witness = fx.func(class, "copy()", &[], class_ty);

    let cx = MatchContext::new(&fx.store, class_ty).with_covariant_self(Some(class));
    assert_eq!(cx.self_type(), fx.types().dynamic_self(class));
    assert!(run_with(&fx, &cx, req, witness).is_viable());
}

#[test]
fn kind_mismatch() {
    let Setup { mut fx, int, protocol, adoptee, .. } = setup();
    let req = fx.func(protocol, "count()", &[], int);
    let witness = fx.var(adoptee, "count", int, false);
    assert_eq!(run(&fx, adoptee, req, witness).mismatch, Some(MismatchReason::Kind));
}
