use super::*;
use crate::testing::Fixture;
use pretty_assertions::assert_eq;
use quill_ir::{DeclFlags, ImplementsAttr};

fn requirement(fx: &Fixture, decl: DeclId) -> ProtocolRequirement {
    ProtocolRequirement::from_decl(&fx.store, decl).unwrap()
}

#[test]
fn exact_names_win_over_base_names() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f(x:)", &[], TyId::ERROR);
    let s = fx.structure("S");
    fx.func(s, "f(y:)", &[], TyId::ERROR);
    let exact = fx.func(s, "f(x:)", &[], TyId::ERROR);

    let lookup = lookup_value_witnesses(&fx.store, s, &requirement(&fx, req));
    assert_eq!(lookup.candidates, vec![exact]);
    assert!(!lookup.ignoring_names);
    assert!(!lookup.via_implements);
}

#[test]
fn base_name_fallback_is_flagged() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f(x:)", &[], TyId::ERROR);
    let s = fx.structure("S");
    let first = fx.func(s, "f(y:)", &[], TyId::ERROR);
    let ext = fx.extension(s);
    let second = fx.func(ext, "f(z:)", &[], TyId::ERROR);

    let lookup = lookup_value_witnesses(&fx.store, s, &requirement(&fx, req));
    assert_eq!(lookup.candidates, vec![first, second]);
    assert!(lookup.ignoring_names);
}

#[test]
fn kind_and_static_narrow_candidates() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");
    fx.var(s, "f", TyId::ERROR, false);
    let stat = fx.func(s, "f()", &[], TyId::ERROR);
    fx.update(stat, |d| d.flags |= DeclFlags::STATIC);

    assert!(lookup_value_witnesses(&fx.store, s, &requirement(&fx, req)).is_empty());
}

#[test]
fn implements_overrides_names() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");
    fx.func(s, "f()", &[], TyId::ERROR);
    let renamed = fx.func(s, "customF()", &[], TyId::ERROR);
    let written = fx.name("f");
    fx.update(renamed, |d| {
        d.implements = Some(ImplementsAttr {
            protocol: p,
            requirement: written,
        });
    });

    let lookup = lookup_value_witnesses(&fx.store, s, &requirement(&fx, req));
    assert_eq!(lookup.candidates, vec![renamed]);
    assert!(lookup.via_implements);
}

#[test]
fn member_reserved_for_another_requirement_is_hidden() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f()", &[], TyId::ERROR);
    fx.func(p, "g()", &[], TyId::ERROR);
    let s = fx.structure("S");
    let reserved = fx.func(s, "f()", &[], TyId::ERROR);
    let written = fx.name("g()");
    fx.update(reserved, |d| {
        d.implements = Some(ImplementsAttr {
            protocol: p,
            requirement: written,
        });
    });

    assert!(lookup_value_witnesses(&fx.store, s, &requirement(&fx, req)).is_empty());
}

#[test]
fn defaults_come_from_protocol_extensions() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let req = fx.func(p, "f()", &[], TyId::ERROR);
    let ext = fx.extension(p);
    let default = fx.func(ext, "f()", &[], TyId::ERROR);
    fx.func(ext, "f(x:)", &[], TyId::ERROR);

    assert_eq!(default_candidates(&fx.store, &requirement(&fx, req)), vec![default]);
}

#[test]
fn type_witness_candidates_cover_aliases_nested_types_and_params() {
    let mut fx = Fixture::new();
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let p = fx.protocol("P");
    let element = fx.assoc_type(p, "Element", None);
    let index = fx.assoc_type(p, "Index", None);
    let wrapped = fx.assoc_type(p, "Wrapped", None);

    let s = fx.structure("S");
    let alias = fx.typealias(s, "Element", int_ty);
    let nested = fx.nominal("Index", quill_ir::NominalKind::Struct);
    fx.update(nested, |d| d.parent = Some(s));
    if let DeclKind::Nominal(n) = &mut fx.store.decl_mut(s).kind {
        n.members.push(nested);
    }
    let sig = fx.generics(s, 0, &["Wrapped"], |_| Vec::new());
    let wrapped_ty = fx
        .types()
        .generic_param(fx.store.generic_signature(sig).params[0].key);

    let candidates = |assoc| type_witness_candidates(&fx.store, s, &requirement(&fx, assoc));
    assert_eq!(candidates(element), vec![(alias, int_ty)]);
    assert_eq!(candidates(index), vec![(nested, fx.ty(nested))]);
    assert_eq!(candidates(wrapped), vec![(s, wrapped_ty)]);
}

#[test]
fn inheritance_is_transitive() {
    let mut fx = Fixture::new();
    let a = fx.protocol("A");
    let b = fx.protocol("B");
    let c = fx.protocol("C");
    fx.inherit(b, a);
    fx.inherit(c, b);

    assert!(protocol_inherits(&fx.store, c, a));
    assert!(protocol_inherits(&fx.store, a, a));
    assert!(!protocol_inherits(&fx.store, a, c));
}

#[test]
fn declared_conformance_includes_extensions_and_refinements() {
    let mut fx = Fixture::new();
    let equatable = fx.protocol("Equatable");
    let comparable = fx.protocol("Comparable");
    fx.inherit(comparable, equatable);
    let s = fx.structure("S");
    let ext = fx.extension(s);
    fx.conform(ext, comparable);
    let ty = fx.ty(s);

    assert!(declares_conformance(&fx.store, ty, comparable));
    assert!(declares_conformance(&fx.store, ty, equatable));
    assert!(!declares_conformance(&fx.store, fx.optional(ty), equatable));
}

#[test]
fn witnessed_requirements_by_name() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let q = fx.protocol("Q");
    fx.inherit(q, p);
    let p_f = fx.func(p, "f()", &[], TyId::ERROR);
    let q_f = fx.func(q, "f()", &[], TyId::ERROR);
    fx.func(q, "g()", &[], TyId::ERROR);
    let s = fx.structure("S");
    fx.conform(s, q);
    let witness = fx.func(s, "f()", &[], TyId::ERROR);

    assert_eq!(find_witnessed_requirements(&fx.store, witness, false), vec![q_f, p_f]);
    assert_eq!(find_witnessed_requirements(&fx.store, witness, true), vec![q_f]);
}

#[test]
fn witnessed_requirements_skip_non_members() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");
    let alias = fx.typealias(s, "f", TyId::ERROR);
    assert!(find_witnessed_requirements(&fx.store, alias, false).is_empty());
}
