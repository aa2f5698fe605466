use super::*;
use crate::testing::Fixture;
use pretty_assertions::assert_eq;

/// Conforms exactly the listed types and remembers what it was asked.
#[derive(Default)]
struct Oracle {
    conforming: Vec<TyId>,
    asked: Vec<TyId>,
}

impl ConformanceOracle for Oracle {
    fn conforms_to(&mut self, ty: TyId, _protocol: DeclId, _: Option<GenericSigId>) -> bool {
        self.asked.push(ty);
        self.conforming.contains(&ty)
    }
}

fn can_derive(fx: &Fixture, protocol: DeclId, adoptee: DeclId, oracle: &mut Oracle) -> bool {
    StructuralDerivation.can_derive(&fx.store, protocol, adoptee, oracle)
}

#[test]
fn equality_needs_every_member_to_conform() {
    let mut fx = Fixture::new();
    let equatable = fx.derivable_protocol("Equatable", DerivationKind::Equality);
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let view = fx.class("View");
    let view_ty = fx.ty(view);
    let point = fx.structure("Point");
    fx.stored(point, int_ty);
    fx.stored(point, int_ty);

    let mut oracle = Oracle {
        conforming: vec![int_ty],
        ..Oracle::default()
    };
    assert!(can_derive(&fx, equatable, point, &mut oracle));
    assert_eq!(oracle.asked, vec![int_ty, int_ty]);

    fx.stored(point, view_ty);
    assert!(!can_derive(&fx, equatable, point, &mut oracle));
}

#[test]
fn classes_never_derive_equality() {
    let mut fx = Fixture::new();
    let equatable = fx.derivable_protocol("Equatable", DerivationKind::Equality);
    let class = fx.class("C");
    let mut oracle = Oracle::default();
    assert!(!can_derive(&fx, equatable, class, &mut oracle));
    assert!(oracle.asked.is_empty());
}

#[test]
fn plain_protocols_are_not_derivable() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let s = fx.structure("S");
    assert!(!can_derive(&fx, p, s, &mut Oracle::default()));
}

#[test]
fn case_iteration_needs_payload_free_enum() {
    let mut fx = Fixture::new();
    let iterable = fx.derivable_protocol("CaseIterable", DerivationKind::CaseIteration);
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let direction = fx.enumeration("Direction");
    let shape = fx.enumeration("Shape");
    fx.stored(shape, int_ty);

    assert!(can_derive(&fx, iterable, direction, &mut Oracle::default()));
    assert!(!can_derive(&fx, iterable, shape, &mut Oracle::default()));
}

#[test]
fn ordering_is_for_enums() {
    let mut fx = Fixture::new();
    let comparable = fx.derivable_protocol("Comparable", DerivationKind::Ordering);
    let suit = fx.enumeration("Suit");
    let card = fx.structure("Card");
    assert!(can_derive(&fx, comparable, suit, &mut Oracle::default()));
    assert!(!can_derive(&fx, comparable, card, &mut Oracle::default()));
}

#[test]
fn raw_value_fixes_associated_types() {
    let mut fx = Fixture::new();
    let raw = fx.derivable_protocol("RawRepresentable", DerivationKind::RawValue);
    let raw_value = fx.assoc_type(raw, "RawValue", None);
    let int = fx.structure("Int");
    let int_ty = fx.ty(int);
    let color = fx.enumeration("Color");
    let plain = fx.enumeration("Plain");
    if let DeclKind::Nominal(n) = &mut fx.store.decl_mut(color).kind {
        n.raw_type = Some(int_ty);
    }

    assert!(can_derive(&fx, raw, color, &mut Oracle::default()));
    assert!(!can_derive(&fx, raw, plain, &mut Oracle::default()));

    let assoc = ProtocolRequirement::from_decl(&fx.store, raw_value).unwrap();
    assert_eq!(
        StructuralDerivation.derive_type_witness(&fx.store, &assoc, color),
        Some(int_ty)
    );
    assert_eq!(StructuralDerivation.derive_type_witness(&fx.store, &assoc, plain), None);
}

#[test]
fn only_raw_value_derives_type_witnesses() {
    let mut fx = Fixture::new();
    let hashable = fx.derivable_protocol("Hashable", DerivationKind::Hashing);
    let hash_value = fx.assoc_type(hashable, "HashValue", None);
    let s = fx.structure("S");
    let assoc = ProtocolRequirement::from_decl(&fx.store, hash_value).unwrap();
    assert_eq!(StructuralDerivation.derive_type_witness(&fx.store, &assoc, s), None);
}

#[test]
fn synthesized_signature_replaces_self() {
    let mut fx = Fixture::new();
    let equatable = fx.derivable_protocol("Equatable", DerivationKind::Equality);
    let bool_decl = fx.structure("Bool");
    let bool_ty = fx.ty(bool_decl);
    let eq = fx.func(equatable, "==(_:_:)", &[TyId::SELF, TyId::SELF], bool_ty);
    let point = fx.structure("Point");
    let point_ty = fx.ty(point);

    let requirement = ProtocolRequirement::from_decl(&fx.store, eq).unwrap();
    let synthesized = StructuralDerivation
        .synthesize(&fx.store, &requirement, point_ty)
        .unwrap();
    assert_eq!(
        synthesized,
        SynthesizedWitness {
            protocol: equatable,
            requirement: eq,
            adoptee: point_ty,
            signature: Some(fx.func_ty(&[point_ty, point_ty], bool_ty)),
        }
    );
}

#[test]
fn nothing_is_synthesized_for_plain_protocols() {
    let mut fx = Fixture::new();
    let p = fx.protocol("P");
    let f = fx.func(p, "f()", &[], TyId::ERROR);
    let s = fx.structure("S");
    let requirement = ProtocolRequirement::from_decl(&fx.store, f).unwrap();
    assert_eq!(StructuralDerivation.synthesize(&fx.store, &requirement, fx.ty(s)), None);
}
