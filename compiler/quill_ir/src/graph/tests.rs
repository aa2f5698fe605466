use super::*;
use crate::{DeclName, ExtensionDecl, FnFlags, FuncDecl, NominalDecl, ProtocolDecl, TyId, VarDecl};
use pretty_assertions::assert_eq;

fn nominal(kind: NominalKind) -> DeclKind {
    DeclKind::Nominal(NominalDecl {
        kind,
        generics: None,
        members: Vec::new(),
        stored: Vec::new(),
        raw_type: None,
        conformances: Vec::new(),
    })
}

fn add_func(store: &mut DeclStore, parent: DeclId, name: &str) -> DeclId {
    let signature = store
        .types()
        .function(Vec::new(), TyId::ERROR, FnFlags::empty());
    let name = DeclName::parse(store.interner(), name);
    store.add(
        Decl::new(
            name,
            DeclKind::Func(FuncDecl {
                signature,
                generics: None,
            }),
        )
        .with_parent(parent),
    )
}

#[test]
fn members_include_extensions_in_order() {
    let mut store = DeclStore::new();
    let s = store.intern("S");
    let point = store.add(Decl::new(DeclName::simple(s), nominal(NominalKind::Struct)));
    let a = add_func(&mut store, point, "f(x:)");
    let ext = store.add(Decl::new(
        DeclName::simple(Name::EMPTY),
        DeclKind::Extension(ExtensionDecl {
            extended: point,
            members: Vec::new(),
            conformances: Vec::new(),
            where_clause: Vec::new(),
        }),
    ));
    let b = add_func(&mut store, ext, "f(y:)");
    let c = add_func(&mut store, point, "g()");

    assert_eq!(store.extensions_of(point), &[ext]);
    assert_eq!(store.members_of(point), vec![a, c, b]);
    let f = store.intern("f");
    assert_eq!(store.lookup_members(point, f), vec![a, b]);
}

#[test]
fn actor_members_inherit_isolation() {
    let mut store = DeclStore::new();
    let name = store.intern("Counter");
    let actor = store.add(Decl::new(DeclName::simple(name), nominal(NominalKind::Actor)));
    let method = add_func(&mut store, actor, "increment()");
    let value = store.intern("value");
    let property = store.add(
        Decl::new(
            DeclName::simple(value),
            DeclKind::Var(VarDecl {
                ty: TyId::ERROR,
                settable: true,
                setter_access: None,
            }),
        )
        .with_parent(actor)
        .with_isolation(Isolation::Nonisolated),
    );

    assert_eq!(store.isolation(method), Isolation::ActorInstance(actor));
    assert_eq!(store.isolation(property), Isolation::Nonisolated);
}

#[test]
fn declared_conformances_collect_extensions() {
    let mut store = DeclStore::new();
    let s = store.intern("S");
    let point = store.add(Decl::new(DeclName::simple(s), nominal(NominalKind::Struct)));
    let p = store.intern("P");
    let proto = store.add(Decl::new(
        DeclName::simple(p),
        DeclKind::Protocol(ProtocolDecl::default()),
    ));
    let q = store.intern("Q");
    let other = store.add(Decl::new(
        DeclName::simple(q),
        DeclKind::Protocol(ProtocolDecl::default()),
    ));
    let ext = store.add(Decl::new(
        DeclName::simple(Name::EMPTY),
        DeclKind::Extension(ExtensionDecl {
            extended: point,
            members: Vec::new(),
            conformances: Vec::new(),
            where_clause: Vec::new(),
        }),
    ));
    store.declare_conformance(point, proto);
    store.declare_conformance(ext, other);
    assert_eq!(store.declared_conformances(point), vec![proto, other]);
    assert_eq!(store.nominal_of(ext), Some(point));
}
