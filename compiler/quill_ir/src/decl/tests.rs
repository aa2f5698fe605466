use super::*;
use pretty_assertions::assert_eq;

#[test]
fn parse_compound_name() {
    let interner = StringInterner::new();
    let name = DeclName::parse(&interner, "f(x:_:)");
    assert_eq!(interner.lookup(name.base), "f");
    let labels = name.labels.clone().unwrap_or_default();
    assert_eq!(labels.len(), 2);
    assert_eq!(interner.lookup(labels[0]), "x");
    assert!(labels[1].is_empty());
    assert_eq!(name.display(&interner), "f(x:_:)");
}

#[test]
fn parse_simple_and_empty_argument_list() {
    let interner = StringInterner::new();
    let simple = DeclName::parse(&interner, "count");
    assert_eq!(simple.labels, None);
    assert_eq!(simple.display(&interner), "count");

    let nullary = DeclName::parse(&interner, "reset()");
    assert_eq!(nullary.labels.as_deref(), Some(&[][..]));
    assert_eq!(nullary.display(&interner), "reset()");
}

#[test]
fn labels_distinguish_names() {
    let interner = StringInterner::new();
    let a = DeclName::parse(&interner, "f(x:)");
    let b = DeclName::parse(&interner, "f(y:)");
    assert_ne!(a, b);
    assert_eq!(a.base, b.base);
}

#[test]
fn access_levels_are_ordered() {
    assert!(AccessLevel::Private < AccessLevel::FilePrivate);
    assert!(AccessLevel::Internal < AccessLevel::Public);
    assert!(AccessLevel::Public < AccessLevel::Open);
    assert_eq!(AccessLevel::default(), AccessLevel::Internal);
}

#[test]
fn version_parsing() {
    assert_eq!("1.2.3".parse::<Version>(), Ok(Version::new(1, 2, 3)));
    assert_eq!("10.4".parse::<Version>(), Ok(Version::new(10, 4, 0)));
    assert_eq!("7".parse::<Version>(), Ok(Version::new(7, 0, 0)));
    assert_eq!("".parse::<Version>(), Err(VersionParseError::Empty));
    assert_eq!(
        "1.2.3.4".parse::<Version>(),
        Err(VersionParseError::TooManyComponents(4))
    );
    assert_eq!(
        "1.x".parse::<Version>(),
        Err(VersionParseError::InvalidComponent("x".to_owned()))
    );
}

#[test]
fn version_ordering() {
    assert!(Version::new(1, 10, 0) > Version::new(1, 9, 9));
    assert!(Version::ZERO < Version::new(0, 0, 1));
}

#[test]
fn builder_sets_modifiers() {
    let interner = StringInterner::new();
    let decl = Decl::new(
        DeclName::parse(&interner, "make()"),
        DeclKind::TypeAlias(TypeAliasDecl {
            underlying: TyId::ERROR,
        }),
    )
    .with_access(AccessLevel::Public)
    .with_flags(DeclFlags::STATIC);
    assert!(decl.is_static());
    assert_eq!(decl.access, AccessLevel::Public);
    assert_eq!(decl.isolation, None);
}
