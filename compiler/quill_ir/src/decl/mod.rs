//! Declaration model.
//!
//! Declarations are stored flat in a [`DeclStore`](crate::DeclStore) and
//! refer to each other by `DeclId`. Containers (nominals, protocols,
//! extensions) list their members in declaration order, which is the
//! order every deterministic walk in the checker follows.

mod generics;
mod version;

pub use generics::{
    GenericParamDef, GenericParamKey, GenericRequirement, GenericSigId, GenericSignature,
};
pub use version::{Version, VersionParseError};

use std::fmt;

use bitflags::bitflags;

use crate::{Name, Span, StringInterner, TyId};

/// Declaration identifier, allocated in declaration order.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct DeclId(u32);

impl DeclId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        DeclId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclId({})", self.0)
    }
}

/// Full declaration name: base name plus argument labels.
///
/// `labels` is `None` for names that take no argument list (properties,
/// associated types); an unlabeled argument is [`Name::EMPTY`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclName {
    pub base: Name,
    pub labels: Option<Box<[Name]>>,
}

impl DeclName {
    pub fn simple(base: Name) -> Self {
        DeclName { base, labels: None }
    }

    pub fn compound(base: Name, labels: impl Into<Box<[Name]>>) -> Self {
        DeclName {
            base,
            labels: Some(labels.into()),
        }
    }

    /// Parse `f`, `f(x:y:)`, `f(_:)` or `init(rawValue:)`.
    ///
    /// Malformed input is taken as a simple name.
    pub fn parse(interner: &StringInterner, text: &str) -> Self {
        let Some((base, rest)) = text.split_once('(') else {
            return DeclName::simple(interner.intern(text));
        };
        let Some(inner) = rest.strip_suffix(')') else {
            return DeclName::simple(interner.intern(text));
        };
        let labels: Vec<Name> = inner
            .split_terminator(':')
            .map(|label| match label {
                "_" => Name::EMPTY,
                label => interner.intern(label),
            })
            .collect();
        DeclName::compound(interner.intern(base), labels)
    }

    /// Render as source text, e.g. `f(x:_:)`.
    pub fn display(&self, interner: &StringInterner) -> String {
        let mut out = interner.lookup(self.base).to_owned();
        if let Some(labels) = &self.labels {
            out.push('(');
            for &label in labels.iter() {
                if label.is_empty() {
                    out.push('_');
                } else {
                    out.push_str(interner.lookup(label));
                }
                out.push(':');
            }
            out.push(')');
        }
        out
    }
}

/// Access levels, ordered from most to least restrictive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessLevel {
    Private,
    FilePrivate,
    #[default]
    Internal,
    Package,
    Public,
    Open,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Private => "private",
            AccessLevel::FilePrivate => "fileprivate",
            AccessLevel::Internal => "internal",
            AccessLevel::Package => "package",
            AccessLevel::Public => "public",
            AccessLevel::Open => "open",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform availability of a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Availability {
    /// First version the declaration exists in; `None` means always.
    pub introduced: Option<Version>,
    pub unavailable: bool,
}

impl Availability {
    pub fn introduced(version: Version) -> Self {
        Availability {
            introduced: Some(version),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Availability {
            introduced: None,
            unavailable: true,
        }
    }
}

/// Concurrency domain a declaration runs in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Isolation {
    #[default]
    Nonisolated,
    /// Isolated to the instance of the given actor.
    ActorInstance(DeclId),
    /// Isolated to a named global actor.
    GlobalActor(Name),
}

bitflags! {
    /// Declaration modifiers.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct DeclFlags: u8 {
        const STATIC = 1 << 0;
        /// Optional protocol requirement.
        const OPTIONAL = 1 << 1;
        const FINAL = 1 << 2;
        /// `required` initializer.
        const REQUIRED = 1 << 3;
    }
}

/// `implements(Protocol, requirement)` attribute: this declaration
/// witnesses the named requirement regardless of its own name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ImplementsAttr {
    pub protocol: DeclId,
    pub requirement: DeclName,
}

/// Behaviors the compiler can synthesize for a protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum DerivationKind {
    /// Memberwise equality.
    Equality,
    /// Memberwise hashing.
    Hashing,
    /// Case-order comparison for enums.
    Ordering,
    /// Listing all cases of a payload-free enum.
    CaseIteration,
    /// Conversion to and from an enum's raw type.
    RawValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FuncDecl {
    /// A `TypeData::Function`.
    pub signature: TyId,
    pub generics: Option<GenericSigId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct VarDecl {
    pub ty: TyId,
    pub settable: bool,
    /// Narrower access for the setter, e.g. `private(set)`.
    pub setter_access: Option<AccessLevel>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriptDecl {
    /// A `TypeData::Function` from indices to element type.
    pub signature: TyId,
    pub generics: Option<GenericSigId>,
    pub settable: bool,
    pub setter_access: Option<AccessLevel>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct InitDecl {
    /// A `TypeData::Function`; only params and effects are meaningful.
    pub signature: TyId,
    pub generics: Option<GenericSigId>,
    pub failable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct AssocTypeDecl {
    /// Protocols the witness must conform to.
    pub bounds: Vec<DeclId>,
    pub default: Option<TyId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeAliasDecl {
    pub underlying: TyId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum NominalKind {
    Struct,
    Enum,
    Class,
    Actor,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct NominalDecl {
    pub kind: NominalKind,
    pub generics: Option<GenericSigId>,
    pub members: Vec<DeclId>,
    /// Stored property types (structs, classes) or case payload types (enums).
    pub stored: Vec<TyId>,
    /// Enum raw type, e.g. `enum Color: Int`.
    pub raw_type: Option<TyId>,
    /// Protocols named in the declaration's inheritance clause.
    pub conformances: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolDecl {
    pub members: Vec<DeclId>,
    pub inherited: Vec<DeclId>,
    /// Constraints on `Self` and its associated types.
    pub where_clause: Vec<GenericRequirement>,
    pub derivation: Option<DerivationKind>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionDecl {
    /// The extended nominal or protocol.
    pub extended: DeclId,
    pub members: Vec<DeclId>,
    pub conformances: Vec<DeclId>,
    pub where_clause: Vec<GenericRequirement>,
}

/// What a declaration is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclKind {
    Func(FuncDecl),
    Var(VarDecl),
    Subscript(SubscriptDecl),
    Init(InitDecl),
    AssocType(AssocTypeDecl),
    TypeAlias(TypeAliasDecl),
    Nominal(NominalDecl),
    Protocol(ProtocolDecl),
    Extension(ExtensionDecl),
}

impl DeclKind {
    /// Members of a container declaration, empty for everything else.
    pub fn members(&self) -> &[DeclId] {
        match self {
            DeclKind::Nominal(n) => &n.members,
            DeclKind::Protocol(p) => &p.members,
            DeclKind::Extension(e) => &e.members,
            _ => &[],
        }
    }

    /// Own generic signature of a member or nominal.
    pub fn generics(&self) -> Option<GenericSigId> {
        match self {
            DeclKind::Func(f) => f.generics,
            DeclKind::Subscript(s) => s.generics,
            DeclKind::Init(i) => i.generics,
            DeclKind::Nominal(n) => n.generics,
            _ => None,
        }
    }

    /// Whether the declaration can witness a value requirement.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            DeclKind::Func(_) | DeclKind::Var(_) | DeclKind::Subscript(_) | DeclKind::Init(_)
        )
    }
}

/// A declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Decl {
    pub name: DeclName,
    pub kind: DeclKind,
    /// Enclosing nominal, protocol or extension.
    pub parent: Option<DeclId>,
    pub access: AccessLevel,
    pub availability: Availability,
    /// `None` inherits the isolation of the enclosing type.
    pub isolation: Option<Isolation>,
    pub flags: DeclFlags,
    pub implements: Option<ImplementsAttr>,
    pub span: Span,
}

impl Decl {
    /// A declaration with default modifiers: internal, always available,
    /// inheriting isolation, no flags.
    pub fn new(name: DeclName, kind: DeclKind) -> Self {
        Decl {
            name,
            kind,
            parent: None,
            access: AccessLevel::Internal,
            availability: Availability::default(),
            isolation: None,
            flags: DeclFlags::empty(),
            implements: None,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: DeclId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    #[must_use]
    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: DeclFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_implements(mut self, attr: ImplementsAttr) -> Self {
        self.implements = Some(attr);
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags.contains(DeclFlags::STATIC)
    }
}

#[cfg(test)]
mod tests;
