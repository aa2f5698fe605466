//! Protocol requirements.
//!
//! A requirement is a member of a protocol that adopters must witness.
//! `RequirementKind` is closed: every match over it is exhaustive, so a new
//! kind cannot slip past the matcher or the policy checks.

use quill_ir::{
    DeclFlags, DeclGraph, DeclId, DeclKind, DeclName, GenericSigId, Span, TyId, TypeData,
};

use crate::lookup::default_candidates;

/// The kinds of protocol requirement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Method,
    Property,
    Subscript,
    Initializer,
    AssociatedType,
}

impl RequirementKind {
    /// Requirement kind of a protocol member, `None` for members that are
    /// not requirements (type aliases, nested types).
    pub fn of(kind: &DeclKind) -> Option<Self> {
        match kind {
            DeclKind::Func(_) => Some(RequirementKind::Method),
            DeclKind::Var(_) => Some(RequirementKind::Property),
            DeclKind::Subscript(_) => Some(RequirementKind::Subscript),
            DeclKind::Init(_) => Some(RequirementKind::Initializer),
            DeclKind::AssocType(_) => Some(RequirementKind::AssociatedType),
            DeclKind::TypeAlias(_)
            | DeclKind::Nominal(_)
            | DeclKind::Protocol(_)
            | DeclKind::Extension(_) => None,
        }
    }

    pub fn is_value(self) -> bool {
        !matches!(self, RequirementKind::AssociatedType)
    }

    /// Whether a declaration of kind `kind` can witness this requirement.
    pub fn accepts(self, kind: &DeclKind) -> bool {
        matches!(
            (self, kind),
            (RequirementKind::Method, DeclKind::Func(_))
                | (RequirementKind::Property, DeclKind::Var(_))
                | (RequirementKind::Subscript, DeclKind::Subscript(_))
                | (RequirementKind::Initializer, DeclKind::Init(_))
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            RequirementKind::Method => "method",
            RequirementKind::Property => "property",
            RequirementKind::Subscript => "subscript",
            RequirementKind::Initializer => "initializer",
            RequirementKind::AssociatedType => "associated type",
        }
    }
}

/// A requirement of a protocol, snapshotted from its declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolRequirement {
    pub decl: DeclId,
    pub protocol: DeclId,
    pub name: DeclName,
    pub kind: RequirementKind,
    /// Declared signature; the property type for properties, `None` for
    /// associated types.
    pub signature: Option<TyId>,
    /// The requirement's own generic signature.
    pub generics: Option<GenericSigId>,
    pub is_static: bool,
    pub is_optional: bool,
    /// A protocol extension (or the associated type itself) supplies a
    /// default.
    pub has_default: bool,
    /// Property or subscript requires a setter.
    pub settable: bool,
    /// Initializer may fail.
    pub failable: bool,
    pub span: Span,
}

impl ProtocolRequirement {
    /// Snapshot the requirement declared by `decl`, if it is one.
    pub fn from_decl(graph: &dyn DeclGraph, decl: DeclId) -> Option<Self> {
        let d = graph.decl(decl);
        let kind = RequirementKind::of(&d.kind)?;
        let protocol = d.parent?;
        if !matches!(graph.decl(protocol).kind, DeclKind::Protocol(_)) {
            return None;
        }
        let (signature, settable, failable) = match &d.kind {
            DeclKind::Func(f) => (Some(f.signature), false, false),
            DeclKind::Var(v) => (Some(v.ty), v.settable, false),
            DeclKind::Subscript(s) => (Some(s.signature), s.settable, false),
            DeclKind::Init(i) => (Some(i.signature), false, i.failable),
            _ => (None, false, false),
        };
        let mut req = ProtocolRequirement {
            decl,
            protocol,
            name: d.name.clone(),
            kind,
            signature,
            generics: d.kind.generics(),
            is_static: d.is_static(),
            is_optional: d.flags.contains(DeclFlags::OPTIONAL),
            has_default: false,
            settable,
            failable,
            span: d.span,
        };
        req.has_default = match &d.kind {
            DeclKind::AssocType(_) => {
                crate::checker::find_defaulted_associated_type(graph, protocol, decl).is_some()
            }
            _ => !default_candidates(graph, &req).is_empty(),
        };
        Some(req)
    }

    pub fn is_associated_type(&self) -> bool {
        self.kind == RequirementKind::AssociatedType
    }
}

/// Requirements of `protocol` in declaration order.
pub fn collect_requirements(graph: &dyn DeclGraph, protocol: DeclId) -> Vec<ProtocolRequirement> {
    graph
        .decl(protocol)
        .kind
        .members()
        .iter()
        .filter_map(|&m| ProtocolRequirement::from_decl(graph, m))
        .collect()
}

/// Associated types of the requirement's own protocol that its signature
/// mentions as `Self.A`, in order of first appearance.
pub(crate) fn referenced_associated_types(
    graph: &dyn DeclGraph,
    req: &ProtocolRequirement,
) -> Vec<DeclId> {
    let Some(signature) = req.signature else {
        return Vec::new();
    };
    let pool = graph.types();
    let mut found = Vec::new();
    pool.any(signature, &mut |_: TyId, data: &TypeData| {
        if let TypeData::DependentMember { base, assoc } = *data {
            if base == TyId::SELF
                && graph.decl(assoc).parent == Some(req.protocol)
                && !found.contains(&assoc)
            {
                found.push(assoc);
            }
        }
        false
    });
    found
}

/// How a requirement's signature uses `Self`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelfUse {
    None,
    /// Only as the result (or optional result), which a subclass can
    /// satisfy by returning its own type.
    CovariantResult,
    /// Nested inside another type, or in a settable property or
    /// subscript. Bare `Self` parameters are not counted: a subclass
    /// inherits a witness that takes the base class.
    Invariant,
}

pub(crate) fn self_use(graph: &dyn DeclGraph, req: &ProtocolRequirement) -> SelfUse {
    let Some(signature) = req.signature else {
        return SelfUse::None;
    };
    let pool = graph.types();
    let mentions_self = |ty: TyId| pool.any(ty, &mut |id: TyId, _: &TypeData| id == TyId::SELF);
    let is_bare_self = |ty: TyId| {
        ty == TyId::SELF || pool.optional_payload(ty) == Some(TyId::SELF)
    };

    if req.kind == RequirementKind::Property {
        return if !mentions_self(signature) {
            SelfUse::None
        } else if is_bare_self(signature) && !req.settable {
            SelfUse::CovariantResult
        } else {
            SelfUse::Invariant
        };
    }

    let Some(func) = pool.as_function(signature) else {
        return SelfUse::None;
    };
    if func.params.iter().any(|&p| mentions_self(p) && !is_bare_self(p)) {
        return SelfUse::Invariant;
    }
    // Initializers produce `Self` by construction
    if req.kind == RequirementKind::Initializer || !mentions_self(func.result) {
        return SelfUse::None;
    }
    if is_bare_self(func.result) && !(req.kind == RequirementKind::Subscript && req.settable) {
        SelfUse::CovariantResult
    } else {
        SelfUse::Invariant
    }
}
