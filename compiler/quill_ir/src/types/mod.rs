//! Interned types.
//!
//! Every type the checker compares is a `TyId` into a [`TypePool`]. Two
//! structurally equal types always intern to the same id, so identity
//! comparison is structural comparison.

mod fold;
mod pool;

pub use fold::TypeFolder;
pub use pool::TypePool;

use std::fmt;

use bitflags::bitflags;

use crate::{DeclId, GenericParamKey, GenericSigId};

/// Interned type identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TyId(u32);

impl TyId {
    /// Pre-interned error type. Unifies with everything.
    pub const ERROR: TyId = TyId(0);
    /// Pre-interned protocol `Self`.
    pub const SELF: TyId = TyId(1);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        TyId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TyId({})", self.0)
    }
}

bitflags! {
    /// Function-type attributes that take part in witness matching.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct FnFlags: u8 {
        const THROWS = 1 << 0;
        const ASYNC = 1 << 1;
        /// The closure may outlive the call it is passed to.
        const ESCAPING = 1 << 2;
        const SENDABLE = 1 << 3;
    }
}

impl FnFlags {
    /// Flags that change the calling convention; witnesses may not add them.
    pub const EFFECTS: FnFlags = FnFlags::THROWS.union(FnFlags::ASYNC);
}

/// Function signature: parameters, result and effects.
///
/// Initializer signatures use the same shape; their result is ignored
/// during matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionType {
    pub params: Box<[TyId]>,
    pub result: TyId,
    pub flags: FnFlags,
}

/// An opened generic parameter of a requirement or witness signature.
///
/// Placeholders are keyed by their originating signature, so opening the
/// same signature twice yields the same placeholders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaceholderId {
    pub sig: GenericSigId,
    pub index: u16,
}

/// Type structure stored in the pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeData {
    /// Result of an earlier failure.
    Error,
    /// The protocol's `Self`.
    SelfType,
    /// A struct, enum, class or actor, possibly applied to generic arguments.
    Nominal { decl: DeclId, args: Box<[TyId]> },
    Optional(TyId),
    Tuple(Box<[TyId]>),
    Function(FunctionType),
    /// A generic parameter of some signature, by position.
    GenericParam(GenericParamKey),
    /// `base.Assoc`, e.g. `Self.Element`.
    DependentMember { base: TyId, assoc: DeclId },
    /// Covariant `Self` of a non-final class.
    DynamicSelf(DeclId),
    Placeholder(PlaceholderId),
    /// An associated type whose witness is not known yet.
    OpenAssoc(DeclId),
}

impl TypeData {
    /// Call `f` on each directly nested type.
    pub fn for_each_child(&self, mut f: impl FnMut(TyId)) {
        match self {
            TypeData::Nominal { args, .. } => args.iter().copied().for_each(f),
            TypeData::Tuple(elems) => elems.iter().copied().for_each(f),
            TypeData::Optional(inner) => f(*inner),
            TypeData::Function(func) => {
                func.params.iter().copied().for_each(&mut f);
                f(func.result);
            }
            TypeData::DependentMember { base, .. } => f(*base),
            TypeData::Error
            | TypeData::SelfType
            | TypeData::GenericParam(_)
            | TypeData::DynamicSelf(_)
            | TypeData::Placeholder(_)
            | TypeData::OpenAssoc(_) => {}
        }
    }
}
