//! Generic signatures.

use std::fmt;

use crate::{DeclId, Name, TyId};

/// Generic signature identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct GenericSigId(u32);

impl GenericSigId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        GenericSigId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for GenericSigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericSigId({})", self.0)
    }
}

/// Position of a generic parameter: nesting depth and index at that depth.
///
/// A method's own parameters sit one level deeper than its type's.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericParamKey {
    pub depth: u16,
    pub index: u16,
}

impl GenericParamKey {
    pub const fn new(depth: u16, index: u16) -> Self {
        GenericParamKey { depth, index }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericParamDef {
    pub name: Name,
    pub key: GenericParamKey,
}

/// A `where`-clause entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum GenericRequirement {
    /// `subject: Protocol`
    Conforms { subject: TyId, protocol: DeclId },
    /// `first == second`
    SameType { first: TyId, second: TyId },
}

/// Parameters a declaration introduces and the constraints on them.
///
/// Only the declaration's own parameters are listed; outer parameters are
/// reachable through the enclosing declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericSignature {
    pub params: Vec<GenericParamDef>,
    pub requirements: Vec<GenericRequirement>,
}

impl GenericSignature {
    pub fn param(&self, key: GenericParamKey) -> Option<&GenericParamDef> {
        self.params.iter().find(|p| p.key == key)
    }

    /// Protocols `subject` is directly required to conform to.
    pub fn conformances_of(&self, subject: TyId) -> impl Iterator<Item = DeclId> + '_ {
        self.requirements.iter().filter_map(move |req| match *req {
            GenericRequirement::Conforms { subject: s, protocol } if s == subject => {
                Some(protocol)
            }
            _ => None,
        })
    }
}
