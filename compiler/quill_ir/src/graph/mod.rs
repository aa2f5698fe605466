//! Declaration graph.
//!
//! The checker consumes declarations through [`DeclGraph`]; [`DeclStore`]
//! is the in-memory implementation front ends and tests populate.

use rustc_hash::FxHashMap;

use crate::{
    AccessLevel, Availability, Decl, DeclId, DeclKind, GenericSigId, GenericSignature,
    Isolation, Name, NominalKind, StringInterner, TypePool,
};

/// Read-only view of the declarations of a program.
///
/// Ids handed to these methods always come from the same graph; an id
/// from elsewhere is an invariant violation and may panic.
pub trait DeclGraph {
    fn interner(&self) -> &StringInterner;

    fn types(&self) -> &TypePool;

    fn decl(&self, id: DeclId) -> &Decl;

    /// Extensions of a nominal or protocol, in declaration order.
    fn extensions_of(&self, extended: DeclId) -> &[DeclId];

    fn generic_signature(&self, id: GenericSigId) -> &GenericSignature;

    /// Members of `context` and its extensions whose base name is `name`,
    /// in declaration order.
    fn lookup_members(&self, context: DeclId, name: Name) -> Vec<DeclId> {
        self.members_of(context)
            .into_iter()
            .filter(|&m| self.decl(m).name.base == name)
            .collect()
    }

    /// Members of `context` followed by the members of each extension.
    fn members_of(&self, context: DeclId) -> Vec<DeclId> {
        let mut members = self.decl(context).kind.members().to_vec();
        for &ext in self.extensions_of(context) {
            members.extend_from_slice(self.decl(ext).kind.members());
        }
        members
    }

    fn access_level(&self, id: DeclId) -> AccessLevel {
        self.decl(id).access
    }

    fn availability(&self, id: DeclId) -> &Availability {
        &self.decl(id).availability
    }

    /// Effective isolation: explicit isolation, else the enclosing type's.
    ///
    /// Members of an actor are isolated to the actor instance.
    fn isolation(&self, id: DeclId) -> Isolation {
        let decl = self.decl(id);
        if let Some(isolation) = decl.isolation {
            return isolation;
        }
        if let DeclKind::Nominal(nominal) = &decl.kind {
            return match nominal.kind {
                NominalKind::Actor => Isolation::ActorInstance(id),
                _ => Isolation::Nonisolated,
            };
        }
        match decl.parent {
            Some(parent) => {
                let parent = self.nominal_of(parent).unwrap_or(parent);
                self.isolation(parent)
            }
            None => Isolation::Nonisolated,
        }
    }

    /// The nominal a member context stands for: the nominal itself, or
    /// the extended declaration of an extension.
    fn nominal_of(&self, context: DeclId) -> Option<DeclId> {
        match &self.decl(context).kind {
            DeclKind::Nominal(_) | DeclKind::Protocol(_) => Some(context),
            DeclKind::Extension(ext) => Some(ext.extended),
            _ => None,
        }
    }

    /// Protocols a nominal declares conformance to, directly or in an
    /// extension, in declaration order.
    fn declared_conformances(&self, nominal: DeclId) -> Vec<DeclId> {
        let mut protocols = match &self.decl(nominal).kind {
            DeclKind::Nominal(n) => n.conformances.clone(),
            _ => Vec::new(),
        };
        for &ext in self.extensions_of(nominal) {
            if let DeclKind::Extension(e) = &self.decl(ext).kind {
                protocols.extend_from_slice(&e.conformances);
            }
        }
        protocols
    }
}

/// In-memory declaration graph.
pub struct DeclStore {
    interner: StringInterner,
    types: TypePool,
    decls: Vec<Decl>,
    signatures: Vec<GenericSignature>,
    /// Extended declaration → its extensions.
    extensions: FxHashMap<DeclId, Vec<DeclId>>,
}

impl DeclStore {
    pub fn new() -> Self {
        DeclStore {
            interner: StringInterner::new(),
            types: TypePool::new(),
            decls: Vec::new(),
            signatures: Vec::new(),
            extensions: FxHashMap::default(),
        }
    }

    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Register a declaration.
    ///
    /// The declaration is appended to its parent's member list, and an
    /// extension is indexed under the declaration it extends.
    ///
    /// # Panics
    /// Panics if the parent is not a nominal, protocol or extension, or if
    /// the store exceeds `u32::MAX` declarations.
    pub fn add(&mut self, decl: Decl) -> DeclId {
        let Ok(raw) = u32::try_from(self.decls.len()) else {
            panic!("declaration store exceeded u32::MAX declarations");
        };
        let id = DeclId::from_raw(raw);
        let parent = decl.parent;
        if let DeclKind::Extension(ext) = &decl.kind {
            self.extensions.entry(ext.extended).or_default().push(id);
        }
        self.decls.push(decl);

        if let Some(parent) = parent {
            match &mut self.decl_mut(parent).kind {
                DeclKind::Nominal(n) => n.members.push(id),
                DeclKind::Protocol(p) => p.members.push(id),
                DeclKind::Extension(e) => e.members.push(id),
                other => panic!("{parent:?} cannot contain members: {other:?}"),
            }
        }
        id
    }

    pub fn add_generic_signature(&mut self, signature: GenericSignature) -> GenericSigId {
        let Ok(raw) = u32::try_from(self.signatures.len()) else {
            panic!("declaration store exceeded u32::MAX generic signatures");
        };
        self.signatures.push(signature);
        GenericSigId::from_raw(raw)
    }

    /// Mutable access for building; the graph is immutable once checking
    /// starts.
    ///
    /// # Panics
    /// Panics if `id` was not allocated by this store.
    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        let len = self.decls.len();
        match self.decls.get_mut(id.index()) {
            Some(decl) => decl,
            None => panic!("{id:?} out of range ({len} declarations)"),
        }
    }

    /// Record that `context` (a nominal or extension) declares conformance
    /// to `protocol`.
    ///
    /// # Panics
    /// Panics if `context` is neither a nominal nor an extension.
    pub fn declare_conformance(&mut self, context: DeclId, protocol: DeclId) {
        match &mut self.decl_mut(context).kind {
            DeclKind::Nominal(n) => n.conformances.push(protocol),
            DeclKind::Extension(e) => e.conformances.push(protocol),
            other => panic!("{context:?} cannot declare conformances: {other:?}"),
        }
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

impl Default for DeclStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclGraph for DeclStore {
    fn interner(&self) -> &StringInterner {
        &self.interner
    }

    fn types(&self) -> &TypePool {
        &self.types
    }

    fn decl(&self, id: DeclId) -> &Decl {
        match self.decls.get(id.index()) {
            Some(decl) => decl,
            None => panic!("{id:?} out of range ({} declarations)", self.decls.len()),
        }
    }

    fn extensions_of(&self, extended: DeclId) -> &[DeclId] {
        self.extensions.get(&extended).map_or(&[][..], Vec::as_slice)
    }

    fn generic_signature(&self, id: GenericSigId) -> &GenericSignature {
        match self.signatures.get(id.raw() as usize) {
            Some(sig) => sig,
            None => panic!("{id:?} out of range"),
        }
    }
}

#[cfg(test)]
mod tests;
