//! First-order unification over interned types.
//!
//! Variables are placeholders (opened generic parameters) and open
//! associated types. Everything else must agree structurally, except that
//! nested function types ignore escaping and sendable attributes.

use quill_ir::{FnFlags, TyId, TypeData, TypeFolder, TypePool};
use rustc_hash::FxHashMap;

pub(super) struct Unifier<'a> {
    pool: &'a TypePool,
    bindings: FxHashMap<TyId, TyId>,
}

impl<'a> Unifier<'a> {
    pub(super) fn new(pool: &'a TypePool) -> Self {
        Unifier {
            pool,
            bindings: FxHashMap::default(),
        }
    }

    /// Unify, undoing any partial bindings on failure.
    pub(super) fn try_unify(&mut self, a: TyId, b: TyId) -> bool {
        let snapshot = self.bindings.clone();
        if self.unify(a, b) {
            true
        } else {
            self.bindings = snapshot;
            false
        }
    }

    /// `ty` with every bound variable replaced, transitively.
    pub(super) fn apply(&self, ty: TyId) -> TyId {
        if self.bindings.is_empty() {
            return ty;
        }
        ApplyBindings { unifier: self }.fold(ty)
    }

    /// What a variable ended up bound to, if anything.
    pub(super) fn binding_of(&self, var: TyId) -> Option<TyId> {
        let resolved = self.resolve(var);
        (resolved != var).then(|| self.apply(resolved))
    }

    fn resolve(&self, mut ty: TyId) -> TyId {
        while let Some(&next) = self.bindings.get(&ty) {
            ty = next;
        }
        ty
    }

    fn unify(&mut self, a: TyId, b: TyId) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a == b {
            return true;
        }
        let (da, db) = (self.pool.get(a), self.pool.get(b));
        match (&da, &db) {
            (TypeData::Error, _) | (_, TypeData::Error) => true,
            (TypeData::Placeholder(_) | TypeData::OpenAssoc(_), _) => self.bind(a, b),
            (_, TypeData::Placeholder(_) | TypeData::OpenAssoc(_)) => self.bind(b, a),
            (TypeData::DynamicSelf(class), TypeData::Nominal { decl, .. })
            | (TypeData::Nominal { decl, .. }, TypeData::DynamicSelf(class)) => class == decl,
            (
                TypeData::Nominal { decl: d1, args: a1 },
                TypeData::Nominal { decl: d2, args: a2 },
            ) => d1 == d2 && self.unify_all(a1, a2),
            (TypeData::Optional(x), TypeData::Optional(y)) => self.unify(*x, *y),
            (TypeData::Tuple(x), TypeData::Tuple(y)) => self.unify_all(x, y),
            (TypeData::Function(f), TypeData::Function(g)) => {
                (f.flags & FnFlags::EFFECTS) == (g.flags & FnFlags::EFFECTS)
                    && self.unify_all(&f.params, &g.params)
                    && self.unify(f.result, g.result)
            }
            (
                TypeData::DependentMember { base: b1, assoc: x1 },
                TypeData::DependentMember { base: b2, assoc: x2 },
            ) => x1 == x2 && self.unify(*b1, *b2),
            _ => false,
        }
    }

    fn unify_all(&mut self, a: &[TyId], b: &[TyId]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| self.unify(x, y))
    }

    fn bind(&mut self, var: TyId, ty: TyId) -> bool {
        let ty = self.apply(ty);
        if self
            .pool
            .any(ty, &mut |id: TyId, _: &TypeData| id == var)
        {
            return false;
        }
        self.bindings.insert(var, ty);
        true
    }
}

struct ApplyBindings<'u, 'a> {
    unifier: &'u Unifier<'a>,
}

impl ApplyBindings<'_, '_> {
    fn substitute(&mut self, id: TyId) -> TyId {
        let resolved = self.unifier.resolve(id);
        if resolved == id {
            id
        } else {
            self.fold(resolved)
        }
    }
}

impl TypeFolder for ApplyBindings<'_, '_> {
    fn pool(&self) -> &TypePool {
        self.unifier.pool
    }

    fn fold_placeholder(&mut self, id: TyId, _placeholder: quill_ir::PlaceholderId) -> TyId {
        self.substitute(id)
    }

    fn fold_open_assoc(&mut self, id: TyId, _assoc: quill_ir::DeclId) -> TyId {
        self.substitute(id)
    }
}
