//! Type folding.
//!
//! Substitutions in the checker (opening generic parameters, replacing
//! `Self`, plugging in associated-type witnesses) are all folders that
//! override one or two of the leaf hooks below.

use super::{FunctionType, PlaceholderId, TyId, TypeData, TypePool};
use crate::{DeclId, GenericParamKey};

/// Trait for transforming interned types.
///
/// `fold` dispatches to a variant-specific method. Leaf hooks return the
/// type unchanged by default; compound hooks fold their children and
/// re-intern.
pub trait TypeFolder {
    /// Get the pool for lookups and creating new types.
    fn pool(&self) -> &TypePool;

    /// Fold a `TyId` by dispatching to variant-specific methods.
    fn fold(&mut self, id: TyId) -> TyId {
        let data = self.pool().get(id);
        match data {
            TypeData::Error => id,
            TypeData::SelfType => self.fold_self(id),
            TypeData::Nominal { decl, args } => self.fold_nominal(decl, &args),
            TypeData::Optional(inner) => {
                let folded = self.fold(inner);
                self.pool().optional(folded)
            }
            TypeData::Tuple(elems) => {
                let folded: Vec<TyId> = elems.iter().map(|&t| self.fold(t)).collect();
                self.pool().tuple(folded)
            }
            TypeData::Function(func) => self.fold_function(&func),
            TypeData::GenericParam(key) => self.fold_generic_param(id, key),
            TypeData::DependentMember { base, assoc } => self.fold_dependent_member(base, assoc),
            TypeData::DynamicSelf(class) => self.fold_dynamic_self(id, class),
            TypeData::Placeholder(placeholder) => self.fold_placeholder(id, placeholder),
            TypeData::OpenAssoc(assoc) => self.fold_open_assoc(id, assoc),
        }
    }

    /// Fold the protocol `Self`.
    fn fold_self(&mut self, id: TyId) -> TyId {
        id
    }

    fn fold_generic_param(&mut self, id: TyId, _key: GenericParamKey) -> TyId {
        id
    }

    fn fold_dynamic_self(&mut self, id: TyId, _class: DeclId) -> TyId {
        id
    }

    fn fold_placeholder(&mut self, id: TyId, _placeholder: PlaceholderId) -> TyId {
        id
    }

    fn fold_open_assoc(&mut self, id: TyId, _assoc: DeclId) -> TyId {
        id
    }

    /// Fold a nominal type. Default folds generic arguments.
    fn fold_nominal(&mut self, decl: DeclId, args: &[TyId]) -> TyId {
        let folded: Vec<TyId> = args.iter().map(|&a| self.fold(a)).collect();
        self.pool().nominal(decl, folded)
    }

    /// Fold a function type. Default folds params and result, keeping flags.
    fn fold_function(&mut self, func: &FunctionType) -> TyId {
        let params: Vec<TyId> = func.params.iter().map(|&p| self.fold(p)).collect();
        let result = self.fold(func.result);
        self.pool().function(params, result, func.flags)
    }

    /// Fold `base.Assoc`. Default folds the base.
    fn fold_dependent_member(&mut self, base: TyId, assoc: DeclId) -> TyId {
        let folded = self.fold(base);
        self.pool().dependent_member(folded, assoc)
    }
}
