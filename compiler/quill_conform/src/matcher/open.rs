//! Signature instantiation for matching.

use quill_ir::{DeclId, GenericParamKey, TyId, TypeFolder, TypePool};
use rustc_hash::FxHashMap;

use crate::env::RequirementEnvironment;

/// Instantiates a declared signature for one conformance:
/// - `Self` becomes the adoptee (or its dynamic `Self`)
/// - the declaration's own generic parameters become placeholders
/// - `Self.A` becomes A's witness, or an open associated type
pub(crate) struct SignatureOpener<'a> {
    pub(crate) pool: &'a TypePool,
    pub(crate) self_ty: TyId,
    pub(crate) env: Option<&'a RequirementEnvironment>,
    pub(crate) type_witnesses: &'a FxHashMap<DeclId, TyId>,
}

impl TypeFolder for SignatureOpener<'_> {
    fn pool(&self) -> &TypePool {
        self.pool
    }

    fn fold_self(&mut self, _id: TyId) -> TyId {
        self.self_ty
    }

    fn fold_generic_param(&mut self, id: TyId, key: GenericParamKey) -> TyId {
        self.env.and_then(|env| env.opened(key)).unwrap_or(id)
    }

    fn fold_dependent_member(&mut self, base: TyId, assoc: DeclId) -> TyId {
        if base == TyId::SELF {
            return match self.type_witnesses.get(&assoc) {
                Some(&ty) => ty,
                None => self.pool.open_assoc(assoc),
            };
        }
        let folded = self.fold(base);
        self.pool.dependent_member(folded, assoc)
    }
}
