//! Requirement environments.
//!
//! Matching a generic requirement (or a generic witness) against anything
//! first opens its generic parameters into placeholders. The opening only
//! depends on the signature and on whether `Self` is a non-final class, so
//! it is built once per (signature, class) pair and shared for the rest of
//! the pass.

use std::rc::Rc;

use quill_ir::{
    DeclGraph, DeclId, GenericParamKey, GenericRequirement, GenericSigId, PlaceholderId, TyId,
    TypeFolder, TypePool,
};
use rustc_hash::FxHashMap;

/// What `Self` stands for while matching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelfBinding {
    /// The adopting type itself.
    Adoptee,
    /// Dynamic `Self` of a non-final class: subclasses inherit the witness.
    Covariant(DeclId),
}

/// A generic signature with its parameters opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequirementEnvironment {
    signature: Option<GenericSigId>,
    self_binding: SelfBinding,
    /// Signature parameter → placeholder.
    openings: FxHashMap<GenericParamKey, TyId>,
    /// The signature's where-clause over the placeholders.
    requirements: Vec<GenericRequirement>,
}

impl RequirementEnvironment {
    pub fn build(
        graph: &dyn DeclGraph,
        signature: Option<GenericSigId>,
        class: Option<DeclId>,
    ) -> Self {
        let self_binding = class.map_or(SelfBinding::Adoptee, SelfBinding::Covariant);
        let Some(sig_id) = signature else {
            return RequirementEnvironment {
                signature,
                self_binding,
                openings: FxHashMap::default(),
                requirements: Vec::new(),
            };
        };
        let pool = graph.types();
        let sig = graph.generic_signature(sig_id);
        let mut openings = FxHashMap::default();
        for (index, param) in sig.params.iter().enumerate() {
            let index = u16::try_from(index).unwrap_or(u16::MAX);
            let placeholder = pool.placeholder(PlaceholderId { sig: sig_id, index });
            openings.insert(param.key, placeholder);
        }
        let mut opener = ParamOpener {
            pool,
            openings: &openings,
        };
        let requirements = sig
            .requirements
            .iter()
            .map(|req| match *req {
                GenericRequirement::Conforms { subject, protocol } => GenericRequirement::Conforms {
                    subject: opener.fold(subject),
                    protocol,
                },
                GenericRequirement::SameType { first, second } => GenericRequirement::SameType {
                    first: opener.fold(first),
                    second: opener.fold(second),
                },
            })
            .collect();
        RequirementEnvironment {
            signature,
            self_binding,
            openings,
            requirements,
        }
    }

    pub fn signature(&self) -> Option<GenericSigId> {
        self.signature
    }

    pub fn self_binding(&self) -> SelfBinding {
        self.self_binding
    }

    /// Placeholder for a parameter of this signature.
    pub fn opened(&self, key: GenericParamKey) -> Option<TyId> {
        self.openings.get(&key).copied()
    }

    /// Placeholders in parameter order.
    pub fn placeholders(&self) -> impl Iterator<Item = TyId> + '_ {
        let mut opened: Vec<_> = self.openings.iter().collect();
        opened.sort_by_key(|(key, _)| **key);
        opened.into_iter().map(|(_, &ty)| ty)
    }

    pub fn requirements(&self) -> &[GenericRequirement] {
        &self.requirements
    }
}

/// Replaces a signature's parameters with their placeholders.
struct ParamOpener<'a> {
    pool: &'a TypePool,
    openings: &'a FxHashMap<GenericParamKey, TyId>,
}

impl TypeFolder for ParamOpener<'_> {
    fn pool(&self) -> &TypePool {
        self.pool
    }

    fn fold_generic_param(&mut self, id: TyId, key: GenericParamKey) -> TyId {
        self.openings.get(&key).copied().unwrap_or(id)
    }
}

/// Pass-scoped cache of requirement environments.
///
/// Never evicts. A hit returns the same `Rc` a miss built, so hits and
/// misses are indistinguishable to callers.
#[derive(Debug, Default)]
pub struct RequirementEnvironmentCache {
    entries: FxHashMap<(Option<GenericSigId>, Option<DeclId>), Rc<RequirementEnvironment>>,
    hits: usize,
    misses: usize,
}

impl RequirementEnvironmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        graph: &dyn DeclGraph,
        signature: Option<GenericSigId>,
        class: Option<DeclId>,
    ) -> Rc<RequirementEnvironment> {
        if let Some(env) = self.entries.get(&(signature, class)) {
            self.hits += 1;
            return Rc::clone(env);
        }
        self.misses += 1;
        tracing::debug!(?signature, ?class, "building requirement environment");
        let env = Rc::new(RequirementEnvironment::build(graph, signature, class));
        self.entries.insert((signature, class), Rc::clone(&env));
        env
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
