//! Interned type storage.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{FnFlags, FunctionType, PlaceholderId, TyId, TypeData};
use crate::{DeclId, GenericParamKey};

struct PoolInner {
    /// Map from type data to id for deduplication.
    map: FxHashMap<TypeData, TyId>,
    /// Storage for type data, indexed by `TyId::raw`.
    types: Vec<TypeData>,
}

/// Type pool.
///
/// Interning goes through `&self` so folders and matchers can build new
/// types while only borrowing the declaration graph.
pub struct TypePool {
    inner: RwLock<PoolInner>,
}

impl TypePool {
    /// Create a pool with `Error` and `Self` pre-interned at their
    /// reserved ids.
    pub fn new() -> Self {
        let pool = TypePool {
            inner: RwLock::new(PoolInner {
                map: FxHashMap::default(),
                types: Vec::with_capacity(64),
            }),
        };
        let error = pool.intern(TypeData::Error);
        let self_ty = pool.intern(TypeData::SelfType);
        debug_assert_eq!(error, TyId::ERROR);
        debug_assert_eq!(self_ty, TyId::SELF);
        pool
    }

    /// Intern type data, returning the existing id when already present.
    ///
    /// # Panics
    /// Panics if the pool holds more than `u32::MAX` types.
    pub fn intern(&self, data: TypeData) -> TyId {
        if let Some(&id) = self.inner.read().map.get(&data) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(&id) = inner.map.get(&data) {
            return id;
        }
        let Ok(raw) = u32::try_from(inner.types.len()) else {
            panic!("type pool exceeded u32::MAX types");
        };
        let id = TyId::from_raw(raw);
        inner.types.push(data.clone());
        inner.map.insert(data, id);
        id
    }

    /// Look up the structure of a type.
    ///
    /// Ids from another pool resolve to `TypeData::Error`.
    pub fn get(&self, id: TyId) -> TypeData {
        self.inner
            .read()
            .types
            .get(id.raw() as usize)
            .cloned()
            .unwrap_or(TypeData::Error)
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Always false: `Error` and `Self` are pre-interned.
    pub fn is_empty(&self) -> bool {
        self.inner.read().types.is_empty()
    }

    // Constructors

    pub fn nominal(&self, decl: DeclId, args: Vec<TyId>) -> TyId {
        self.intern(TypeData::Nominal {
            decl,
            args: args.into_boxed_slice(),
        })
    }

    pub fn optional(&self, inner: TyId) -> TyId {
        self.intern(TypeData::Optional(inner))
    }

    pub fn tuple(&self, elems: Vec<TyId>) -> TyId {
        self.intern(TypeData::Tuple(elems.into_boxed_slice()))
    }

    /// The empty tuple.
    pub fn unit(&self) -> TyId {
        self.tuple(Vec::new())
    }

    pub fn function(&self, params: Vec<TyId>, result: TyId, flags: FnFlags) -> TyId {
        self.intern(TypeData::Function(FunctionType {
            params: params.into_boxed_slice(),
            result,
            flags,
        }))
    }

    pub fn generic_param(&self, key: GenericParamKey) -> TyId {
        self.intern(TypeData::GenericParam(key))
    }

    pub fn dependent_member(&self, base: TyId, assoc: DeclId) -> TyId {
        self.intern(TypeData::DependentMember { base, assoc })
    }

    pub fn dynamic_self(&self, class: DeclId) -> TyId {
        self.intern(TypeData::DynamicSelf(class))
    }

    pub fn placeholder(&self, id: PlaceholderId) -> TyId {
        self.intern(TypeData::Placeholder(id))
    }

    pub fn open_assoc(&self, assoc: DeclId) -> TyId {
        self.intern(TypeData::OpenAssoc(assoc))
    }

    // Queries

    /// The wrapped type if `id` is `T?`.
    pub fn optional_payload(&self, id: TyId) -> Option<TyId> {
        match self.get(id) {
            TypeData::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_function(&self, id: TyId) -> Option<FunctionType> {
        match self.get(id) {
            TypeData::Function(func) => Some(func),
            _ => None,
        }
    }

    /// The nominal declaration of `id`, looking through covariant `Self`.
    pub fn nominal_decl(&self, id: TyId) -> Option<DeclId> {
        match self.get(id) {
            TypeData::Nominal { decl, .. } | TypeData::DynamicSelf(decl) => Some(decl),
            _ => None,
        }
    }

    /// Whether `id` or any type nested inside it satisfies `pred`.
    pub fn any(&self, id: TyId, pred: &mut impl FnMut(TyId, &TypeData) -> bool) -> bool {
        let data = self.get(id);
        if pred(id, &data) {
            return true;
        }
        let mut found = false;
        data.for_each_child(|child| {
            if !found {
                found = self.any(child, &mut *pred);
            }
        });
        found
    }

    /// Whether `id` still contains unresolved placeholders or open
    /// associated types.
    pub fn has_unresolved(&self, id: TyId) -> bool {
        self.any(id, &mut |_: TyId, data: &TypeData| {
            matches!(data, TypeData::Placeholder(_) | TypeData::OpenAssoc(_))
        })
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}
