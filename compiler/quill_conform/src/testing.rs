//! Declaration-graph builders for tests.
//!
//! [`Fixture`] wraps a [`DeclStore`] with shorthand for the declarations
//! conformance tests need, and runs a single check in a fresh pass.

use quill_diagnostic::Diagnostic;
use quill_ir::{
    AssocTypeDecl, Decl, DeclGraph, DeclId, DeclKind, DeclName, DeclStore, DerivationKind,
    ExtensionDecl, FnFlags, FuncDecl, GenericParamDef, GenericParamKey, GenericRequirement,
    GenericSigId, GenericSignature, InitDecl, Name, NominalDecl, NominalKind, ProtocolDecl, TyId,
    TypeAliasDecl, TypePool, VarDecl,
};

use crate::checker::{ConformancePass, PassStats};
use crate::config::CheckerConfig;
use crate::conformance::Conformance;
use crate::ledger::MissingWitness;

/// Result of [`Fixture::check`].
#[derive(Debug)]
pub struct CheckOutcome {
    pub conformance: Conformance,
    pub diagnostics: Vec<Diagnostic>,
    /// Ledger entries local to the conformance.
    pub missing: Vec<MissingWitness>,
    pub stats: PassStats,
}

impl CheckOutcome {
    pub fn error_codes(&self) -> Vec<&'static str> {
        self.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }
}

#[derive(Default)]
pub struct Fixture {
    pub store: DeclStore,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture::default()
    }

    pub fn types(&self) -> &TypePool {
        self.store.types()
    }

    /// Parse a full name such as `f(x:_:)`.
    pub fn name(&self, text: &str) -> DeclName {
        DeclName::parse(self.store.interner(), text)
    }

    pub fn nominal(&mut self, name: &str, kind: NominalKind) -> DeclId {
        let name = self.name(name);
        self.store.add(Decl::new(
            name,
            DeclKind::Nominal(NominalDecl {
                kind,
                generics: None,
                members: Vec::new(),
                stored: Vec::new(),
                raw_type: None,
                conformances: Vec::new(),
            }),
        ))
    }

    pub fn structure(&mut self, name: &str) -> DeclId {
        self.nominal(name, NominalKind::Struct)
    }

    pub fn enumeration(&mut self, name: &str) -> DeclId {
        self.nominal(name, NominalKind::Enum)
    }

    pub fn class(&mut self, name: &str) -> DeclId {
        self.nominal(name, NominalKind::Class)
    }

    pub fn actor(&mut self, name: &str) -> DeclId {
        self.nominal(name, NominalKind::Actor)
    }

    /// The unapplied type of a nominal.
    pub fn ty(&self, nominal: DeclId) -> TyId {
        self.types().nominal(nominal, Vec::new())
    }

    pub fn optional(&self, ty: TyId) -> TyId {
        self.types().optional(ty)
    }

    pub fn func_ty(&self, params: &[TyId], result: TyId) -> TyId {
        self.types().function(params.to_vec(), result, FnFlags::empty())
    }

    /// `Self.A` for associated type `assoc`.
    pub fn self_member(&self, assoc: DeclId) -> TyId {
        self.types().dependent_member(TyId::SELF, assoc)
    }

    pub fn protocol(&mut self, name: &str) -> DeclId {
        let name = self.name(name);
        self.store
            .add(Decl::new(name, DeclKind::Protocol(ProtocolDecl::default())))
    }

    /// A protocol whose conformances can be derived.
    pub fn derivable_protocol(&mut self, name: &str, kind: DerivationKind) -> DeclId {
        let protocol = self.protocol(name);
        if let DeclKind::Protocol(proto) = &mut self.store.decl_mut(protocol).kind {
            proto.derivation = Some(kind);
        }
        protocol
    }

    /// Make `protocol` refine `parent`.
    pub fn inherit(&mut self, protocol: DeclId, parent: DeclId) {
        if let DeclKind::Protocol(proto) = &mut self.store.decl_mut(protocol).kind {
            proto.inherited.push(parent);
        }
    }

    pub fn assoc_type(&mut self, protocol: DeclId, name: &str, default: Option<TyId>) -> DeclId {
        let name = self.name(name);
        self.store.add(
            Decl::new(
                name,
                DeclKind::AssocType(AssocTypeDecl {
                    bounds: Vec::new(),
                    default,
                }),
            )
            .with_parent(protocol),
        )
    }

    pub fn func(&mut self, parent: DeclId, name: &str, params: &[TyId], result: TyId) -> DeclId {
        let signature = self.func_ty(params, result);
        self.func_with_signature(parent, name, signature)
    }

    pub fn func_with_signature(&mut self, parent: DeclId, name: &str, signature: TyId) -> DeclId {
        let name = self.name(name);
        self.store.add(
            Decl::new(
                name,
                DeclKind::Func(FuncDecl {
                    signature,
                    generics: None,
                }),
            )
            .with_parent(parent),
        )
    }

    pub fn var(&mut self, parent: DeclId, name: &str, ty: TyId, settable: bool) -> DeclId {
        let name = self.name(name);
        self.store.add(
            Decl::new(
                name,
                DeclKind::Var(VarDecl {
                    ty,
                    settable,
                    setter_access: None,
                }),
            )
            .with_parent(parent),
        )
    }

    /// An initializer returning `Self`.
    pub fn init(&mut self, parent: DeclId, name: &str, params: &[TyId], failable: bool) -> DeclId {
        let signature = self.func_ty(params, TyId::SELF);
        let name = self.name(name);
        self.store.add(
            Decl::new(
                name,
                DeclKind::Init(InitDecl {
                    signature,
                    generics: None,
                    failable,
                }),
            )
            .with_parent(parent),
        )
    }

    pub fn typealias(&mut self, parent: DeclId, name: &str, underlying: TyId) -> DeclId {
        let name = self.name(name);
        self.store.add(
            Decl::new(name, DeclKind::TypeAlias(TypeAliasDecl { underlying })).with_parent(parent),
        )
    }

    pub fn extension(&mut self, extended: DeclId) -> DeclId {
        self.store.add(Decl::new(
            DeclName::simple(Name::EMPTY),
            DeclKind::Extension(ExtensionDecl {
                extended,
                members: Vec::new(),
                conformances: Vec::new(),
                where_clause: Vec::new(),
            }),
        ))
    }

    pub fn conform(&mut self, context: DeclId, protocol: DeclId) {
        self.store.declare_conformance(context, protocol);
    }

    /// Add a stored property type (or enum payload) to a nominal.
    pub fn stored(&mut self, nominal: DeclId, ty: TyId) {
        if let DeclKind::Nominal(n) = &mut self.store.decl_mut(nominal).kind {
            n.stored.push(ty);
        }
    }

    /// Give `decl` its own generic parameters at `depth`. `requirements`
    /// receives the parameter types and returns the where-clause.
    pub fn generics(
        &mut self,
        decl: DeclId,
        depth: u16,
        params: &[&str],
        requirements: impl FnOnce(&[TyId]) -> Vec<GenericRequirement>,
    ) -> GenericSigId {
        let defs: Vec<GenericParamDef> = (0u16..)
            .zip(params)
            .map(|(index, name)| GenericParamDef {
                name: self.store.intern(name),
                key: GenericParamKey::new(depth, index),
            })
            .collect();
        let tys: Vec<TyId> = defs
            .iter()
            .map(|def| self.types().generic_param(def.key))
            .collect();
        let sig = self.store.add_generic_signature(GenericSignature {
            params: defs,
            requirements: requirements(&tys),
        });
        match &mut self.store.decl_mut(decl).kind {
            DeclKind::Func(f) => f.generics = Some(sig),
            DeclKind::Subscript(s) => s.generics = Some(sig),
            DeclKind::Init(i) => i.generics = Some(sig),
            DeclKind::Nominal(n) => n.generics = Some(sig),
            other => panic!("{other:?} cannot be generic"),
        }
        sig
    }

    pub fn update(&mut self, id: DeclId, f: impl FnOnce(&mut Decl)) {
        f(self.store.decl_mut(id));
    }

    /// Check `nominal: protocol` in a fresh pass with the default
    /// configuration.
    pub fn check(&self, protocol: DeclId, nominal: DeclId) -> CheckOutcome {
        self.check_with(protocol, nominal, CheckerConfig::default())
    }

    pub fn check_with(
        &self,
        protocol: DeclId,
        nominal: DeclId,
        config: CheckerConfig,
    ) -> CheckOutcome {
        let mut diagnostics = Vec::new();
        let mut conformance = Conformance::for_nominal(&self.store, protocol, nominal);
        let (missing, stats) = {
            let mut pass = ConformancePass::new(&self.store, &mut diagnostics, config);
            pass.check_conformance(&mut conformance);
            (pass.local_missing_witnesses(&conformance), pass.stats())
        };
        CheckOutcome {
            conformance,
            diagnostics,
            missing,
            stats,
        }
    }
}
