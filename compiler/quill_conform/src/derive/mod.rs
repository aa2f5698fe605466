//! Derived conformances.
//!
//! Some protocols can be satisfied by compiler-synthesized witnesses when
//! the adopting type's structure allows it: memberwise equality, hashing,
//! case ordering, case iteration and raw-value conversion.

use quill_ir::{
    DeclGraph, DeclId, DeclKind, DerivationKind, GenericSigId, NominalKind, TyId, TypeFolder,
    TypePool,
};

use crate::conformance::SynthesizedWitness;
use crate::requirement::ProtocolRequirement;

/// Answers conformance questions during derivation.
///
/// Implemented by the pass, so asking may check another conformance.
pub trait ConformanceOracle {
    /// Whether `ty` conforms to `protocol`, with `generic_context`
    /// supplying the constraints on any generic parameters in `ty`.
    fn conforms_to(
        &mut self,
        ty: TyId,
        protocol: DeclId,
        generic_context: Option<GenericSigId>,
    ) -> bool;
}

/// Synthesizes witnesses for protocols it knows how to derive.
pub trait DerivationProvider {
    /// Whether this provider can derive `protocol` for the nominal
    /// `adoptee`.
    fn can_derive(
        &self,
        graph: &dyn DeclGraph,
        protocol: DeclId,
        adoptee: DeclId,
        oracle: &mut dyn ConformanceOracle,
    ) -> bool;

    /// Synthesize a witness for one value requirement. Only called after
    /// `can_derive` returned `true`.
    fn synthesize(
        &self,
        graph: &dyn DeclGraph,
        requirement: &ProtocolRequirement,
        adoptee: TyId,
    ) -> Option<SynthesizedWitness>;

    /// Derive the witness for an associated type, if the provider
    /// determines it.
    fn derive_type_witness(
        &self,
        _graph: &dyn DeclGraph,
        _assoc: &ProtocolRequirement,
        _adoptee: DeclId,
    ) -> Option<TyId> {
        None
    }
}

/// Derivation driven by the protocol's [`DerivationKind`].
#[derive(Copy, Clone, Debug, Default)]
pub struct StructuralDerivation;

impl StructuralDerivation {
    fn kind(graph: &dyn DeclGraph, protocol: DeclId) -> Option<DerivationKind> {
        match &graph.decl(protocol).kind {
            DeclKind::Protocol(p) => p.derivation,
            _ => None,
        }
    }
}

impl DerivationProvider for StructuralDerivation {
    fn can_derive(
        &self,
        graph: &dyn DeclGraph,
        protocol: DeclId,
        adoptee: DeclId,
        oracle: &mut dyn ConformanceOracle,
    ) -> bool {
        let Some(kind) = Self::kind(graph, protocol) else {
            return false;
        };
        let DeclKind::Nominal(nominal) = &graph.decl(adoptee).kind else {
            return false;
        };
        let generics = nominal.generics;
        let mut members_conform =
            || nominal.stored.iter().all(|&ty| oracle.conforms_to(ty, protocol, generics));
        match (kind, nominal.kind) {
            (DerivationKind::Equality | DerivationKind::Hashing, NominalKind::Struct | NominalKind::Enum) => {
                members_conform()
            }
            (DerivationKind::Ordering, NominalKind::Enum) => members_conform(),
            (DerivationKind::CaseIteration, NominalKind::Enum) => nominal.stored.is_empty(),
            (DerivationKind::RawValue, NominalKind::Enum) => {
                nominal.raw_type.is_some() && nominal.stored.is_empty()
            }
            _ => false,
        }
    }

    fn synthesize(
        &self,
        graph: &dyn DeclGraph,
        requirement: &ProtocolRequirement,
        adoptee: TyId,
    ) -> Option<SynthesizedWitness> {
        Self::kind(graph, requirement.protocol)?;
        let signature = requirement.signature.map(|sig| {
            ReplaceSelf {
                pool: graph.types(),
                adoptee,
            }
            .fold(sig)
        });
        Some(SynthesizedWitness {
            protocol: requirement.protocol,
            requirement: requirement.decl,
            adoptee,
            signature,
        })
    }

    /// Raw-value derivation fixes every associated type of the protocol to
    /// the enum's raw type.
    fn derive_type_witness(
        &self,
        graph: &dyn DeclGraph,
        assoc: &ProtocolRequirement,
        adoptee: DeclId,
    ) -> Option<TyId> {
        if Self::kind(graph, assoc.protocol)? != DerivationKind::RawValue {
            return None;
        }
        match &graph.decl(adoptee).kind {
            DeclKind::Nominal(n) => n.raw_type,
            _ => None,
        }
    }
}

struct ReplaceSelf<'a> {
    pool: &'a TypePool,
    adoptee: TyId,
}

impl TypeFolder for ReplaceSelf<'_> {
    fn pool(&self) -> &TypePool {
        self.pool
    }

    fn fold_self(&mut self, _id: TyId) -> TyId {
        self.adoptee
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
