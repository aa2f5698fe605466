//! Witness lookup.
//!
//! Finds the declarations that could witness a requirement. Nothing here
//! compares signatures; that is the matcher's job. Lookup only narrows by
//! name, kind and static-ness, in declaration order.

use quill_ir::{DeclGraph, DeclId, DeclKind, DeclName, TyId, TypeData};

use crate::requirement::{ProtocolRequirement, RequirementKind};

/// Candidates for one value requirement.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WitnessLookup {
    pub candidates: Vec<DeclId>,
    /// No declaration had the full name; these share only the base name.
    pub ignoring_names: bool,
    /// Candidates come from `implements` attributes.
    pub via_implements: bool,
}

impl WitnessLookup {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Candidate witnesses for `requirement` among the members of `context`
/// and its extensions.
///
/// Declarations with an `implements` attribute naming the requirement win
/// outright. Otherwise full-name matches are returned, and only if there
/// are none does lookup fall back to base-name matches.
pub fn lookup_value_witnesses(
    graph: &dyn DeclGraph,
    context: DeclId,
    requirement: &ProtocolRequirement,
) -> WitnessLookup {
    let overrides = implements_candidates(graph, context, requirement);
    if !overrides.is_empty() {
        return WitnessLookup {
            candidates: overrides,
            ignoring_names: false,
            via_implements: true,
        };
    }

    let by_base: Vec<DeclId> = graph
        .lookup_members(context, requirement.name.base)
        .into_iter()
        .filter(|&m| is_compatible(graph, requirement, m))
        .collect();
    let exact: Vec<DeclId> = by_base
        .iter()
        .copied()
        .filter(|&m| graph.decl(m).name == requirement.name)
        .collect();

    if exact.is_empty() {
        WitnessLookup {
            ignoring_names: !by_base.is_empty(),
            candidates: by_base,
            via_implements: false,
        }
    } else {
        WitnessLookup {
            candidates: exact,
            ignoring_names: false,
            via_implements: false,
        }
    }
}

/// Whether `member` could witness `requirement` at all: a value of the
/// right kind and static-ness that is not reserved for another
/// requirement through `implements`.
fn is_compatible(graph: &dyn DeclGraph, requirement: &ProtocolRequirement, member: DeclId) -> bool {
    let decl = graph.decl(member);
    if !requirement.kind.accepts(&decl.kind) || decl.is_static() != requirement.is_static {
        return false;
    }
    match &decl.implements {
        Some(attr) => attr.protocol != requirement.protocol,
        None => true,
    }
}

fn implements_candidates(
    graph: &dyn DeclGraph,
    context: DeclId,
    requirement: &ProtocolRequirement,
) -> Vec<DeclId> {
    graph
        .members_of(context)
        .into_iter()
        .filter(|&m| {
            let decl = graph.decl(m);
            decl.implements.as_ref().is_some_and(|attr| {
                attr.protocol == requirement.protocol
                    && names_match(&attr.requirement, &requirement.name)
            }) && requirement.kind.accepts(&decl.kind)
                && decl.is_static() == requirement.is_static
        })
        .collect()
}

/// An `implements` attribute may spell the requirement by base name alone.
fn names_match(written: &DeclName, requirement: &DeclName) -> bool {
    match written.labels {
        Some(_) => written == requirement,
        None => written.base == requirement.base,
    }
}

/// Protocol-extension members that provide a default for `requirement`,
/// in declaration order.
pub(crate) fn default_candidates(
    graph: &dyn DeclGraph,
    requirement: &ProtocolRequirement,
) -> Vec<DeclId> {
    graph
        .extensions_of(requirement.protocol)
        .iter()
        .flat_map(|&ext| graph.decl(ext).kind.members().iter().copied())
        .filter(|&m| {
            let decl = graph.decl(m);
            decl.name == requirement.name
                && requirement.kind.accepts(&decl.kind)
                && decl.is_static() == requirement.is_static
        })
        .collect()
}

/// Declarations in `context` that name a type for associated type `assoc`:
/// type aliases, nested nominals, or the context's own generic parameters.
pub(crate) fn type_witness_candidates(
    graph: &dyn DeclGraph,
    context: DeclId,
    assoc: &ProtocolRequirement,
) -> Vec<(DeclId, TyId)> {
    let pool = graph.types();
    let mut found: Vec<(DeclId, TyId)> = graph
        .lookup_members(context, assoc.name.base)
        .into_iter()
        .filter_map(|m| match &graph.decl(m).kind {
            DeclKind::TypeAlias(alias) => Some((m, alias.underlying)),
            DeclKind::Nominal(_) => Some((m, pool.nominal(m, Vec::new()))),
            _ => None,
        })
        .collect();
    if let Some(sig) = graph.decl(context).kind.generics() {
        found.extend(
            graph
                .generic_signature(sig)
                .params
                .iter()
                .filter(|p| p.name == assoc.name.base)
                .map(|p| (context, pool.generic_param(p.key))),
        );
    }
    found
}

/// Whether `sub` is `sup` or inherits from it, transitively.
pub(crate) fn protocol_inherits(graph: &dyn DeclGraph, sub: DeclId, sup: DeclId) -> bool {
    let mut stack = vec![sub];
    let mut visited = Vec::new();
    while let Some(p) = stack.pop() {
        if p == sup {
            return true;
        }
        if visited.contains(&p) {
            continue;
        }
        visited.push(p);
        if let DeclKind::Protocol(proto) = &graph.decl(p).kind {
            stack.extend(proto.inherited.iter().copied());
        }
    }
    false
}

/// Whether the declaration behind `ty` declares conformance to `protocol`
/// (or to a protocol inheriting it). Purely declarative; nothing is
/// checked.
pub(crate) fn declares_conformance(graph: &dyn DeclGraph, ty: TyId, protocol: DeclId) -> bool {
    let nominal = match graph.types().get(ty) {
        TypeData::Nominal { decl, .. } | TypeData::DynamicSelf(decl) => decl,
        _ => return false,
    };
    graph
        .declared_conformances(nominal)
        .into_iter()
        .any(|p| protocol_inherits(graph, p, protocol))
}

/// Requirements of the protocols `witness`'s type conforms to that
/// `witness` could satisfy by name, kind and static-ness.
///
/// With `any_single`, stops at the first hit. Covers the protocols the
/// type declares and everything they inherit.
pub fn find_witnessed_requirements(
    graph: &dyn DeclGraph,
    witness: DeclId,
    any_single: bool,
) -> Vec<DeclId> {
    let decl = graph.decl(witness);
    if !decl.kind.is_value() {
        return Vec::new();
    }
    let Some(nominal) = decl.parent.and_then(|p| graph.nominal_of(p)) else {
        return Vec::new();
    };

    let mut protocols = Vec::new();
    let mut stack: Vec<DeclId> = graph.declared_conformances(nominal);
    stack.reverse();
    while let Some(p) = stack.pop() {
        if protocols.contains(&p) {
            continue;
        }
        protocols.push(p);
        if let DeclKind::Protocol(proto) = &graph.decl(p).kind {
            stack.extend(proto.inherited.iter().rev().copied());
        }
    }

    let mut found = Vec::new();
    for protocol in protocols {
        for &member in graph.decl(protocol).kind.members() {
            let req = graph.decl(member);
            let Some(kind) = RequirementKind::of(&req.kind) else {
                continue;
            };
            if !kind.accepts(&decl.kind) || req.is_static() != decl.is_static() {
                continue;
            }
            let named = match &decl.implements {
                Some(attr) => attr.protocol == protocol && names_match(&attr.requirement, &req.name),
                None => req.name == decl.name,
            };
            if named {
                found.push(member);
                if any_single {
                    return found;
                }
            }
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
