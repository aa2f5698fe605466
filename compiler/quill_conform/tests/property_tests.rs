//! Property-based tests for conformance checking.
//!
//! Random protocols with associated types and value requirements are
//! checked against random adoptees, and the results must be:
//! 1. Deterministic: the same graph gives the same conformance and diagnostics
//! 2. Phased: associated types are resolved before any value requirement
//! 3. Cache-independent: a pass that already checked other conformances
//!    gives the same answer as a fresh one
//! 4. Deduplicated: a requirement is recorded at most once per conformance,
//!    and every conformance's own slice lists all of its missing witnesses

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::disallowed_types,
    clippy::uninlined_format_args,
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use proptest::prelude::*;
use quill_conform::testing::Fixture;
use quill_conform::{
    CheckerConfig, Conformance, ConformancePass, ConformanceState, MissingWitness,
    TypeWitnessEntry, WitnessEntry,
};
use quill_diagnostic::Diagnostic;
use quill_ir::{DeclId, TyId};

const CONCRETE: [&str; 3] = ["Int", "String", "Bool"];

// -- Plan Generation Strategies --

#[derive(Clone, Debug)]
struct AssocPlan {
    /// Index into the concrete types.
    default: Option<usize>,
    /// Adoptee-side typealias naming the associated type.
    alias: Option<usize>,
}

#[derive(Clone, Debug)]
enum ResultPlan {
    Concrete(usize),
    /// `Self.A_j`, clamped to the associated types that exist.
    Assoc(usize),
}

#[derive(Clone, Debug)]
struct WitnessPlan {
    result: usize,
    optional: bool,
}

#[derive(Clone, Debug)]
struct RequirementPlan {
    result: ResultPlan,
    witness: Option<WitnessPlan>,
}

#[derive(Clone, Debug)]
struct Plan {
    assocs: Vec<AssocPlan>,
    requirements: Vec<RequirementPlan>,
}

fn concrete_strategy() -> impl Strategy<Value = usize> {
    0..CONCRETE.len()
}

fn assoc_strategy() -> impl Strategy<Value = AssocPlan> {
    (
        prop::option::of(concrete_strategy()),
        prop::option::of(concrete_strategy()),
    )
        .prop_map(|(default, alias)| AssocPlan { default, alias })
}

fn requirement_strategy() -> impl Strategy<Value = RequirementPlan> {
    let result = prop_oneof![
        concrete_strategy().prop_map(ResultPlan::Concrete),
        (0..4usize).prop_map(ResultPlan::Assoc),
    ];
    let witness = prop::option::of(
        (concrete_strategy(), any::<bool>())
            .prop_map(|(result, optional)| WitnessPlan { result, optional }),
    );
    (result, witness).prop_map(|(result, witness)| RequirementPlan { result, witness })
}

fn plan_strategy() -> impl Strategy<Value = Plan> {
    (
        prop::collection::vec(assoc_strategy(), 0..4),
        prop::collection::vec(requirement_strategy(), 0..5),
    )
        .prop_map(|(assocs, requirements)| Plan {
            assocs,
            requirements,
        })
}

// -- Graph Construction --

struct Built {
    fx: Fixture,
    protocol: DeclId,
    adoptee: DeclId,
    /// Same members as `adoptee`, under another name.
    twin: DeclId,
    assocs: Vec<DeclId>,
}

fn add_members(fx: &mut Fixture, nominal: DeclId, plan: &Plan, concrete: &[TyId]) {
    for (j, assoc) in plan.assocs.iter().enumerate() {
        if let Some(alias) = assoc.alias {
            fx.typealias(nominal, &format!("A{j}"), concrete[alias]);
        }
    }
    for (i, req) in plan.requirements.iter().enumerate() {
        if let Some(witness) = &req.witness {
            let mut result = concrete[witness.result];
            if witness.optional {
                result = fx.optional(result);
            }
            fx.func(nominal, &format!("f{i}()"), &[], result);
        }
    }
}

fn build(plan: &Plan) -> Built {
    let mut fx = Fixture::new();
    let concrete: Vec<TyId> = CONCRETE
        .iter()
        .map(|name| {
            let decl = fx.structure(name);
            fx.ty(decl)
        })
        .collect();

    let protocol = fx.protocol("P");
    let assocs: Vec<DeclId> = plan
        .assocs
        .iter()
        .enumerate()
        .map(|(j, assoc)| {
            let default = assoc.default.map(|d| concrete[d]);
            fx.assoc_type(protocol, &format!("A{j}"), default)
        })
        .collect();
    for (i, req) in plan.requirements.iter().enumerate() {
        let result = match req.result {
            ResultPlan::Assoc(j) if !assocs.is_empty() => fx.self_member(assocs[j % assocs.len()]),
            ResultPlan::Assoc(j) | ResultPlan::Concrete(j) => concrete[j % concrete.len()],
        };
        fx.func(protocol, &format!("f{i}()"), &[], result);
    }

    let adoptee = fx.structure("S");
    add_members(&mut fx, adoptee, plan, &concrete);
    let twin = fx.structure("T");
    add_members(&mut fx, twin, plan, &concrete);

    Built {
        fx,
        protocol,
        adoptee,
        twin,
        assocs,
    }
}

// -- Comparison --

/// Everything observable about a checked conformance except its ledger
/// range, which depends on what the pass checked before.
#[derive(Debug, PartialEq)]
struct Summary {
    state: ConformanceState,
    resolution_order: Vec<DeclId>,
    value_witnesses: Vec<(DeclId, WitnessEntry)>,
    type_witnesses: Vec<(DeclId, TypeWitnessEntry)>,
}

fn summarize(conformance: &Conformance) -> Summary {
    let mut value_witnesses: Vec<_> = conformance
        .value_witnesses()
        .map(|(id, entry)| (id, entry.clone()))
        .collect();
    value_witnesses.sort_by_key(|(id, _)| *id);
    let mut type_witnesses: Vec<_> = conformance
        .type_witnesses()
        .map(|(id, entry)| (id, *entry))
        .collect();
    type_witnesses.sort_by_key(|(id, _)| *id);
    Summary {
        state: conformance.state(),
        resolution_order: conformance.resolution_order().to_vec(),
        value_witnesses,
        type_witnesses,
    }
}

struct Checked {
    summary: Summary,
    diagnostics: Vec<Diagnostic>,
    missing: Vec<MissingWitness>,
}

/// Check each of `nominals` in order in one pass; the last is reported.
fn check_in_one_pass(built: &Built, nominals: &[DeclId]) -> Checked {
    let store = &built.fx.store;
    let mut diagnostics = Vec::new();
    let mut last = None;
    {
        let mut pass = ConformancePass::new(store, &mut diagnostics, CheckerConfig::default());
        for &nominal in nominals {
            let mut conformance = Conformance::for_nominal(store, built.protocol, nominal);
            pass.check_conformance(&mut conformance);
            let missing = pass.local_missing_witnesses(&conformance);
            last = Some((summarize(&conformance), missing));
        }
    }
    let (summary, missing) = last.expect("at least one nominal");
    Checked {
        summary,
        diagnostics,
        missing,
    }
}

// -- Property Tests --

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn checking_is_deterministic(plan in plan_strategy()) {
        let (a, b) = (build(&plan), build(&plan));
        let first = check_in_one_pass(&a, &[a.adoptee]);
        let second = check_in_one_pass(&b, &[b.adoptee]);
        prop_assert_eq!(first.summary, second.summary);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
        prop_assert_eq!(first.missing, second.missing);
    }

    #[test]
    fn associated_types_resolve_before_value_requirements(plan in plan_strategy()) {
        let built = build(&plan);
        let checked = check_in_one_pass(&built, &[built.adoptee]);
        let order = &checked.summary.resolution_order;
        if let Some(first_value) = order.iter().position(|id| !built.assocs.contains(id)) {
            prop_assert!(
                order[first_value..].iter().all(|id| !built.assocs.contains(id)),
                "associated type resolved after a value requirement: {:?}",
                order
            );
        }
    }

    #[test]
    fn earlier_checks_do_not_change_the_result(plan in plan_strategy()) {
        let built = build(&plan);
        let fresh = check_in_one_pass(&built, &[built.adoptee]);
        let twin_alone = check_in_one_pass(&built, &[built.twin]);
        let warm = check_in_one_pass(&built, &[built.twin, built.adoptee]);

        prop_assert_eq!(&fresh.summary, &warm.summary);
        prop_assert_eq!(&fresh.missing, &warm.missing);
        prop_assert_eq!(
            &warm.diagnostics[twin_alone.diagnostics.len()..],
            fresh.diagnostics.as_slice()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_records_each_missing_witness_once(plan in plan_strategy()) {
        let built = build(&plan);
        let store = &built.fx.store;
        let mut diagnostics = Vec::new();
        let mut pass = ConformancePass::new(store, &mut diagnostics, CheckerConfig::default());
        let mut first_len = None;
        for nominal in [built.adoptee, built.twin, built.adoptee] {
            let mut conformance = Conformance::for_nominal(store, built.protocol, nominal);
            pass.check_conformance(&mut conformance);
            first_len.get_or_insert(pass.ledger().len());

            // Every missing value requirement is in this conformance's own
            // slice, including when the check was a replay.
            let local: Vec<DeclId> = pass
                .local_missing_witnesses(&conformance)
                .iter()
                .map(|m| m.requirement)
                .collect();
            for (requirement, entry) in conformance.value_witnesses() {
                if *entry == WitnessEntry::Missing {
                    prop_assert!(local.contains(&requirement), "{:?} not in {:?}", requirement, local);
                }
            }
        }

        let entries = pass.ledger().entries();
        let mut keys: Vec<_> = entries.iter().map(|m| (m.conformance, m.requirement)).collect();
        let total = keys.len();
        keys.sort_by_key(|(conformance, requirement)| (conformance.adoptee, *requirement));
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
        // The twin adds as many entries as the adoptee; the recheck adds none.
        prop_assert_eq!(total, 2 * first_len.unwrap_or(0));
    }
}
