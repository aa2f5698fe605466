//! Protocol conformance checking.
//!
//! Decides whether a concrete type satisfies every requirement of a
//! protocol, and records which declaration witnesses each one.
//!
//! # Architecture
//!
//! - `requirement`: the closed set of requirement kinds and their signatures
//! - `env`: per-signature substitution environments, cached for the pass
//! - `lookup`: candidate witnesses by name, plus the reverse query
//! - `matcher`: one candidate against one requirement, in three phases
//! - `resolve`: lookup, then derivation, then defaults
//! - `checker`: type witnesses, then value witnesses, then policy checks
//! - `ledger`: missing witnesses, deduplicated across the pass
//! - `derive`: compiler-synthesized witnesses
//!
//! The pass is single-threaded. Nested "does `T` conform to `P`" queries
//! recurse into the same pass, guarded against cycles.

mod checker;
mod config;
mod conformance;
mod derive;
mod display;
mod env;
mod ledger;
mod lookup;
mod matcher;
mod requirement;
mod resolve;
mod stack;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Once;

pub use checker::{
    adjust_inferred_associated_type, find_defaulted_associated_type, ConformancePass, CycleError,
    PassStats,
};
pub use config::CheckerConfig;
pub use conformance::{
    Conformance, ConformanceKey, ConformanceState, IsolationCrossing, PolicyViolation,
    SynthesizedWitness, TypeWitness, TypeWitnessEntry, TypeWitnessSource, Witness, WitnessDecl,
    WitnessEntry, WitnessOrigin,
};
pub use derive::{ConformanceOracle, DerivationProvider, StructuralDerivation};
pub use display::TypePrinter;
pub use env::{RequirementEnvironment, RequirementEnvironmentCache, SelfBinding};
pub use ledger::{ConstraintFailure, MissingWitness, MissingWitnessContext, MissingWitnessLedger};
pub use lookup::{find_witnessed_requirements, lookup_value_witnesses, WitnessLookup};
pub use matcher::{
    match_witness, Adjustment, AdjustmentPosition, EffectAdjustment, MatchContext,
    MismatchReason, OptionalAdjustment, RequirementMatch, TypeAdjustment,
};
pub use requirement::{collect_requirements, ProtocolRequirement, RequirementKind, SelfUse};
pub use resolve::ResolveWitnessResult;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for conformance checking.
///
/// Reads the filter from `QUILL_LOG`, falling back to `RUST_LOG`; does
/// nothing when neither is set. Nested conformance checks render as a
/// tree.
///
/// Safe to call multiple times; only the first call has any effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        let directives = std::env::var("QUILL_LOG").or_else(|_| std::env::var("RUST_LOG"));
        if let Ok(directives) = directives {
            tracing_subscriber::registry()
                .with(EnvFilter::new(directives))
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .init();
        }
    });
}
