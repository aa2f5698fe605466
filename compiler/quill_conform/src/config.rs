//! Checker configuration.

use quill_ir::Version;

/// Configuration for a conformance pass.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CheckerConfig {
    /// Oldest platform version the program runs on. Witnesses introduced
    /// later than this (or than the requirement) are rejected.
    pub deployment_target: Version,
    /// Report isolation mismatches as errors rather than warnings.
    pub strict_isolation: bool,
    /// Check declared conformances used to satisfy bounds, instead of
    /// trusting the declaration.
    pub verify_nested_conformances: bool,
    /// Warn about candidates that nearly matched a requirement that was
    /// then satisfied by derivation or a default.
    pub warn_near_misses: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            deployment_target: Version::ZERO,
            strict_isolation: true,
            verify_nested_conformances: true,
            warn_near_misses: true,
        }
    }
}

impl CheckerConfig {
    /// Trust declared conformances and keep isolation mismatches as
    /// warnings; suited to incremental re-checks of a single conformance.
    pub fn permissive() -> Self {
        CheckerConfig {
            strict_isolation: false,
            verify_nested_conformances: false,
            ..Self::default()
        }
    }
}
