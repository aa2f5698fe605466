//! Destination for diagnostics.

use crate::Diagnostic;

/// Anything that accepts diagnostics.
///
/// The checker reports into a sink and never reads back from it.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}
