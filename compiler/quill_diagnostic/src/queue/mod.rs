//! Diagnostic queue for collecting, deduplicating, and sorting diagnostics.
//!
//! Features:
//! - Error limits to prevent overwhelming output
//! - Deduplication of identical diagnostics reported by nested checks
//! - Source-order flushing

use quill_ir::Span;

use crate::{Diagnostic, DiagnosticSink, ErrorCode};

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors before dropping further errors (0 = unlimited).
    pub error_limit: usize,
    /// Drop diagnostics identical in code, primary span and message to one
    /// already queued.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 20,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// Create a config with no limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

/// Queue for collecting, deduplicating, and sorting diagnostics.
///
/// # Example
///
/// ```text
/// let mut queue = DiagnosticQueue::new();
/// pass.check_conformance(&mut conformance); // reports into the queue
/// let sorted = queue.flush();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    /// Dedup keys of everything queued so far.
    seen: Vec<(ErrorCode, Option<Span>, String)>,
    /// Count of errors (not warnings/notes).
    error_count: usize,
    config: DiagnosticConfig,
}

impl Default for DiagnosticQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            seen: Vec::new(),
            error_count: 0,
            config,
        }
    }

    /// Add a diagnostic. Returns `false` if it was dropped as a duplicate
    /// or because the error limit was reached.
    pub fn add(&mut self, diagnostic: Diagnostic) -> bool {
        if diagnostic.is_error() && self.limit_reached() {
            return false;
        }
        if self.config.deduplicate {
            let key = (
                diagnostic.code,
                diagnostic.primary_span(),
                diagnostic.message.clone(),
            );
            if self.seen.contains(&key) {
                return false;
            }
            self.seen.push(key);
        }
        if diagnostic.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Queued diagnostics in report order.
    pub fn peek(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the queue, sorted by primary span; diagnostics without a span
    /// come last. Report order breaks ties.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.sort_by_key(|d| d.primary_span().map_or((1, 0, 0), |s| (0, s.start, s.end)));
        self.seen.clear();
        self.error_count = 0;
        out
    }
}

impl DiagnosticSink for DiagnosticQueue {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.add(diagnostic);
    }
}

#[cfg(test)]
mod tests;
