//! Diagnostic system for conformance errors.
//!
//! Every diagnostic carries:
//! - An error code for searchability
//! - A message saying what went wrong
//! - A primary span saying where
//! - Context labels and notes saying why
//! - Suggestions saying how to fix it
//!
//! Rendering is out of scope; producers hand diagnostics to a
//! [`DiagnosticSink`], and [`queue::DiagnosticQueue`] is the sink drivers
//! use to deduplicate and order them.

mod diagnostic;
mod error_code;
pub mod queue;
mod sink;

pub use diagnostic::{Applicability, Diagnostic, Label, Severity, Substitution, Suggestion};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
pub use sink::DiagnosticSink;
