use super::*;
use pretty_assertions::assert_eq;

#[test]
fn builder_collects_parts() {
    let diag = Diagnostic::error(ErrorCode::E4001)
        .with_message("type `S` does not conform to protocol `P`")
        .with_label(Span::new(10, 20), "declared here")
        .with_secondary_label(Span::new(0, 5), "protocol declared here")
        .with_note("protocol requires method `f(x:)`");

    assert!(diag.is_error());
    assert_eq!(diag.primary_span(), Some(Span::new(10, 20)));
    assert_eq!(diag.labels.len(), 2);
    assert_eq!(diag.notes, vec!["protocol requires method `f(x:)`".to_owned()]);
}

#[test]
fn warnings_are_not_errors() {
    let diag = Diagnostic::warning(ErrorCode::W4001).with_message("near miss");
    assert!(!diag.is_error());
    assert_eq!(diag.primary_span(), None);
}

#[test]
fn display_renders_all_sections() {
    let diag = Diagnostic::error(ErrorCode::E4003)
        .with_message("argument labels do not match")
        .with_label(Span::new(1, 2), "here")
        .with_note("requirement is `f(x:)`")
        .with_suggestion(Suggestion::maybe_incorrect(
            "rename to `f(x:)`",
            Span::new(1, 2),
            "f(x:)",
        ));
    assert_eq!(
        diag.to_string(),
        "error [E4003]: argument labels do not match\n  --> 1..2: here\n  = note: requirement is `f(x:)`\n  = help: rename to `f(x:)`"
    );
    assert!(!diag.suggestions[0].is_text_only());
    assert!(Suggestion::text("x").is_text_only());
}
