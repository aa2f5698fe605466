use super::*;
use pretty_assertions::assert_eq;

fn error_at(start: u32, message: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4001)
        .with_message(message)
        .with_label(Span::new(start, start + 1), "here")
}

#[test]
fn flush_sorts_by_span() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    queue.report(error_at(30, "c"));
    queue.report(Diagnostic::warning(ErrorCode::W4001).with_message("no span"));
    queue.report(error_at(10, "a"));
    queue.report(error_at(20, "b"));

    let messages: Vec<String> = queue.flush().into_iter().map(|d| d.message).collect();
    assert_eq!(messages, vec!["a", "b", "c", "no span"]);
    assert!(queue.is_empty());
}

#[test]
fn deduplicates_identical_diagnostics() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.add(error_at(5, "same")));
    assert!(!queue.add(error_at(5, "same")));
    assert!(queue.add(error_at(6, "same")));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn error_limit_drops_errors_but_keeps_warnings() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 1,
        deduplicate: false,
    });
    assert!(queue.add(error_at(1, "first")));
    assert!(queue.limit_reached());
    assert!(!queue.add(error_at(2, "second")));
    assert!(queue.add(Diagnostic::warning(ErrorCode::W4002).with_message("warn")));
    assert_eq!(queue.peek().len(), 2);
    assert!(queue.has_errors());
}
