//! Thin `tracing` wrapper, mirroring the teacher's optional `trace`/`logging`
//! feature split. Never required for correctness — every call site here is
//! a no-op when the `trace` feature is off.

/// Enters a `debug`-level span for a mutating operation once its
/// `(context, subject)` are known, matching the fields a transport would
/// want correlated against an incoming request. The returned guard keeps
/// the span open for the caller's scope.
#[cfg(feature = "trace")]
pub fn mutation_span(op: &str, context: &str, subject: &str) -> trace::span::EnteredSpan {
    trace::debug_span!("registry_mutation", op, context, subject).entered()
}

#[cfg(not(feature = "trace"))]
pub fn mutation_span(_op: &str, _context: &str, _subject: &str) {}

/// Records a `PolicyResolver` gate decision at `debug` level.
#[cfg(feature = "trace")]
pub fn gate_decision(op: &str, mode: &str, allowed: bool) {
    trace::debug!(op, mode, allowed, "policy gate decision");
}

#[cfg(not(feature = "trace"))]
pub fn gate_decision(_op: &str, _mode: &str, _allowed: bool) {}
