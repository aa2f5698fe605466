//! Stack safety for nested conformance checks.
//!
//! Checking one conformance can require checking another (associated-type
//! bounds, derivation preconditions), so deep generic nesting recurses
//! through the pass. The recursive edge grows the stack on demand.

/// Minimum stack space (in bytes) to keep available.
const RED_ZONE: usize = 100 * 1024;

/// Stack space (in bytes) to allocate when growing.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
