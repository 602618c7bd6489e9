//! Process-wide policy for errors that reach a terminal sink.
//!
//! A [`sink`](crate::handle::Handle::sink) has no downstream cell, so an
//! error raised inside its callback has nowhere to propagate. Rather than
//! silently discarding it, the library routes it through a configurable
//! ambient hook.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::Failure;

/// What to do with an error that a terminal sink would otherwise swallow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LostErrorPolicy {
    /// Discard the error.
    Ignore = 0,
    /// Emit a `tracing` warning carrying the error.
    #[default]
    Log = 1,
    /// Abort the process.
    Abort = 2,
}

static POLICY: AtomicU8 = AtomicU8::new(LostErrorPolicy::Log as u8);

/// Replaces the ambient lost-error policy for the whole process.
pub fn set_lost_error_policy(policy: LostErrorPolicy) {
    POLICY.store(policy as u8, Ordering::Relaxed);
}

/// Returns the ambient lost-error policy currently in effect.
#[must_use]
pub fn lost_error_policy() -> LostErrorPolicy {
    match POLICY.load(Ordering::Relaxed) {
        0 => LostErrorPolicy::Ignore,
        2 => LostErrorPolicy::Abort,
        _ => LostErrorPolicy::Log,
    }
}

/// Applies the ambient policy to an error with no remaining observer.
pub(crate) fn lost_error(failure: &Failure) {
    match lost_error_policy() {
        LostErrorPolicy::Ignore => {}
        LostErrorPolicy::Log => {
            tracing::warn!(error = %failure, "error swallowed by terminal sink");
        }
        LostErrorPolicy::Abort => std::process::abort(),
    }
}
