//! The opaque error token and the library's own error types.
//!
//! Errors travel through cell chains as a [`Failure`]: a cheaply-cloneable,
//! shareable wrapper over some concrete [`std::error::Error`]. Cloning a
//! `Failure` preserves identity, so the token observed at the end of a `map`
//! chain is the same token the producer deposited ([`Failure::ptr_eq`]).

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Raised onto a cell when its producer side is dropped without depositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("promise dropped before depositing a result")]
pub struct UnfulfilledPromise;

/// Raised onto the downstream cell when a continuation callback panics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("continuation callback panicked: {message}")]
pub struct CallbackPanicked {
    /// Panic message, when the payload was a string.
    pub message: String,
}

/// The opaque, transportable error token carried through cell chains.
///
/// A `Failure` wraps an arbitrary error behind an `Arc`, so propagating it
/// through any number of continuations is a pointer copy and never loses the
/// original. Recover the concrete type with [`Failure::downcast_ref`].
#[derive(Clone)]
pub struct Failure(Arc<dyn StdError + Send + Sync>);

impl Failure {
    /// Wraps a concrete error into a token.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// Token carrying just a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Converts a caught panic payload into a token.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::new(CallbackPanicked {
            message: panic_message(payload.as_ref()),
        })
    }

    /// True if both tokens share one underlying error allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// True if the wrapped error is an `E`.
    #[must_use]
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Borrows the wrapped error as a concrete `E`, if it is one.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Borrows the wrapped error.
    #[must_use]
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref() as _)
    }
}

impl From<UnfulfilledPromise> for Failure {
    fn from(err: UnfulfilledPromise) -> Self {
        Self::new(err)
    }
}

/// Plain-text error used by [`Failure::msg`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_preserves_identity() {
        let failure = Failure::msg("boom");
        let copy = failure.clone();
        assert!(failure.ptr_eq(&copy));
    }

    #[test]
    fn distinct_tokens_are_not_equal() {
        let a = Failure::msg("boom");
        let b = Failure::msg("boom");
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn downcast_recovers_concrete_error() {
        let failure = Failure::new(UnfulfilledPromise);
        assert!(failure.is::<UnfulfilledPromise>());
        assert_eq!(
            failure.downcast_ref::<UnfulfilledPromise>(),
            Some(&UnfulfilledPromise)
        );
        assert!(!failure.is::<CallbackPanicked>());
    }

    #[test]
    fn get_ref_exposes_the_wrapped_error() {
        let failure = Failure::new(UnfulfilledPromise);
        let inner = failure.get_ref();
        assert_eq!(
            inner.to_string(),
            "promise dropped before depositing a result"
        );
        assert!(inner.downcast_ref::<UnfulfilledPromise>().is_some());
    }

    #[test]
    fn display_forwards_to_inner() {
        let failure = Failure::msg("disk on fire");
        assert_eq!(failure.to_string(), "disk on fire");
        assert_eq!(
            Failure::new(UnfulfilledPromise).to_string(),
            "promise dropped before depositing a result"
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("static str panic");
        assert_eq!(
            Failure::from_panic(boxed).to_string(),
            "continuation callback panicked: static str panic"
        );

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned panic"));
        assert_eq!(
            Failure::from_panic(boxed).to_string(),
            "continuation callback panicked: owned panic"
        );

        let boxed: Box<dyn Any + Send> = Box::new(42_u32);
        let failure = Failure::from_panic(boxed);
        let panicked = failure.downcast_ref::<CallbackPanicked>().unwrap();
        assert_eq!(panicked.message, "non-string panic payload");
    }
}
