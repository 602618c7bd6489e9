//! The producer side of a cell.
//!
//! A [`Promise`] deposits exactly one outcome. Every deposit method consumes
//! the promise, so double deposits are unrepresentable; dropping a promise
//! that never deposited fails the cell with [`UnfulfilledPromise`], so a
//! consumer is never left waiting on a producer that went away.

use std::sync::Arc;

use crate::cell::Cell;
use crate::error::{Failure, UnfulfilledPromise};
use crate::handle::Handle;
use crate::slot::Slots;

/// The producer side of a cell: deposit values, reports, or a failure.
#[must_use = "dropping a promise without depositing fails its handle"]
pub struct Promise<L: Slots> {
    cell: Option<Arc<Cell<L>>>,
    handle_taken: bool,
}

impl<L: Slots> Promise<L> {
    /// Creates a promise with no consumer attached yet.
    pub fn new() -> Self {
        Self {
            cell: Some(Cell::new()),
            handle_taken: false,
        }
    }

    /// Returns the consumer handle. Single-use.
    ///
    /// # Panics
    ///
    /// Panics if called a second time, or after the promise deposited.
    pub fn handle(&mut self) -> Handle<L> {
        assert!(!self.handle_taken, "promise handle taken twice");
        self.handle_taken = true;
        Handle::new(Arc::clone(
            self.cell.as_ref().expect("promise already completed"),
        ))
    }

    /// Deposits the produced values.
    ///
    /// Any installed continuation dispatches on this thread before the call
    /// returns (possibly via its executor).
    pub fn fulfill(mut self, values: L::Output) {
        self.take_cell().fulfill(L::from_output(values));
    }

    /// Deposits per-slot reports, any mix of values and errors.
    pub fn finish(mut self, reports: L::Reports) {
        self.take_cell().finish(reports);
    }

    /// Fails every slot with `failure`.
    pub fn fail(mut self, failure: Failure) {
        self.take_cell().fail(failure);
    }

    /// Completes this promise with whatever `other` eventually carries.
    ///
    /// Turns a late-bound upstream into an ordinary deposit: once `other`
    /// resolves, its reports land here as a `finish`.
    pub fn fulfill_from(mut self, other: Handle<L>) {
        other.finish_into(self.take_cell());
    }

    /// True while this promise can still deposit.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.cell.is_some()
    }

    fn take_cell(&mut self) -> Arc<Cell<L>> {
        self.cell.take().expect("promise already completed")
    }
}

impl<L: Slots> Default for Promise<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Slots> Drop for Promise<L> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            tracing::debug!("promise dropped before depositing; failing its cell");
            cell.fail(Failure::new(UnfulfilledPromise));
        }
    }
}

/// Creates a connected promise/handle pair.
#[must_use]
pub fn pair<L: Slots>() -> (Promise<L>, Handle<L>) {
    let mut promise = Promise::new();
    let handle = promise.handle();
    (promise, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::ready;
    use crate::slot::Report;
    use parking_lot::Mutex;

    #[test]
    fn fulfill_reaches_the_handle() {
        let (promise, handle) = pair::<(i32,)>();
        promise.fulfill(7);
        assert_eq!(handle.wait().unwrap(), 7);
    }

    #[test]
    fn finish_carries_mixed_reports() {
        let (promise, handle) = pair::<(i32, i32)>();
        let failure = Failure::msg("half broken");
        promise.finish((Ok(1), Err(failure.clone())));

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        handle.sink(move |a: Report<i32>, b: Report<i32>| {
            *slot.lock() = Some((a.unwrap(), b.unwrap_err()));
        });

        let guard = seen.lock();
        let (value, err) = guard.as_ref().unwrap();
        assert_eq!(*value, 1);
        assert!(err.ptr_eq(&failure));
    }

    #[test]
    fn dropping_an_unfulfilled_promise_fails_the_handle() {
        let (promise, handle) = pair::<(i32,)>();
        drop(promise);
        let err = handle.wait().unwrap_err();
        assert!(err.is::<UnfulfilledPromise>());
    }

    #[test]
    fn fulfill_from_adopts_the_other_outcome() {
        let (promise, handle) = pair::<(i32,)>();
        promise.fulfill_from(ready(33));
        assert_eq!(handle.wait().unwrap(), 33);
    }

    #[test]
    fn fulfill_from_adopts_a_late_failure() {
        let (promise, handle) = pair::<(i32,)>();
        let (other_promise, other_handle) = pair::<(i32,)>();
        promise.fulfill_from(other_handle);

        let failure = Failure::msg("late boom");
        other_promise.fail(failure.clone());
        assert!(handle.wait().unwrap_err().ptr_eq(&failure));
    }

    #[test]
    fn is_live_while_no_deposit_has_happened() {
        let mut promise = Promise::<(i32,)>::new();
        assert!(promise.is_live());
        let _handle = promise.handle();
        assert!(promise.is_live());
        promise.fulfill(1);
    }

    #[test]
    #[should_panic(expected = "promise handle taken twice")]
    fn taking_the_handle_twice_is_a_contract_violation() {
        let mut promise = Promise::<(i32,)>::new();
        let _first = promise.handle();
        let _second = promise.handle();
    }

    #[test]
    fn unit_slots_fulfill_with_unit() {
        let (promise, handle) = pair::<((),)>();
        promise.fulfill(());
        handle.wait().unwrap();
    }
}
