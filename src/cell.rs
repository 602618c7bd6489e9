//! The shared state machine backing one promise/handle pair.
//!
//! A cell moves through exactly one of two lives:
//!
//! ```text
//! empty ── install ──▶ armed ──(deposit handed to the handler)──▶ spent
//! empty ── deposit ──▶ values | reports | failed ── install ──▶ spent
//! ```
//!
//! Whichever side loses the producer/consumer race leaves its payload in the
//! cell; the winner takes it and dispatches. The mutex is held only across
//! the phase inspection and the content move, never across a handler call.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::handler::Handler;
use crate::slot::Slots;

/// Phase and payload as one tagged union.
enum Contents<L: Slots> {
    /// No deposit and no continuation yet.
    Empty,
    /// A continuation is installed and waiting for the deposit.
    Armed(Box<dyn Handler<L>>),
    /// Produced values deposited before any continuation arrived.
    Values(L),
    /// Per-slot reports deposited before any continuation arrived.
    Reports(L::Reports),
    /// Failure deposited before any continuation arrived.
    Failed(Failure),
    /// Terminal: the payload has been moved out and dispatched.
    Spent,
}

/// The shared state for one promise/handle pair. Both sides hold an `Arc`;
/// the cell dies when the last side drops.
pub(crate) struct Cell<L: Slots> {
    contents: Mutex<Contents<L>>,
}

impl<L: Slots> Cell<L> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            contents: Mutex::new(Contents::Empty),
        })
    }

    /// Producer deposit of the produced tuple.
    ///
    /// If a continuation is armed it is dispatched on this thread, after the
    /// lock is released.
    pub(crate) fn fulfill(&self, values: L) {
        let mut guard = self.contents.lock();
        match mem::replace(&mut *guard, Contents::Spent) {
            Contents::Empty => *guard = Contents::Values(values),
            Contents::Armed(handler) => {
                drop(guard);
                handler.fulfill(values);
            }
            _ => panic!("result cell completed twice"),
        }
    }

    /// Producer deposit of per-slot reports.
    pub(crate) fn finish(&self, reports: L::Reports) {
        let mut guard = self.contents.lock();
        match mem::replace(&mut *guard, Contents::Spent) {
            Contents::Empty => *guard = Contents::Reports(reports),
            Contents::Armed(handler) => {
                drop(guard);
                handler.finish(reports);
            }
            _ => panic!("result cell completed twice"),
        }
    }

    /// Producer deposit of a failure covering every slot.
    pub(crate) fn fail(&self, failure: Failure) {
        let mut guard = self.contents.lock();
        match mem::replace(&mut *guard, Contents::Spent) {
            Contents::Empty => *guard = Contents::Failed(failure),
            Contents::Armed(handler) => {
                drop(guard);
                handler.fail(failure);
            }
            _ => panic!("result cell completed twice"),
        }
    }

    /// Consumer installation of a continuation.
    ///
    /// If a deposit already happened the handler is dispatched immediately on
    /// this thread and never stored.
    pub(crate) fn install(&self, handler: Box<dyn Handler<L>>) {
        let mut guard = self.contents.lock();
        match mem::replace(&mut *guard, Contents::Spent) {
            Contents::Empty => *guard = Contents::Armed(handler),
            Contents::Values(values) => {
                drop(guard);
                handler.fulfill(values);
            }
            Contents::Reports(reports) => {
                drop(guard);
                handler.finish(reports);
            }
            Contents::Failed(failure) => {
                drop(guard);
                handler.fail(failure);
            }
            Contents::Armed(_) | Contents::Spent => {
                panic!("continuation installed twice on one cell")
            }
        }
    }
}
