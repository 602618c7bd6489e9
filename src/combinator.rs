//! Cell-to-cell combinators and pre-completed handles.
//!
//! Everything here builds a fresh cell and wires existing handles (or a
//! computation on an executor) into it:
//!
//! - [`ready`] / [`ready_reports`] / [`failed`]: handles whose outcome is
//!   already deposited
//! - [`spawn_on`]: run a closure on an executor, observe its result
//! - [`fan_in`]: merge independent handles into one handle over all of their
//!   outputs
//! - [`flatten`]: turn a handle carrying one tuple slot into a handle over
//!   the tuple's own slots

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cell::Cell;
use crate::error::Failure;
use crate::executor::Executor;
use crate::handle::Handle;
use crate::handler::FlattenHandler;
use crate::slot::{Report, Slots};

/// Handle already fulfilled with `value`.
///
/// ```
/// use polyfuture::ready;
///
/// assert_eq!(ready(7).map(|x| x + 5).wait().unwrap(), 12);
/// ```
#[must_use]
pub fn ready<T: Send + 'static>(value: T) -> Handle<(T,)> {
    let cell = Cell::new();
    cell.fulfill((value,));
    Handle::new(cell)
}

/// Handle already finished with the given per-slot reports.
#[must_use]
pub fn ready_reports<L: Slots>(reports: L::Reports) -> Handle<L> {
    let cell = Cell::new();
    cell.finish(reports);
    Handle::new(cell)
}

/// Handle already failed with `failure` on every slot.
#[must_use]
pub fn failed<L: Slots>(failure: Failure) -> Handle<L> {
    let cell = Cell::new();
    cell.fail(failure);
    Handle::new(cell)
}

/// Schedules `f` on `exec` and returns a handle to its result.
///
/// The handle fulfills with the closure's return value, or fails with
/// [`CallbackPanicked`](crate::error::CallbackPanicked) if the closure
/// panics.
pub fn spawn_on<E, F, R>(exec: &E, f: F) -> Handle<(R,)>
where
    E: Executor,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let cell = Cell::new();
    let dst = Arc::clone(&cell);
    exec.submit(move || match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => dst.fulfill((value,)),
        Err(payload) => dst.fail(Failure::from_panic(payload)),
    });
    Handle::new(cell)
}

/// Turns a handle carrying one tuple slot into a handle over that tuple's
/// own slots.
#[must_use]
pub fn flatten<M: Slots>(handle: Handle<(M,)>) -> Handle<M> {
    let cell = Cell::new();
    handle.install_handler(Box::new(FlattenHandler::new(Arc::clone(&cell))));
    Handle::new(cell)
}

/// A group of handles that can merge into one.
///
/// Implemented for tuples of two to eight handles of any shapes. The merged
/// handle carries one slot per input, holding that input's edge-shaped
/// output; a multi-slot input collapses into its slot with the leftmost
/// error winning.
pub trait FanIn {
    /// Slot list of the merged handle.
    type Merged: Slots;

    /// Consumes the group, returning the merged handle.
    fn fan_in(self) -> Handle<Self::Merged>;
}

/// Merges independent handles into one handle over all of their outputs.
///
/// The merged cell finishes exactly when every input has resolved; each
/// input's outcome lands in its own slot, so one failure does not hide its
/// siblings' values.
///
/// ```
/// use polyfuture::{fan_in, ready};
///
/// let merged = fan_in((ready(1), ready(2), ready(3)));
/// assert_eq!(merged.wait().unwrap(), (1, 2, 3));
/// ```
#[must_use]
pub fn fan_in<G: FanIn>(group: G) -> Handle<G::Merged> {
    group.fan_in()
}

/// One arrival sheet shared by every input of a `fan_in`.
///
/// Slots are written independently; the arrival counter's final increment
/// publishes them all to whichever input observes the full count.
struct Landing<S> {
    slots: S,
    arrived: AtomicUsize,
}

/// Per-arity collection of the landed reports, called by the last arrival.
trait Gather {
    type Reports;
    fn gather(&self) -> Self::Reports;
}

macro_rules! impl_fan_in {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Send + 'static),+> Gather for ($(Mutex<Option<Report<$name>>>,)+) {
            type Reports = ($(Report<$name>,)+);

            fn gather(&self) -> Self::Reports {
                ($(self.$idx.lock().take().expect("fan-in landing slot empty"),)+)
            }
        }

        impl<$($name: Slots),+> FanIn for ($(Handle<$name>,)+) {
            type Merged = ($($name::Output,)+);

            fn fan_in(self) -> Handle<Self::Merged> {
                let total = [$(stringify!($name)),+].len();
                let dst = Cell::new();
                let landing = Arc::new(Landing {
                    slots: ($(Mutex::new(None::<Report<$name::Output>>),)+),
                    arrived: AtomicUsize::new(0),
                });
                $(
                    {
                        let landing = Arc::clone(&landing);
                        let dst = Arc::clone(&dst);
                        self.$idx.finish_sink(move |reports| {
                            *landing.slots.$idx.lock() =
                                Some(<$name as Slots>::collapse(reports));
                            if landing.arrived.fetch_add(1, Ordering::AcqRel) + 1 == total {
                                dst.finish(landing.slots.gather());
                            }
                        });
                    }
                )+
                Handle::new(dst)
            }
        }
    };
}

impl_fan_in!(T0.0, T1.1);
impl_fan_in!(T0.0, T1.1, T2.2);
impl_fan_in!(T0.0, T1.1, T2.2, T3.3);
impl_fan_in!(T0.0, T1.1, T2.2, T3.3, T4.4);
impl_fan_in!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5);
impl_fan_in!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6);
impl_fan_in!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6, T7.7);
