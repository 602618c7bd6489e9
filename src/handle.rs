//! The consumer side of a cell.
//!
//! A [`Handle`] is a unique, movable reference to the shared cell, from the
//! side that observes the outcome. It is consumed by whichever of these the
//! caller picks:
//!
//! - chaining a continuation (`map`, `then`, `map_reports`), which yields a
//!   new handle over the continuation's result
//! - installing a terminal `sink`
//! - blocking on [`Handle::wait`]
//! - `.await`, which bridges into any ambient async runtime
//!
//! Continuation methods take the produced values (or reports) as spread
//! arguments: a `Handle<(i32, i32)>` maps with `|a, b| a + b`.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};

use crate::cell::Cell;
use crate::error::Failure;
use crate::executor::{Executor, Inline};
use crate::handler::{
    ForwardHandler, Handler, MapHandler, MapReportsHandler, SinkHandler, ThenHandler,
};
use crate::slot::{Report, Slots};

/// The consumer side of a cell: observe the outcome or chain from it.
#[must_use = "a handle does nothing until a continuation is installed or it is waited on"]
pub struct Handle<L: Slots> {
    pub(crate) cell: Arc<Cell<L>>,
}

impl<L: Slots> Handle<L> {
    pub(crate) fn new(cell: Arc<Cell<L>>) -> Self {
        Self { cell }
    }

    /// Blocks until the outcome is available.
    ///
    /// Returns the produced values, or the failure token if any slot ended
    /// in error. With several errored slots the rightmost token wins.
    pub fn wait(self) -> Result<L::Output, Failure> {
        let shared = Arc::new((Mutex::new(None::<L::Reports>), Condvar::new()));
        let signal = Arc::clone(&shared);
        self.finish_sink(move |reports| {
            let (slot, ready) = &*signal;
            *slot.lock() = Some(reports);
            ready.notify_one();
        });

        let (slot, ready) = &*shared;
        let mut guard = slot.lock();
        while guard.is_none() {
            ready.wait(&mut guard);
        }
        let reports = guard.take().expect("woken without a deposit");
        match L::last_error(&reports) {
            Some(failure) => Err(failure),
            None => Ok(L::from_reports(reports).into_output()),
        }
    }

    /// Installs a value continuation built by the per-arity API methods.
    fn install_map<U, F, E>(self, exec: E, cb: F) -> Handle<(U,)>
    where
        U: Send + 'static,
        F: FnOnce(L) -> U + Send + 'static,
        E: Executor,
    {
        let dst = Cell::new();
        self.cell
            .install(Box::new(MapHandler::new(cb, Arc::clone(&dst), exec)));
        Handle::new(dst)
    }

    /// Installs a handle-returning continuation.
    fn install_then<M, F, E>(self, exec: E, cb: F) -> Handle<M>
    where
        M: Slots,
        F: FnOnce(L) -> Handle<M> + Send + 'static,
        E: Executor,
    {
        let dst = Cell::new();
        self.cell
            .install(Box::new(ThenHandler::new(cb, Arc::clone(&dst), exec)));
        Handle::new(dst)
    }

    /// Installs a report-visible continuation.
    fn install_map_reports<V, F, E>(self, exec: E, cb: F) -> Handle<(V,)>
    where
        V: Send + 'static,
        F: FnOnce(L::Reports) -> V + Send + 'static,
        E: Executor,
    {
        let dst = Cell::new();
        self.cell.install(Box::new(MapReportsHandler::new(
            cb,
            Arc::clone(&dst),
            exec,
        )));
        Handle::new(dst)
    }

    /// Installs a terminal sink over the raw reports tuple.
    pub(crate) fn finish_sink_on<F, E>(self, exec: E, cb: F)
    where
        F: FnOnce(L::Reports) + Send + 'static,
        E: Executor,
    {
        self.cell.install(Box::new(SinkHandler::new(cb, exec)));
    }

    /// `finish_sink_on` with inline dispatch; the internal workhorse.
    pub(crate) fn finish_sink<F>(self, cb: F)
    where
        F: FnOnce(L::Reports) + Send + 'static,
    {
        self.finish_sink_on(Inline, cb);
    }

    /// Subscribes this handle to feed another cell of the same shape.
    pub(crate) fn finish_into(self, dst: Arc<Cell<L>>) {
        self.cell.install(Box::new(ForwardHandler::new(dst)));
    }

    pub(crate) fn install_handler(self, handler: Box<dyn Handler<L>>) {
        self.cell.install(handler);
    }
}

macro_rules! impl_handle_api {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Send + 'static),+> Handle<($($name,)+)> {
            /// Runs `cb` with the produced values once they arrive; returns a
            /// handle to its result.
            ///
            /// Runs inline on whichever thread completes this handle, or on
            /// the current thread if the outcome is already in. On upstream
            /// failure `cb` is dropped uninvoked and the failure token passes
            /// through untouched; if the upstream finished with errored
            /// slots, the leftmost error is forwarded.
            pub fn map<R, F>(self, cb: F) -> Handle<(R,)>
            where
                R: Send + 'static,
                F: FnOnce($($name),+) -> R + Send + 'static,
            {
                self.map_on(Inline, cb)
            }

            /// [`map`](Self::map) with the callback scheduled on `exec`.
            pub fn map_on<R, F, E>(self, exec: E, cb: F) -> Handle<(R,)>
            where
                R: Send + 'static,
                F: FnOnce($($name),+) -> R + Send + 'static,
                E: Executor,
            {
                self.install_map(exec, move |values: ($($name,)+)| cb($(values.$idx),+))
            }

            /// Like [`map`](Self::map), but `cb` returns another handle; the
            /// result adopts that handle's eventual outcome.
            pub fn then<M, F>(self, cb: F) -> Handle<M>
            where
                M: Slots,
                F: FnOnce($($name),+) -> Handle<M> + Send + 'static,
            {
                self.then_on(Inline, cb)
            }

            /// [`then`](Self::then) with the callback scheduled on `exec`.
            pub fn then_on<M, F, E>(self, exec: E, cb: F) -> Handle<M>
            where
                M: Slots,
                F: FnOnce($($name),+) -> Handle<M> + Send + 'static,
                E: Executor,
            {
                self.install_then(exec, move |values: ($($name,)+)| cb($(values.$idx),+))
            }

            /// Runs `cb` with the per-slot reports, whatever the outcome was.
            ///
            /// This is the only continuation that can recover from upstream
            /// errors: each report is the slot's value or the failure token.
            pub fn map_reports<R, F>(self, cb: F) -> Handle<(R,)>
            where
                R: Send + 'static,
                F: FnOnce($(Report<$name>),+) -> R + Send + 'static,
            {
                self.map_reports_on(Inline, cb)
            }

            /// [`map_reports`](Self::map_reports) with the callback scheduled
            /// on `exec`.
            pub fn map_reports_on<R, F, E>(self, exec: E, cb: F) -> Handle<(R,)>
            where
                R: Send + 'static,
                F: FnOnce($(Report<$name>),+) -> R + Send + 'static,
                E: Executor,
            {
                self.install_map_reports(
                    exec,
                    move |reports: ($(Report<$name>,)+)| cb($(reports.$idx),+),
                )
            }

            /// Terminal observer: runs `cb` with the per-slot reports and
            /// ends the chain.
            pub fn sink<F>(self, cb: F)
            where
                F: FnOnce($(Report<$name>),+) + Send + 'static,
            {
                self.sink_on(Inline, cb);
            }

            /// [`sink`](Self::sink) with the callback scheduled on `exec`.
            pub fn sink_on<F, E>(self, exec: E, cb: F)
            where
                F: FnOnce($(Report<$name>),+) + Send + 'static,
                E: Executor,
            {
                self.finish_sink_on(exec, move |reports: ($(Report<$name>,)+)| {
                    cb($(reports.$idx),+);
                });
            }
        }
    };
}

impl_handle_api!(T0.0);
impl_handle_api!(T0.0, T1.1);
impl_handle_api!(T0.0, T1.1, T2.2);
impl_handle_api!(T0.0, T1.1, T2.2, T3.3);
impl_handle_api!(T0.0, T1.1, T2.2, T3.3, T4.4);
impl_handle_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5);
impl_handle_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6);
impl_handle_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6, T7.7);

/// Bridge state shared between the installed sink and the polled future.
struct BridgeState<L: Slots> {
    reports: Option<L::Reports>,
    waker: Option<Waker>,
}

/// Future returned by awaiting a [`Handle`].
#[must_use = "futures do nothing unless polled"]
pub struct HandleFuture<L: Slots> {
    shared: Arc<Mutex<BridgeState<L>>>,
}

impl<L: Slots> IntoFuture for Handle<L> {
    type Output = Result<L::Output, Failure>;
    type IntoFuture = HandleFuture<L>;

    /// Bridges the handle into ambient async: the returned future resolves
    /// once the producer deposits, under the same rightmost-error rule as
    /// [`Handle::wait`].
    fn into_future(self) -> HandleFuture<L> {
        let shared = Arc::new(Mutex::new(BridgeState {
            reports: None,
            waker: None,
        }));
        let signal = Arc::clone(&shared);
        self.finish_sink(move |reports| {
            let waker = {
                let mut state = signal.lock();
                state.reports = Some(reports);
                state.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        HandleFuture { shared }
    }
}

impl<L: Slots> Future for HandleFuture<L> {
    type Output = Result<L::Output, Failure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        if let Some(reports) = state.reports.take() {
            Poll::Ready(match L::last_error(&reports) {
                Some(failure) => Err(failure),
                None => Ok(L::from_reports(reports).into_output()),
            })
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{failed, ready, ready_reports};
    use crate::error::UnfulfilledPromise;
    use crate::executor::QueueExecutor;
    use crate::promise::pair;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn map_transforms_the_produced_value() {
        let (promise, handle) = pair::<(i32,)>();
        let mapped = handle.map(|x| x + 5);
        promise.fulfill(7);
        assert_eq!(mapped.wait().unwrap(), 12);
    }

    #[test]
    fn map_spreads_multiple_slots() {
        let (promise, handle) = pair::<(i32, i32)>();
        let summed = handle.map(|a, b| a + b);
        promise.fulfill((3, 4));
        assert_eq!(summed.wait().unwrap(), 7);
    }

    #[test]
    fn map_forwards_failure_without_invoking_the_callback() {
        let (promise, handle) = pair::<(i32,)>();
        let hits = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&hits);
        let mapped = handle.map(move |x| {
            count.fetch_add(1, Ordering::SeqCst);
            x * 2
        });

        let failure = Failure::msg("boom");
        promise.fail(failure.clone());

        let err = mapped.wait().unwrap_err();
        assert!(err.ptr_eq(&failure));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn map_over_finished_errors_forwards_the_leftmost() {
        let left = Failure::msg("left");
        let right = Failure::msg("right");
        let handle =
            ready_reports::<(i32, i32)>((Err(left.clone()), Err(right)));
        let err = handle.map(|a, b| a + b).wait().unwrap_err();
        assert!(err.ptr_eq(&left));
    }

    #[test]
    fn wait_reports_the_rightmost_error() {
        let left = Failure::msg("left");
        let right = Failure::msg("right");
        let handle = ready_reports::<(i32, i32)>((Err(left), Err(right.clone())));
        let err = handle.wait().unwrap_err();
        assert!(err.ptr_eq(&right));
    }

    #[test]
    fn map_reports_recovers_from_failure() {
        let (promise, handle) = pair::<(i32,)>();
        let recovered = handle.map_reports(|report| report.unwrap_or(0) + 1);
        promise.fail(Failure::msg("boom"));
        assert_eq!(recovered.wait().unwrap(), 1);
    }

    #[test]
    fn map_reports_sees_values_as_ok_reports() {
        let recovered = ready(41).map_reports(|report| report.unwrap() + 1);
        assert_eq!(recovered.wait().unwrap(), 42);
    }

    #[test]
    fn then_adopts_the_inner_outcome() {
        let (promise, handle) = pair::<(i32,)>();
        let chained = handle.then(|x| ready(x + 1));
        promise.fulfill(41);
        assert_eq!(chained.wait().unwrap(), 42);
    }

    #[test]
    fn then_adopts_a_pending_inner_handle() {
        let (outer_promise, outer) = pair::<(i32,)>();
        let (inner_promise, inner) = pair::<(String,)>();

        let chained = outer.then(move |x| {
            assert_eq!(x, 1);
            inner
        });
        outer_promise.fulfill(1);
        inner_promise.fulfill(String::from("late"));

        assert_eq!(chained.wait().unwrap(), "late");
    }

    #[test]
    fn then_forwards_upstream_failure() {
        let failure = Failure::msg("boom");
        let chained = failed::<(i32,)>(failure.clone()).then(|x| ready(x));
        assert!(chained.wait().unwrap_err().ptr_eq(&failure));
    }

    #[test]
    fn sink_receives_per_slot_reports() {
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        ready(9).sink(move |report| {
            *slot.lock() = Some(report.unwrap());
        });
        assert_eq!(*seen.lock(), Some(9));
    }

    #[test]
    fn callback_panic_fails_the_downstream_cell() {
        let mapped = ready(1).map(|_: i32| -> i32 { panic!("cb exploded") });
        let err = mapped.wait().unwrap_err();
        let panicked = err.downcast_ref::<crate::error::CallbackPanicked>().unwrap();
        assert_eq!(panicked.message, "cb exploded");
    }

    #[test]
    fn executor_variant_defers_until_drained() {
        let exec = QueueExecutor::new();
        let (promise, handle) = pair::<(i32,)>();
        let mapped = handle.map_on(exec.clone(), |x| x * 10);
        promise.fulfill(4);

        // The callback is queued, not run.
        assert_eq!(exec.len(), 1);
        assert_eq!(exec.run_pending(), 1);
        assert_eq!(mapped.wait().unwrap(), 40);
    }

    #[test]
    fn awaiting_a_handle_resolves_like_wait() {
        let (promise, handle) = pair::<(i32,)>();
        let future = handle.into_future();
        promise.fulfill(5);
        assert_eq!(futures::executor::block_on(future).unwrap(), 5);
    }

    #[test]
    fn awaiting_a_failed_handle_yields_the_token() {
        let failure = Failure::new(UnfulfilledPromise);
        let future = failed::<(i32,)>(failure.clone()).into_future();
        let err = futures::executor::block_on(future).unwrap_err();
        assert!(err.ptr_eq(&failure));
    }
}
