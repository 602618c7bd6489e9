//! Continuation handlers installed on cells.
//!
//! A handler is what a cell stores while armed: the user callback, the
//! executor it should run on, and (except for sinks) the downstream cell the
//! result flows into. Each handler implements the three dispatch paths and
//! converts its input to the shape its callback expects:
//!
//! - produced values wrap into all-`Ok` reports
//! - checked reports unwrap into produced values
//! - a lone failure broadcasts into every report slot
//!
//! With an executor present, the conversion, the callback, and the downstream
//! propagation are packaged as a single submitted task. Callback panics are
//! caught and become the downstream failure; a sink panic goes to the ambient
//! lost-error policy instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::cell::Cell;
use crate::error::Failure;
use crate::executor::Executor;
use crate::handle::Handle;
use crate::policy;
use crate::slot::Slots;

/// A continuation installed on a cell. Exactly one path runs, exactly once.
pub(crate) trait Handler<L: Slots>: Send {
    /// The cell completed with produced values.
    fn fulfill(self: Box<Self>, values: L);

    /// The cell completed with per-slot reports, zero or more in error.
    fn finish(self: Box<Self>, reports: L::Reports);

    /// The cell failed outright.
    fn fail(self: Box<Self>, failure: Failure);
}

/// Value-returning continuation. On clean input runs the callback and
/// fulfills the downstream cell; on any error forwards the token without
/// invoking the callback.
pub(crate) struct MapHandler<F, E, U: Send + 'static> {
    cb: F,
    dst: Arc<Cell<(U,)>>,
    exec: E,
}

impl<F, E, U: Send + 'static> MapHandler<F, E, U> {
    pub(crate) fn new(cb: F, dst: Arc<Cell<(U,)>>, exec: E) -> Self {
        Self { cb, dst, exec }
    }
}

impl<L, F, E, U> Handler<L> for MapHandler<F, E, U>
where
    L: Slots,
    F: FnOnce(L) -> U + Send + 'static,
    E: Executor,
    U: Send + 'static,
{
    fn fulfill(self: Box<Self>, values: L) {
        let Self { cb, dst, exec } = *self;
        exec.submit(move || match catch_unwind(AssertUnwindSafe(|| cb(values))) {
            Ok(value) => dst.fulfill((value,)),
            Err(payload) => dst.fail(Failure::from_panic(payload)),
        });
    }

    fn finish(self: Box<Self>, reports: L::Reports) {
        match L::first_error(&reports) {
            Some(failure) => self.fail(failure),
            None => self.fulfill(L::from_reports(reports)),
        }
    }

    fn fail(self: Box<Self>, failure: Failure) {
        // The callback is dropped uninvoked; the token passes through as-is.
        let Self { dst, exec, .. } = *self;
        exec.submit(move || dst.fail(failure));
    }
}

/// Handle-returning continuation. The returned handle is subscribed to
/// forward its outcome into the downstream cell, which the forwarder owns
/// and keeps alive.
pub(crate) struct ThenHandler<F, E, M: Slots> {
    cb: F,
    dst: Arc<Cell<M>>,
    exec: E,
}

impl<F, E, M: Slots> ThenHandler<F, E, M> {
    pub(crate) fn new(cb: F, dst: Arc<Cell<M>>, exec: E) -> Self {
        Self { cb, dst, exec }
    }
}

impl<L, F, E, M> Handler<L> for ThenHandler<F, E, M>
where
    L: Slots,
    M: Slots,
    F: FnOnce(L) -> Handle<M> + Send + 'static,
    E: Executor,
{
    fn fulfill(self: Box<Self>, values: L) {
        let Self { cb, dst, exec } = *self;
        exec.submit(move || match catch_unwind(AssertUnwindSafe(|| cb(values))) {
            Ok(inner) => inner.finish_into(dst),
            Err(payload) => dst.fail(Failure::from_panic(payload)),
        });
    }

    fn finish(self: Box<Self>, reports: L::Reports) {
        match L::first_error(&reports) {
            Some(failure) => self.fail(failure),
            None => self.fulfill(L::from_reports(reports)),
        }
    }

    fn fail(self: Box<Self>, failure: Failure) {
        let Self { dst, exec, .. } = *self;
        exec.submit(move || dst.fail(failure));
    }
}

/// Report-visible continuation. The callback always runs, whatever the
/// upstream outcome; turning errors back into values is its business.
pub(crate) struct MapReportsHandler<F, E, V: Send + 'static> {
    cb: F,
    dst: Arc<Cell<(V,)>>,
    exec: E,
}

impl<F, E, V: Send + 'static> MapReportsHandler<F, E, V> {
    pub(crate) fn new(cb: F, dst: Arc<Cell<(V,)>>, exec: E) -> Self {
        Self { cb, dst, exec }
    }
}

impl<L, F, E, V> Handler<L> for MapReportsHandler<F, E, V>
where
    L: Slots,
    F: FnOnce(L::Reports) -> V + Send + 'static,
    E: Executor,
    V: Send + 'static,
{
    fn fulfill(self: Box<Self>, values: L) {
        <Self as Handler<L>>::finish(self, values.into_reports());
    }

    fn finish(self: Box<Self>, reports: L::Reports) {
        let Self { cb, dst, exec } = *self;
        exec.submit(move || match catch_unwind(AssertUnwindSafe(|| cb(reports))) {
            Ok(value) => dst.fulfill((value,)),
            Err(payload) => dst.fail(Failure::from_panic(payload)),
        });
    }

    fn fail(self: Box<Self>, failure: Failure) {
        let reports = L::broadcast(&failure);
        <Self as Handler<L>>::finish(self, reports);
    }
}

/// Terminal continuation. Receives the reports and ends the chain; a panic
/// inside the callback has no downstream and goes to the ambient policy.
pub(crate) struct SinkHandler<F, E> {
    cb: F,
    exec: E,
}

impl<F, E> SinkHandler<F, E> {
    pub(crate) fn new(cb: F, exec: E) -> Self {
        Self { cb, exec }
    }
}

impl<L, F, E> Handler<L> for SinkHandler<F, E>
where
    L: Slots,
    F: FnOnce(L::Reports) + Send + 'static,
    E: Executor,
{
    fn fulfill(self: Box<Self>, values: L) {
        <Self as Handler<L>>::finish(self, values.into_reports());
    }

    fn finish(self: Box<Self>, reports: L::Reports) {
        let Self { cb, exec } = *self;
        exec.submit(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cb(reports))) {
                policy::lost_error(&Failure::from_panic(payload));
            }
        });
    }

    fn fail(self: Box<Self>, failure: Failure) {
        let reports = L::broadcast(&failure);
        <Self as Handler<L>>::finish(self, reports);
    }
}

/// Forwards whatever arrives into another cell of the same shape. Used to
/// late-bind one cell's outcome to another (`fulfill_from`, `then`).
pub(crate) struct ForwardHandler<L: Slots> {
    dst: Arc<Cell<L>>,
}

impl<L: Slots> ForwardHandler<L> {
    pub(crate) fn new(dst: Arc<Cell<L>>) -> Self {
        Self { dst }
    }
}

impl<L: Slots> Handler<L> for ForwardHandler<L> {
    fn fulfill(self: Box<Self>, values: L) {
        self.dst.fulfill(values);
    }

    fn finish(self: Box<Self>, reports: L::Reports) {
        self.dst.finish(reports);
    }

    fn fail(self: Box<Self>, failure: Failure) {
        self.dst.fail(failure);
    }
}

/// Unpacks a single tuple slot into a cell over the tuple's own slots.
pub(crate) struct FlattenHandler<M: Slots> {
    dst: Arc<Cell<M>>,
}

impl<M: Slots> FlattenHandler<M> {
    pub(crate) fn new(dst: Arc<Cell<M>>) -> Self {
        Self { dst }
    }
}

impl<M: Slots> Handler<(M,)> for FlattenHandler<M> {
    fn fulfill(self: Box<Self>, values: (M,)) {
        self.dst.fulfill(values.0);
    }

    fn finish(self: Box<Self>, reports: <(M,) as Slots>::Reports) {
        match reports.0 {
            Ok(values) => self.dst.fulfill(values),
            Err(failure) => self.dst.fail(failure),
        }
    }

    fn fail(self: Box<Self>, failure: Failure) {
        self.dst.fail(failure);
    }
}
