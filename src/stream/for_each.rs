//! The per-item sink installed by `for_each`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::executor::Executor;
use crate::slot::Slots;

use super::cell::{CompletionGate, StreamSink};

/// Runs the user callback for every item, then settles the completion gate.
///
/// Each delivery is packaged as one executor task, so buffered and live
/// items alike are scheduled rather than run under the stream lock. The
/// callback sits behind a mutex to keep executor-scheduled deliveries
/// exclusive; a callback panic fails the completion gate and later items are
/// still delivered.
pub(crate) struct ForEachSink<F, E> {
    cb: Arc<Mutex<F>>,
    exec: E,
    gate: Arc<CompletionGate>,
}

impl<F, E> ForEachSink<F, E> {
    pub(crate) fn new(cb: F, exec: E, gate: Arc<CompletionGate>) -> Self {
        Self {
            cb: Arc::new(Mutex::new(cb)),
            exec,
            gate,
        }
    }
}

impl<L, F, E> StreamSink<L> for ForEachSink<F, E>
where
    L: Slots,
    F: FnMut(L) + Send + 'static,
    E: Executor,
{
    fn item(&mut self, values: L) {
        let cb = Arc::clone(&self.cb);
        let gate = Arc::clone(&self.gate);
        self.exec.submit(move || {
            let outcome = {
                let mut cb = cb.lock();
                catch_unwind(AssertUnwindSafe(|| (*cb)(values)))
            };
            if let Err(payload) = outcome {
                gate.fail(Failure::from_panic(payload));
            }
        });
    }

    fn complete(self: Box<Self>) {
        let gate = Arc::clone(&self.gate);
        self.exec.submit(move || gate.fulfill());
    }

    fn fail(self: Box<Self>, failure: Failure) {
        let gate = Arc::clone(&self.gate);
        self.exec.submit(move || gate.fail(failure));
    }
}
