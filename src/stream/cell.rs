//! Stream storage: the buffer, the item sink, and the delivery pump.
//!
//! Items pushed before a consumer subscribes accumulate in a FIFO buffer
//! (inline for the first few). Once a sink is installed, a single pump
//! drains buffered items strictly in push order and then delivers live; the
//! lock is dropped around every sink call, so callbacks may push more items
//! without deadlocking, and a late termination is observed only after the
//! buffer is empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::cell::Cell;
use crate::error::Failure;
use crate::slot::Slots;

/// Per-item continuation installed by `for_each`.
pub(crate) trait StreamSink<L: Slots>: Send {
    /// One produced item, delivered in push order.
    fn item(&mut self, values: L);

    /// The producer signalled a clean end of stream.
    fn complete(self: Box<Self>);

    /// The producer failed the stream.
    fn fail(self: Box<Self>, failure: Failure);
}

/// How the producer ended the stream.
enum Termination {
    Complete,
    Failed(Failure),
}

struct StreamInner<L: Slots> {
    /// Items awaiting delivery, in push order.
    buffer: SmallVec<[L; 4]>,
    sink: Option<Box<dyn StreamSink<L>>>,
    termination: Option<Termination>,
    /// True while one thread drives deliveries; others just enqueue.
    pumping: bool,
}

/// Funnels terminations into the completion cell exactly once.
///
/// Normal completion and an item-callback panic can race; whichever settles
/// the gate first wins and the other is dropped.
pub(crate) struct CompletionGate {
    cell: Arc<Cell<((),)>>,
    sent: AtomicBool,
}

impl CompletionGate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cell: Cell::new(),
            sent: AtomicBool::new(false),
        })
    }

    pub(crate) fn cell(&self) -> &Arc<Cell<((),)>> {
        &self.cell
    }

    pub(crate) fn fulfill(&self) {
        if !self.sent.swap(true, Ordering::AcqRel) {
            self.cell.fulfill(((),));
        }
    }

    pub(crate) fn fail(&self, failure: Failure) {
        if !self.sent.swap(true, Ordering::AcqRel) {
            self.cell.fail(failure);
        }
    }
}

/// Shared state of one stream pair.
pub(crate) struct StreamCell<L: Slots> {
    inner: Mutex<StreamInner<L>>,
    gate: Arc<CompletionGate>,
}

impl<L: Slots> StreamCell<L> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(StreamInner {
                buffer: SmallVec::new(),
                sink: None,
                termination: None,
                pumping: false,
            }),
            gate: CompletionGate::new(),
        })
    }

    pub(crate) fn gate(&self) -> &Arc<CompletionGate> {
        &self.gate
    }

    /// Producer push. Buffers when no sink is installed or while another
    /// delivery is in flight; the pump preserves push order either way.
    pub(crate) fn push(&self, values: L) {
        {
            let mut inner = self.inner.lock();
            assert!(
                inner.termination.is_none(),
                "push after stream termination"
            );
            inner.buffer.push(values);
        }
        self.pump();
    }

    pub(crate) fn complete(&self) {
        self.terminate(Termination::Complete);
    }

    pub(crate) fn fail(&self, failure: Failure) {
        self.terminate(Termination::Failed(failure));
    }

    fn terminate(&self, termination: Termination) {
        {
            let mut inner = self.inner.lock();
            assert!(inner.termination.is_none(), "stream terminated twice");
            inner.termination = Some(termination);
        }
        self.pump();
    }

    /// Consumer subscription; drains anything buffered, then goes live.
    pub(crate) fn subscribe(&self, sink: Box<dyn StreamSink<L>>) {
        {
            let mut inner = self.inner.lock();
            assert!(inner.sink.is_none(), "stream subscribed twice");
            inner.sink = Some(sink);
        }
        self.pump();
    }

    /// Drives deliveries in push order. Only one thread pumps at a time.
    fn pump(&self) {
        let mut inner = self.inner.lock();
        if inner.pumping || inner.sink.is_none() {
            return;
        }
        inner.pumping = true;
        loop {
            if !inner.buffer.is_empty() {
                let values = inner.buffer.remove(0);
                let mut sink = inner.sink.take().expect("pump lost its sink");
                drop(inner);
                sink.item(values);
                inner = self.inner.lock();
                inner.sink = Some(sink);
                continue;
            }
            match inner.termination.take() {
                Some(Termination::Complete) => {
                    let sink = inner.sink.take().expect("pump lost its sink");
                    inner.pumping = false;
                    drop(inner);
                    sink.complete();
                }
                Some(Termination::Failed(failure)) => {
                    let sink = inner.sink.take().expect("pump lost its sink");
                    inner.pumping = false;
                    drop(inner);
                    sink.fail(failure);
                }
                None => {
                    inner.pumping = false;
                }
            }
            return;
        }
    }
}
