//! Multi-shot streams: push-style production with buffered subscription.
//!
//! A stream pair generalises the single-shot cell: the producer may
//! [`push`](StreamPromise::push) any number of items and then either
//! [`complete`](StreamPromise::complete) or [`fail`](StreamPromise::fail);
//! the consumer installs one per-item callback with
//! [`for_each`](StreamHandle::for_each), which hands back an ordinary
//! `Handle<((),)>` that fires when the stream terminates.
//!
//! Items pushed before the consumer subscribes are buffered and replayed, in
//! push order, ahead of any live delivery. Termination is observed strictly
//! after every item.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! let (producer, consumer) = polyfuture::stream_pair::<(i32,)>();
//! producer.push(1);
//! producer.push(2);
//!
//! let total = Arc::new(AtomicI32::new(0));
//! let sum = Arc::clone(&total);
//! let done = consumer.for_each(move |x| {
//!     sum.fetch_add(x, Ordering::SeqCst);
//! });
//!
//! producer.push(3);
//! producer.complete();
//!
//! done.wait().unwrap();
//! assert_eq!(total.load(Ordering::SeqCst), 6);
//! ```

mod cell;
mod for_each;

use std::sync::Arc;

use crate::error::{Failure, UnfulfilledPromise};
use crate::executor::{Executor, Inline};
use crate::handle::Handle;
use crate::slot::Slots;

use self::cell::StreamCell;
use self::for_each::ForEachSink;

/// The producer side of a stream: push items, then terminate once.
///
/// Dropping the promise without terminating fails the stream with
/// [`UnfulfilledPromise`].
#[must_use = "dropping a stream promise without completing fails its stream"]
pub struct StreamPromise<L: Slots> {
    shared: Option<Arc<StreamCell<L>>>,
}

impl<L: Slots> StreamPromise<L> {
    /// Pushes one item. Delivered immediately when a consumer is live,
    /// buffered otherwise.
    pub fn push(&self, item: L::Output) {
        self.shared().push(L::from_output(item));
    }

    /// Signals a clean end of stream; the consumer's completion handle
    /// fulfills after every pushed item has been delivered.
    pub fn complete(mut self) {
        self.take_shared().complete();
    }

    /// Fails the stream; the consumer's completion handle carries `failure`
    /// after every pushed item has been delivered.
    pub fn fail(mut self, failure: Failure) {
        self.take_shared().fail(failure);
    }

    /// True while this promise can still push or terminate.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.shared.is_some()
    }

    fn shared(&self) -> &Arc<StreamCell<L>> {
        self.shared.as_ref().expect("stream promise already terminated")
    }

    fn take_shared(&mut self) -> Arc<StreamCell<L>> {
        self.shared.take().expect("stream promise already terminated")
    }
}

impl<L: Slots> Drop for StreamPromise<L> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            tracing::debug!("stream promise dropped before terminating; failing its stream");
            shared.fail(Failure::new(UnfulfilledPromise));
        }
    }
}

/// The consumer side of a stream: subscribe one per-item callback.
#[must_use = "a stream handle does nothing until for_each is installed"]
pub struct StreamHandle<L: Slots> {
    shared: Arc<StreamCell<L>>,
}

impl<L: Slots> StreamHandle<L> {
    /// Installs the item sink built by the per-arity API methods.
    fn subscribe<F, E>(self, exec: E, cb: F) -> Handle<((),)>
    where
        F: FnMut(L) + Send + 'static,
        E: Executor,
    {
        let gate = Arc::clone(self.shared.gate());
        let completion = Handle::new(Arc::clone(gate.cell()));
        self.shared.subscribe(Box::new(ForEachSink::new(cb, exec, gate)));
        completion
    }
}

macro_rules! impl_stream_api {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Send + 'static),+> StreamHandle<($($name,)+)> {
            /// Runs `cb` for every item, buffered ones first in push order,
            /// then live. Returns the completion handle: it fulfills on
            /// [`StreamPromise::complete`] and fails on
            /// [`StreamPromise::fail`] or the first callback panic.
            pub fn for_each<F>(self, cb: F) -> Handle<((),)>
            where
                F: FnMut($($name),+) + Send + 'static,
            {
                self.for_each_on(Inline, cb)
            }

            /// [`for_each`](Self::for_each) with every delivery (and the
            /// termination) scheduled on `exec`.
            pub fn for_each_on<F, E>(self, exec: E, mut cb: F) -> Handle<((),)>
            where
                F: FnMut($($name),+) + Send + 'static,
                E: Executor,
            {
                self.subscribe(exec, move |values: ($($name,)+)| cb($(values.$idx),+))
            }
        }
    };
}

impl_stream_api!(T0.0);
impl_stream_api!(T0.0, T1.1);
impl_stream_api!(T0.0, T1.1, T2.2);
impl_stream_api!(T0.0, T1.1, T2.2, T3.3);
impl_stream_api!(T0.0, T1.1, T2.2, T3.3, T4.4);
impl_stream_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5);
impl_stream_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6);
impl_stream_api!(T0.0, T1.1, T2.2, T3.3, T4.4, T5.5, T6.6, T7.7);

/// Creates a connected stream promise/handle pair.
#[must_use]
pub fn stream_pair<L: Slots>() -> (StreamPromise<L>, StreamHandle<L>) {
    let shared = StreamCell::new();
    (
        StreamPromise {
            shared: Some(Arc::clone(&shared)),
        },
        StreamHandle { shared },
    )
}
