//! Polyfuture: variadic promise/handle pairs with continuation chaining.
//!
//! # Overview
//!
//! A producer creates a [`Promise`], hands the matching [`Handle`] to a
//! consumer, and eventually deposits a result. Each handle covers one or more
//! typed *slots*; at completion every slot carries either a value or an
//! opaque error token ([`Failure`]). The consumer either blocks on
//! [`Handle::wait`], bridges into async via `.await`, or chains a
//! continuation, producing a new handle backed by a new shared cell.
//!
//! Continuations come in four shapes:
//!
//! - [`Handle::map`]: runs on the produced values, short-circuits on error
//! - [`Handle::then`]: like `map`, but the callback returns another handle
//! - [`Handle::map_reports`]: runs on the per-slot reports, so errors are
//!   visible and recoverable
//! - [`Handle::sink`]: terminal observer, no downstream handle
//!
//! Every continuation has an `_on` twin that routes the callback through a
//! caller-supplied [`Executor`] instead of running it inline.
//!
//! # Core guarantees
//!
//! - **Exactly one outcome**: each cell dispatches values, reports, or an
//!   error exactly once, no matter how producer and consumer race
//! - **Error identity**: a failure token propagates through `map` chains
//!   untouched; [`Failure::ptr_eq`] holds across any number of hops
//! - **No hidden threads**: continuations run inline on whichever side loses
//!   the producer/consumer race, or on the executor the caller supplied
//! - **Callbacks run unlocked**: no user code runs while a cell lock is held
//!
//! # Module structure
//!
//! - [`slot`]: slot lists, per-slot reports, and the derived shapes
//! - [`error`]: the [`Failure`] token and library error types
//! - [`handle`] / [`promise`]: the consumer and producer ends of a cell
//! - [`combinator`]: `fan_in`, `flatten`, `spawn_on`, and ready-made handles
//! - [`stream`]: the multi-shot variant with push/for_each
//! - [`executor`]: the executor contract plus the trivial implementations
//! - [`policy`]: the process-wide hook for errors terminal sinks swallow
//!
//! # Example
//!
//! ```
//! use polyfuture::{fan_in, pair, ready};
//!
//! let (promise, handle) = pair::<(i32,)>();
//! let doubled = handle.map(|x| x * 2);
//! promise.fulfill(21);
//! assert_eq!(doubled.wait().unwrap(), 42);
//!
//! let merged = fan_in((ready(1), ready("two"), ready(3.0)));
//! assert_eq!(merged.wait().unwrap(), (1, "two", 3.0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod combinator;
pub mod error;
pub mod executor;
pub mod handle;
pub mod policy;
pub mod promise;
pub mod slot;
pub mod stream;

mod cell;
mod handler;

pub use combinator::{failed, fan_in, flatten, ready, ready_reports, spawn_on, FanIn};
pub use error::{CallbackPanicked, Failure, UnfulfilledPromise};
pub use executor::{Executor, Inline, QueueExecutor};
pub use handle::{Handle, HandleFuture};
pub use policy::{lost_error_policy, set_lost_error_policy, LostErrorPolicy};
pub use promise::{pair, Promise};
pub use slot::{Report, Slots};
pub use stream::{stream_pair, StreamHandle, StreamPromise};
