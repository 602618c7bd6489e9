//! Slot lists and the shapes derived from them.
//!
//! A handle over `T1..Tn` is parameterised by the tuple `(T1, ..., Tn)`.
//! Each element is one *slot*; at completion every slot carries either its
//! value or an error token. Unit slots are literal `()` elements, so a
//! "valueless" handle is `Handle<((),)>`.
//!
//! Three shapes derive from a slot list:
//!
//! - *produced*: the tuple itself, supplied by the producer on success
//! - *reports*: [`Slots::Reports`], one [`Report`] per slot
//! - *error*: a single [`Failure`] standing for every slot at once
//!
//! [`Slots::Output`] is the shape at the API edge: the bare value for a
//! one-slot list, the whole tuple otherwise.

use crate::error::Failure;

/// The value-or-error sum carried by one slot at completion.
pub type Report<T> = Result<T, Failure>;

/// An ordered, non-empty list of result slots.
///
/// Implemented for tuples of `Send + 'static` elements up to arity 8. The
/// conversions below are the whole algebra the cell machinery needs: wrapping
/// values into reports, unwrapping checked reports, broadcasting one failure
/// across every slot, and locating errors from either end.
pub trait Slots: Send + Sized + 'static {
    /// Tuple of per-slot reports.
    type Reports: Send + 'static;

    /// Shape at the API edge: `T1` for one slot, the tuple itself otherwise.
    type Output: Send + 'static;

    /// Number of slots.
    const ARITY: usize;

    /// Wraps every produced value as an `Ok` report.
    fn into_reports(self) -> Self::Reports;

    /// Unwraps a reports tuple known to hold no errors.
    ///
    /// # Panics
    ///
    /// Panics if any report is an error. Callers check [`Slots::first_error`]
    /// first.
    fn from_reports(reports: Self::Reports) -> Self;

    /// Broadcasts one failure token into every slot.
    fn broadcast(failure: &Failure) -> Self::Reports;

    /// Leftmost error in the reports, if any.
    fn first_error(reports: &Self::Reports) -> Option<Failure>;

    /// Rightmost error in the reports, if any.
    fn last_error(reports: &Self::Reports) -> Option<Failure>;

    /// Maps the edge shape into the slot tuple.
    fn from_output(output: Self::Output) -> Self;

    /// Maps the slot tuple into the edge shape.
    fn into_output(self) -> Self::Output;

    /// Folds a reports tuple into a single report over the edge shape.
    ///
    /// The leftmost error wins, mirroring what a `map` continuation does with
    /// a finished-with-errors input.
    fn collapse(reports: Self::Reports) -> Report<Self::Output> {
        match Self::first_error(&reports) {
            Some(failure) => Err(failure),
            None => Ok(Self::from_reports(reports).into_output()),
        }
    }
}

impl<A: Send + 'static> Slots for (A,) {
    type Reports = (Report<A>,);
    type Output = A;

    const ARITY: usize = 1;

    fn into_reports(self) -> Self::Reports {
        (Ok(self.0),)
    }

    fn from_reports(reports: Self::Reports) -> Self {
        (reports.0.expect("slot carried an error"),)
    }

    fn broadcast(failure: &Failure) -> Self::Reports {
        (Err(failure.clone()),)
    }

    fn first_error(reports: &Self::Reports) -> Option<Failure> {
        reports.0.as_ref().err().cloned()
    }

    fn last_error(reports: &Self::Reports) -> Option<Failure> {
        reports.0.as_ref().err().cloned()
    }

    fn from_output(output: Self::Output) -> Self {
        (output,)
    }

    fn into_output(self) -> Self::Output {
        self.0
    }
}

macro_rules! impl_slots {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Send + 'static),+> Slots for ($($name,)+) {
            type Reports = ($(Report<$name>,)+);
            type Output = ($($name,)+);

            const ARITY: usize = [$(stringify!($name)),+].len();

            fn into_reports(self) -> Self::Reports {
                ($(Ok(self.$idx),)+)
            }

            fn from_reports(reports: Self::Reports) -> Self {
                ($(reports.$idx.expect("slot carried an error"),)+)
            }

            fn broadcast(failure: &Failure) -> Self::Reports {
                ($(Err::<$name, _>(failure.clone()),)+)
            }

            fn first_error(reports: &Self::Reports) -> Option<Failure> {
                $(
                    if let Err(failure) = &reports.$idx {
                        return Some(failure.clone());
                    }
                )+
                None
            }

            fn last_error(reports: &Self::Reports) -> Option<Failure> {
                let mut last = None;
                $(
                    if let Err(failure) = &reports.$idx {
                        last = Some(failure.clone());
                    }
                )+
                last
            }

            fn from_output(output: Self::Output) -> Self {
                output
            }

            fn into_output(self) -> Self::Output {
                self
            }
        }
    };
}

impl_slots!(A.0, B.1);
impl_slots!(A.0, B.1, C.2);
impl_slots!(A.0, B.1, C.2, D.3);
impl_slots!(A.0, B.1, C.2, D.3, E.4);
impl_slots!(A.0, B.1, C.2, D.3, E.4, F.5);
impl_slots!(A.0, B.1, C.2, D.3, E.4, F.5, G.6);
impl_slots!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
