//! End-to-end coverage of the fan-in combinator: per-slot outcomes, the
//! all-arrived firing condition, and concurrent producers.

mod common;

use std::sync::{Arc, Mutex};
use std::thread;

use polyfuture::{failed, fan_in, pair, ready, Failure, Report};

use common::init_test_logging;

#[test]
fn fan_in_of_ready_handles_yields_all_values() {
    init_test_logging();
    let merged = fan_in((ready(1), ready(2), ready(3)));
    assert_eq!(merged.wait().unwrap(), (1, 2, 3));
}

#[test]
fn fan_in_fires_only_after_every_input() {
    init_test_logging();
    let (first_promise, first) = pair::<(i32,)>();
    let (second_promise, second) = pair::<(i32,)>();
    let merged = fan_in((first, second));

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    merged.sink(move |a: Report<i32>, b: Report<i32>| {
        *slot.lock().unwrap() = Some((a.unwrap(), b.unwrap()));
    });

    first_promise.fulfill(10);
    assert!(seen.lock().unwrap().is_none());

    second_promise.fulfill(20);
    assert_eq!(*seen.lock().unwrap(), Some((10, 20)));
}

#[test]
fn each_slot_carries_its_own_outcome() {
    init_test_logging();
    let failure = Failure::msg("slot two failed");
    let merged = fan_in((ready(1), failed::<(i32,)>(failure.clone()), ready(3)));

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    merged.sink(move |a: Report<i32>, b: Report<i32>, c: Report<i32>| {
        *slot.lock().unwrap() = Some((a.unwrap(), b.unwrap_err(), c.unwrap()));
    });

    let guard = seen.lock().unwrap();
    let (a, err, c) = guard.as_ref().unwrap();
    assert_eq!((*a, *c), (1, 3));
    assert!(err.ptr_eq(&failure));
}

#[test]
fn waiting_on_a_fan_in_with_a_failed_slot_raises_it() {
    init_test_logging();
    let failure = Failure::msg("bad slot");
    let merged = fan_in((ready(1), failed::<(i32,)>(failure.clone())));
    assert!(merged.wait().unwrap_err().ptr_eq(&failure));
}

#[test]
fn heterogeneous_inputs_keep_their_types() {
    init_test_logging();
    let merged = fan_in((ready(7_u8), ready(String::from("mid")), ready(true)));
    assert_eq!(merged.wait().unwrap(), (7, String::from("mid"), true));
}

#[test]
fn concurrent_producers_all_land() {
    init_test_logging();
    for _ in 0..64 {
        let (p1, h1) = pair::<(u32,)>();
        let (p2, h2) = pair::<(u32,)>();
        let (p3, h3) = pair::<(u32,)>();
        let merged = fan_in((h1, h2, h3));

        let threads = [
            thread::spawn(move || p1.fulfill(1)),
            thread::spawn(move || p2.fulfill(2)),
            thread::spawn(move || p3.fulfill(3)),
        ];

        assert_eq!(merged.wait().unwrap(), (1, 2, 3));
        for t in threads {
            t.join().unwrap();
        }
    }
}

#[test]
fn fan_in_feeds_further_continuations() {
    init_test_logging();
    let merged = fan_in((ready(2), ready(3))).map(|a, b| a * b);
    assert_eq!(merged.wait().unwrap(), 6);
}

#[test]
fn a_dropped_input_promise_lands_as_an_error_slot() {
    init_test_logging();
    let (alive_promise, alive) = pair::<(i32,)>();
    let (dead_promise, dead) = pair::<(i32,)>();
    let merged = fan_in((alive, dead));

    alive_promise.fulfill(5);
    drop(dead_promise);

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    merged.sink(move |a: Report<i32>, b: Report<i32>| {
        *slot.lock().unwrap() = Some((a.unwrap(), b.is_err()));
    });

    assert_eq!(*seen.lock().unwrap(), Some((5, true)));
}
