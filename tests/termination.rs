//! Terminate-kind raises: unwinding past the raise site, innermost-first
//! selection, finally clauses, and the fatal path for uncaught events.

#[macro_use]
mod common;

use common::*;
use raisekit::{ErrorKind, Event, FatalReason, RaiseKind, Raised, ResumeOutcome, Try};
use std::cell::{Cell, RefCell};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

#[test]
fn terminate_never_returns_to_raise_site() {
    let (rt, tags) = test_runtime();
    test_phase!("terminate_never_returns_to_raise_site");
    let after_raise = Cell::new(false);
    let after_block = Cell::new(false);

    let out = rt
        .enter("X", |cx| {
            let value = Try::new()
                .catch(tags.arithmetic, |_, ev| Ok(format!("recovered:{}", ev.message())))
                .run(cx, |cx| {
                    let divisor = 0;
                    if divisor == 0 {
                        return Err(cx.throw(Event::new(tags.divide_by_zero, "x / 0")));
                    }
                    after_raise.set(true);
                    Ok(String::from("quotient"))
                })?;
            after_block.set(true);
            Ok(value)
        })
        .expect("context failed");

    assert_eq!(out, "recovered:x / 0");
    assert!(!after_raise.get());
    assert!(after_block.get());
    test_complete!("terminate_never_returns_to_raise_site");
}

#[test]
fn innermost_matching_block_handles() {
    let (rt, tags) = test_runtime();
    let log = RefCell::new(Vec::<&str>::new());

    rt.enter("X", |cx| {
        Try::new()
            .catch(tags.overflow, |_, _| {
                log.borrow_mut().push("outer");
                Ok(())
            })
            .run(cx, |cx| {
                Try::new()
                    .catch(tags.arithmetic, |_, _| {
                        log.borrow_mut().push("inner");
                        Ok(())
                    })
                    .run(cx, |cx| Err(cx.throw(Event::new(tags.overflow, "wrapped"))))?;
                log.borrow_mut().push("after-inner");
                Ok(())
            })
    })
    .expect("context failed");

    assert_eq!(*log.borrow(), ["inner", "after-inner"]);
}

#[test]
fn declaration_order_then_catch_all() {
    let (rt, tags) = test_runtime();

    let picks = rt
        .enter("X", |cx| {
            let mut picks = Vec::new();
            for tag in [tags.overflow, tags.timeout] {
                let pick = Try::new()
                    .catch_any(|_, _| Ok("catch-all"))
                    .catch(tags.arithmetic, |_, _| Ok("arithmetic"))
                    .catch(tags.overflow, |_, _| Ok("overflow"))
                    .run(cx, |cx| Err(cx.throw(Event::new(tag, "sample"))))?;
                picks.push(pick);
            }
            Ok(picks)
        })
        .expect("context failed");

    assert_eq!(picks, ["arithmetic", "catch-all"]);
}

#[test]
fn unmatched_terminate_passes_through_to_outer_block() {
    let (rt, tags) = test_runtime();
    let finally_order = RefCell::new(Vec::<&str>::new());

    let message = rt
        .enter("X", |cx| {
            Try::new()
                .catch(tags.io, |_, ev| Ok(ev.message().to_owned()))
                .finally(|| finally_order.borrow_mut().push("outer"))
                .run(cx, |cx| {
                    Try::new()
                        .catch(tags.arithmetic, |_, _| Ok(String::from("wrong block")))
                        .finally(|| finally_order.borrow_mut().push("inner"))
                        .run(cx, |cx| Err(cx.throw(Event::new(tags.timeout, "slow disk"))))
                })
        })
        .expect("context failed");

    assert_eq!(message, "slow disk");
    assert_eq!(*finally_order.borrow(), ["inner", "outer"]);
}

#[test]
fn finally_runs_on_success_and_on_panic() {
    let (rt, _) = test_runtime();
    let ran = Cell::new(0_u32);

    let ok = rt
        .enter("X", |cx| {
            Try::new()
                .finally(|| ran.set(ran.get() + 1))
                .run(cx, |_| Ok(7))
        })
        .expect("context failed");
    assert_eq!(ok, 7);
    assert_eq!(ran.get(), 1);

    let unwound = std::panic::catch_unwind(AssertUnwindSafe(|| {
        rt.enter("Y", |cx| {
            Try::new()
                .finally(|| ran.set(ran.get() + 1))
                .run(cx, |_| -> Result<(), Raised> { panic!("body exploded") })
        })
    }));
    assert!(unwound.is_err());
    assert_eq!(ran.get(), 2);
    assert_eq!(rt.live_contexts(), 0);
}

#[test]
fn activations_and_deactivations_balance_across_unwinding() {
    let (rt, tags) = test_runtime();

    let (activations, deactivations, depth) = rt
        .enter("X", |cx| {
            Try::new()
                .catch(tags.arithmetic, |_, _| Ok(()))
                .run(cx, |cx| {
                    Try::new()
                        .catch_resume(tags.io, |_, _| Ok(()))
                        .run(cx, |cx| {
                            Try::new()
                                .catch_resume(tags.timeout, |_, _| Ok(()))
                                .run(cx, |cx| {
                                    assert_eq!(cx.activations(), 3);
                                    assert_eq!(cx.deactivations(), 0);
                                    Err(cx.throw(Event::new(tags.underflow, "deep")))
                                })
                        })
                })?;
            Ok((cx.activations(), cx.deactivations(), cx.resumption_depth()))
        })
        .expect("context failed");

    assert_eq!(activations, 3);
    assert_eq!(deactivations, 3);
    assert_eq!(depth, 0);
}

#[test]
fn termination_handler_can_rethrow_outward() {
    let (rt, tags) = test_runtime();

    let seen = rt
        .enter("X", |cx| {
            Try::new()
                .catch(tags.arithmetic, |cx, ev| {
                    let current = cx.current_exception().expect("inside a handler");
                    Ok((current.type_name, ev.message().to_owned(), ev.raise_kind()))
                })
                .run(cx, |cx| {
                    Try::new()
                        .catch(tags.overflow, |_, ev| Err(ev.reraise()))
                        .run(cx, |cx| Err(cx.throw(Event::new(tags.overflow, "again"))))
                })
        })
        .expect("context failed");

    assert_eq!(
        seen,
        (
            String::from("Overflow"),
            String::from("again"),
            Some(RaiseKind::Terminate)
        )
    );
}

#[test]
fn reraise_of_terminate_event_is_err() {
    let (rt, tags) = test_runtime();

    rt.enter("X", |cx| {
        let raised = cx.throw(Event::new(tags.underflow, "below"));
        let again = cx.reraise(raised.into_event());
        let raised = again.expect_err("terminate-kind reraise is an Err");
        assert_eq!(raised.tag(), tags.underflow);

        let fresh = cx.reraise(Event::new(tags.io, "never raised"));
        assert_eq!(
            fresh.expect_err("unraised events are thrown").event().raise_kind(),
            Some(RaiseKind::Terminate)
        );
        Ok(())
    })
    .expect("context failed");
}

#[test]
fn uncaught_terminate_is_fatal_and_reported() {
    let (rt, tags) = test_runtime();
    let _guard = hook_lock();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    raisekit::set_terminate_hook(move |report| {
        sink.lock().expect("report sink").push(report.clone());
    });

    let err = rt
        .enter("faulty", |cx| {
            Try::new()
                .catch(tags.io, |_, _| Ok(()))
                .run(cx, |cx| Err(cx.throw(Event::new(tags.overflow, "counter wrapped"))))
        })
        .unwrap_err();
    raisekit::reset_hooks();

    assert_eq!(err.kind(), ErrorKind::Uncaught);
    let reports = reports.lock().expect("report sink");
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.reason, FatalReason::Uncaught);
    assert_eq!(report.context_name, "faulty");
    assert_eq!(report.event.type_name, "Overflow");
    let line = report.to_string();
    assert!(line.contains("\"faulty\""), "{line}");
    assert!(line.contains("Overflow"), "{line}");
    assert!(line.ends_with(": counter wrapped"), "{line}");
}

#[test]
fn unmatched_resume_with_no_handlers_is_not_fatal() {
    let (rt, tags) = test_runtime();
    let _guard = hook_lock();
    let fatal = Arc::new(Mutex::new(0_u32));
    let sink = Arc::clone(&fatal);
    raisekit::set_terminate_hook(move |_| {
        *sink.lock().expect("counter") += 1;
    });

    let outcome = rt.enter("X", |cx| {
        let mut ev = Event::new(tags.timeout, "no handler anywhere");
        cx.resume(&mut ev)
    });
    raisekit::reset_hooks();

    assert_eq!(outcome.expect("context survives"), ResumeOutcome::Unhandled);
    assert_eq!(*fatal.lock().expect("counter"), 0);
}
