//! Integration tests for async ops and the await adapter.

mod common;

use common::{add, call, lit, Harness};
use std::time::Duration;
use weft_core::prelude::*;

#[test]
fn async_op_returns_a_running_handle_immediately() {
    let h = Harness::new();
    let train = || call("model-train", [("epochs", lit(4i64))]);

    let out = h.engine.execute(&[train()], false).unwrap();
    let run = out[0].as_run().expect("run handle").clone();
    // the resolver is parked on the gate, so the run cannot be done yet
    assert_eq!(run.state(), RunState::Running);
    assert!(run.wait_timeout(Duration::from_millis(20)).is_none());

    h.gate.wait();
    let done = run.wait().unwrap();
    assert_eq!(done.value, Value::Float(6.0));
    assert_eq!(run.state(), RunState::Finished);
    assert_eq!(run.progress(), Some(1.0));
    assert!(run.output_ref().is_some());

    let record = run.record();
    assert_eq!(record.op_name, "model-train");
    assert_eq!(record.input_refs.len(), 1);
}

#[test]
fn ledgered_async_runs_are_adopted() {
    let h = Harness::new();
    let train = || call("model-train", [("epochs", lit(2i64))]);

    let first = h.engine.execute(&[train()], false).unwrap();
    let run = first[0].as_run().unwrap().clone();
    h.gate.wait();
    run.wait().unwrap();

    let second = h.engine.execute(&[train()], false).unwrap();
    assert!(second[0].as_run().unwrap().ptr_eq(&run));
    assert_eq!(h.counts.get("model-train"), 1);
    assert_eq!(h.engine.last_stats().unwrap().cache_hits("model-train"), 1);
}

#[test]
fn failed_runs_report_failure_and_are_retried() {
    let h = Harness::new();
    let explode = || call("model-explode", [("x", lit(1i64))]);

    let first = h.engine.execute(&[explode()], false).unwrap();
    let run = first[0].as_run().unwrap().clone();
    let err = run.wait().unwrap_err();
    assert_eq!(err.code(), "E601");
    assert!(matches!(run.state(), RunState::Failed { ref cause } if cause.contains("diverged")));

    let retry = h.engine.execute(&[explode()], false).unwrap();
    let retried = retry[0].as_run().unwrap().clone();
    assert!(!retried.ptr_eq(&run));
    assert!(retried.wait().is_err());
    assert_eq!(h.counts.get("model-explode"), 2);
}

#[test]
fn run_results_are_awaited_where_values_are_needed() {
    let h = Harness::new();
    let score = call("model-score", [("x", lit(2i64))]);
    let total = add(&score, &lit(1i64));

    let compiled = h.engine.compile(&[total.clone()]).unwrap();
    let lhs = &compiled[0].as_op().unwrap().inputs()["lhs"];
    assert_eq!(lhs.op_name(), Some("run-await"));
    assert_eq!(lhs.ty(), &Type::Int);

    let out = h.engine.execute(&[total], false).unwrap();
    assert_eq!(out, vec![Value::Int(21)]);
    assert_eq!(h.counts.get("model-score"), 1);
}

#[test]
fn awaiting_a_failed_run_fails_the_request() {
    let h = Harness::new();
    let total = add(&call("model-explode", [("x", lit(1i64))]), &lit(1i64));
    let err = h.engine.execute(&[total], false).unwrap_err();
    assert!(matches!(err, WeftError::AsyncRunFailed { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_can_be_awaited_asynchronously() {
    let h = Harness::new();
    let out = h
        .engine
        .execute(&[call("model-score", [("x", lit(5i64))])], false)
        .unwrap();
    let run = out[0].as_run().unwrap().clone();

    let done = tokio::time::timeout(Duration::from_secs(5), run.finished())
        .await
        .expect("run finished")
        .unwrap();
    assert_eq!(done.value, Value::Int(50));
    assert_eq!(run.state(), RunState::Finished);
}
