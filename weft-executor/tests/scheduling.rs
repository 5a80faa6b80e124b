//! Integration tests for compilation order and the wave scheduler.
//!
//! Tests verify that:
//! - Shared nodes execute once
//! - Inputs always execute before their consumers
//! - Nodes executed while refining types are not executed again
//! - Unknown ops fail the request before anything runs
//! - Resolver errors reach the caller unchanged

mod common;

use common::{add, call, lit, Harness};
use weft_core::graph::walk;
use weft_core::prelude::*;

#[test]
fn diamond_executes_shared_input_once() {
    let h = Harness::new();
    let a = lit(3i64);
    let b = add(&a, &lit(4i64));
    let c = add(&a, &lit(5i64));
    let d = add(&b, &c);

    let out = h.engine.execute(&[d.clone()], false).unwrap();
    assert_eq!(out, vec![Value::Int(15)]);
    assert_eq!(h.counts.get("number-add"), 3);

    let stats = h.engine.last_stats().unwrap();
    assert_eq!(stats.nodes_executed, 3);
    assert_eq!(stats.waves, 2);

    // a, b, c and d: four distinct computations, with `a` shared by b and c
    let compiled = h.engine.compile(&[d]).unwrap();
    let computed: Vec<Node> = walk(&compiled)
        .into_iter()
        .filter(|n| n.is_output() || n.ptr_eq(&a))
        .collect();
    assert_eq!(computed.len(), 4);
    assert_eq!(computed.iter().filter(|n| n.ptr_eq(&a)).count(), 1);
}

#[test]
fn outputs_come_back_in_request_order() {
    let h = Harness::new();
    let shared = add(&lit(1i64), &lit(1i64));
    let doubled = add(&shared, &shared);

    let out = h.engine.execute(&[doubled, shared, lit("raw")], false).unwrap();
    assert_eq!(out, vec![Value::Int(4), Value::Int(2), Value::string("raw")]);
}

#[test]
fn inputs_run_before_consumers() {
    let h = Harness::new();
    let step = |after: Node, label: &str| call("trace-step", [("after", after), ("label", lit(label))]);
    let s1 = step(Node::void(), "s1");
    let s2 = step(s1.clone(), "s2");
    let s3 = step(s1, "s3");
    let joined = call("trace-join", [("left", s2), ("right", s3)]);

    let out = h.engine.execute(&[joined], false).unwrap();
    assert_eq!(out, vec![Value::string("s2+s3")]);

    let log = h.logged();
    let pos = |label: &str| log.iter().position(|l| l == label).unwrap();
    assert_eq!(log.len(), 4);
    assert!(pos("s1") < pos("s2"));
    assert!(pos("s1") < pos("s3"));
    assert!(pos("s2") < pos("join"));
    assert!(pos("s3") < pos("join"));
    assert_eq!(h.engine.last_stats().unwrap().waves, 3);
}

#[test]
fn nodes_run_during_refinement_are_not_rerun() {
    let h = Harness::new();
    let echo = call("value-echo", [("v", add(&lit(1i64), &lit(2i64)))]);

    let out = h.engine.execute(&[echo], false).unwrap();
    assert_eq!(out, vec![Value::Int(3)]);
    assert_eq!(h.counts.get("number-add"), 1);
    assert_eq!(h.counts.get("value-echo"), 1);
}

#[test]
fn refinement_sets_the_compiled_type() {
    let h = Harness::new();
    let echo = call("value-echo", [("v", add(&lit(1i64), &lit(2i64)))]);

    let compiled = h.engine.compile(&[echo]).unwrap();
    assert_eq!(compiled[0].ty(), &Type::Int);
    assert_eq!(compiled[0].op_name(), Some("value-echo"));
    // refinement only runs the inputs
    assert_eq!(h.counts.get("number-add"), 1);
    assert_eq!(h.counts.get("value-echo"), 0);
}

#[test]
fn unknown_op_fails_before_any_execution() {
    let h = Harness::new();
    let fine = add(&lit(1i64), &lit(2i64));
    let broken = call("frobnicate", [("x", lit(1i64))]);

    let err = h.engine.execute(&[fine, broken], false).unwrap_err();
    assert_eq!(err.code(), "E101");
    assert!(err.is_compile_error());
    assert_eq!(h.counts.get("number-add"), 0);
}

#[test]
fn unmatched_dispatch_fails_compilation() {
    let h = Harness::new();
    let strings = add(&lit("a"), &lit("b"));
    let err = h.engine.compile(&[strings]).unwrap_err();
    assert!(matches!(err, WeftError::NoMatchingDispatch { ref op, .. } if op == "add"));
}

#[test]
fn resolver_errors_propagate_unchanged() {
    let h = Harness::new();
    let failing = call("op-fail", [("after", add(&lit(1i64), &lit(2i64)))]);

    let err = h.engine.execute(&[failing], false).unwrap_err();
    assert_eq!(
        err,
        WeftError::Resolver {
            op: "op-fail".to_string(),
            cause: "boom".to_string(),
        }
    );

    // work finished before the failure stays cached
    let again = h.engine.execute(&[add(&lit(1i64), &lit(2i64))], false).unwrap();
    assert_eq!(again, vec![Value::Int(3)]);
    assert_eq!(h.counts.get("number-add"), 1);
    assert_eq!(h.engine.last_stats().unwrap().cache_hits("number-add"), 1);
}

#[test]
fn unbound_variables_are_rejected() {
    let h = Harness::new();
    let loose = add(&Node::var(Type::Int, "row"), &lit(1i64));
    let err = h.engine.execute(&[loose], false).unwrap_err();
    assert!(matches!(err, WeftError::UnboundVariable { ref name } if name == "row"));
}
