//! Common test utilities for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use weft_core::prelude::*;
use weft_executor::{Engine, EngineConfig};

/// Resolver invocation counts by canonical op name.
#[derive(Clone, Default)]
pub struct Counts(Arc<Mutex<HashMap<String, usize>>>);

impl Counts {
    pub fn bump(&self, op: &str) {
        *self.0.lock().entry(op.to_string()).or_default() += 1;
    }

    pub fn get(&self, op: &str) -> usize {
        self.0.lock().get(op).copied().unwrap_or(0)
    }
}

/// Engine over a small op library plus the hooks the tests observe.
pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub counts: Counts,
    /// Labels in the order `trace-step` / `trace-join` ran.
    pub log: Arc<Mutex<Vec<String>>>,
    /// Column lists `table-rows_with_columns` was asked for.
    pub projections: Arc<Mutex<Vec<Vec<String>>>>,
    /// `model-train` waits here once before finishing.
    pub gate: Arc<Barrier>,
    /// Current and peak concurrent `probe-touch` calls.
    pub active: Arc<AtomicUsize>,
    pub peak_active: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let counts = Counts::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let projections = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Barrier::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak_active = Arc::new(AtomicUsize::new(0));

        let registry = MemoryRegistry::new();
        register_arithmetic(&registry, &counts);
        register_tags(&registry, &counts);
        register_tracing_ops(&registry, &counts, &log);
        register_tables(&registry, &counts, &projections);
        register_async(&registry, &counts, &gate);
        register_probe(&registry, &counts, &active, &peak_active);
        register_flagged(&registry, &counts);

        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(config, Arc::new(registry), Arc::clone(&store) as Arc<dyn ObjectStore>)
            .expect("engine");
        Self {
            engine,
            store,
            counts,
            log,
            projections,
            gate,
            active,
            peak_active,
        }
    }

    pub fn logged(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

fn counted<F>(counts: &Counts, name: &'static str, body: F) -> OpDef
where
    F: Fn(&OpInputs, &mut dyn ResolveContext) -> Result<NodeOutput> + Send + Sync + 'static,
{
    let counts = counts.clone();
    OpDef::new(name, move |inputs, ctx| {
        counts.bump(name);
        body(inputs, ctx)
    })
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 {
        Value::Int(value as i64)
    } else {
        Value::Float(value)
    }
}

fn register_arithmetic(registry: &MemoryRegistry, counts: &Counts) {
    registry.register(
        counted(counts, "number-add", |inputs, _| {
            Ok(NodeOutput::new(number(inputs.f64("lhs")? + inputs.f64("rhs")?)))
        })
        .input("lhs", Type::Number)
        .input("rhs", Type::Number)
        .output(Type::Number),
    );
    registry.register(
        counted(counts, "number-mul", |inputs, _| {
            Ok(NodeOutput::new(number(inputs.f64("lhs")? * inputs.f64("rhs")?)))
        })
        .input("lhs", Type::Number)
        .input("rhs", Type::Number)
        .output(Type::Number),
    );
    registry.register(
        counted(counts, "number-scale", |inputs, _| {
            Ok(NodeOutput::new(number(inputs.f64("v")? * inputs.f64("factor")?)))
        })
        .input("v", Type::Number)
        .input("factor", Type::Number)
        .output(Type::Number)
        .flows_tags(),
    );
    registry.register(
        counted(counts, "text-upper", |inputs, _| {
            let text = match inputs.get("s")? {
                Value::String(s) => s.to_uppercase(),
                other => other.to_string(),
            };
            Ok(NodeOutput::new(text))
        })
        .input("s", Type::String)
        .output(Type::String),
    );
    let refines = counts.clone();
    registry.register(
        counted(counts, "value-echo", |inputs, _| Ok(NodeOutput::new(inputs.get("v")?.clone())))
            .input("v", Type::Any)
            .refine(move |inputs| {
                refines.bump("value-echo:refine");
                Ok(inputs.get("v")?.type_of())
            }),
    );
    registry.register(
        counted(counts, "op-fail", |_, _| {
            Err(WeftError::Resolver {
                op: "op-fail".to_string(),
                cause: "boom".to_string(),
            })
        })
        .input("after", Type::Any),
    );
}

fn register_tags(registry: &MemoryRegistry, counts: &Counts) {
    registry.register(
        counted(counts, "tag-attach", |inputs, _| {
            Ok(NodeOutput::new(inputs.get("v")?.clone())
                .with_tag(inputs.str("name")?, inputs.get("tag")?.clone()))
        })
        .input("v", Type::Any)
        .input("name", Type::String)
        .input("tag", Type::Any)
        .impure(),
    );
    let read_tag = |inputs: &OpInputs, _: &mut dyn ResolveContext| -> Result<NodeOutput> {
        let name = inputs.str("name")?;
        Ok(NodeOutput::new(
            inputs.tags("v")?.get(name).cloned().unwrap_or(Value::Null),
        ))
    };
    registry.register(
        counted(counts, "tag-peek", read_tag)
            .input("v", Type::Any)
            .input("name", Type::String)
            .impure(),
    );
    registry.register(
        counted(counts, "tag-read", read_tag)
            .input("v", Type::Any)
            .input("name", Type::String)
            .impure()
            .flags(OpFlags {
                graph_engine_required: true,
                ..OpFlags::default()
            }),
    );
}

fn register_tracing_ops(registry: &MemoryRegistry, counts: &Counts, log: &Arc<Mutex<Vec<String>>>) {
    let step_log = Arc::clone(log);
    registry.register(
        counted(counts, "trace-step", move |inputs, _| {
            let label = inputs.str("label")?.to_string();
            step_log.lock().push(label.clone());
            Ok(NodeOutput::new(label))
        })
        .input("after", Type::Any)
        .input("label", Type::String),
    );
    let join_log = Arc::clone(log);
    registry.register(
        counted(counts, "trace-join", move |inputs, _| {
            join_log.lock().push("join".to_string());
            let joined = format!("{}+{}", inputs.str("left")?, inputs.str("right")?);
            Ok(NodeOutput::new(joined))
        })
        .input("left", Type::String)
        .input("right", Type::String),
    );
}

fn users() -> Vec<Value> {
    vec![
        Value::dict([("name", Value::string("ada")), ("age", Value::Int(36))]),
        Value::dict([("name", Value::string("alan")), ("age", Value::Int(41))]),
    ]
}

fn register_tables(registry: &MemoryRegistry, counts: &Counts, projections: &Arc<Mutex<Vec<Vec<String>>>>) {
    registry.register(
        counted(counts, "table-rows", |_, _| Ok(NodeOutput::new(Value::List(users()))))
            .input("table", Type::String)
            .output(Type::list(Type::dict(Type::Any))),
    );
    let seen = Arc::clone(projections);
    registry.register(
        counted(counts, "table-rows_with_columns", move |inputs, _| {
            let columns: Vec<String> = inputs
                .list("columns")?
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect();
            seen.lock().push(columns.clone());
            let rows = users()
                .into_iter()
                .map(|row| {
                    Value::dict(columns.iter().map(|c| {
                        (c.clone(), row.get_field(c).cloned().unwrap_or(Value::Null))
                    }))
                })
                .collect();
            Ok(NodeOutput::new(Value::List(rows)))
        })
        .input("table", Type::String)
        .input("columns", Type::list(Type::String))
        .output(Type::list(Type::dict(Type::Any))),
    );
    registry.register(
        counted(counts, "row-pick", |inputs, _| {
            let key = inputs.str("key")?;
            Ok(NodeOutput::new(
                inputs.get("obj")?.get_field(key).cloned().unwrap_or(Value::Null),
            ))
        })
        .input("obj", Type::Any)
        .input("key", Type::String),
    );
    registry.register(
        counted(counts, "list-count", |inputs, _| {
            Ok(NodeOutput::new(inputs.list("arr")?.len() as i64))
        })
        .input("arr", Type::list(Type::Any))
        .output(Type::Int),
    );
}

fn register_async(registry: &MemoryRegistry, counts: &Counts, gate: &Arc<Barrier>) {
    let gate = Arc::clone(gate);
    registry.register(
        counted(counts, "model-train", move |inputs, ctx| {
            if let Some(run) = ctx.run() {
                run.set_progress(0.5);
            }
            gate.wait();
            Ok(NodeOutput::new(inputs.int("epochs")? as f64 * 1.5))
        })
        .input("epochs", Type::Int)
        .output(Type::Float)
        .asynchronous(),
    );
    registry.register(
        counted(counts, "model-score", |inputs, _| {
            std::thread::sleep(Duration::from_millis(5));
            Ok(NodeOutput::new(inputs.int("x")? * 10))
        })
        .input("x", Type::Int)
        .output(Type::Int)
        .asynchronous(),
    );
    registry.register(
        counted(counts, "model-explode", |_, _| {
            Err(WeftError::Resolver {
                op: "model-explode".to_string(),
                cause: "diverged".to_string(),
            })
        })
        .input("x", Type::Int)
        .output(Type::Int)
        .asynchronous(),
    );
}

fn register_probe(
    registry: &MemoryRegistry,
    counts: &Counts,
    active: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
) {
    let active = Arc::clone(active);
    let peak = Arc::clone(peak);
    registry.register(
        counted(counts, "probe-touch", move |inputs, _| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(NodeOutput::new(inputs.get("v")?.clone()))
        })
        .input("v", Type::Any)
        .impure(),
    );
}

fn register_flagged(registry: &MemoryRegistry, counts: &Counts) {
    registry.register(
        counted(counts, "clock-read", |inputs, _| Ok(NodeOutput::new(inputs.int("tick")? + 1000)))
            .input("tick", Type::Int)
            .output(Type::Int)
            .flags(OpFlags {
                no_ledger: true,
                ..OpFlags::default()
            }),
    );
    registry.register(
        counted(counts, "audit-double", |inputs, _| Ok(NodeOutput::new(inputs.int("v")? * 2)))
            .input("v", Type::Int)
            .output(Type::Int)
            .flags(OpFlags {
                cache_required: true,
                ..OpFlags::default()
            }),
    );
    registry.register(
        counted(counts, "panic-on-one", |inputs, _| {
            let v = inputs.int("v")?;
            if v == 1 {
                panic!("element {v} is not allowed");
            }
            Ok(NodeOutput::new(v))
        })
        .input("v", Type::Any)
        .impure(),
    );
}

/// `op(inputs…)` with an `Any` declared type.
pub fn call<const N: usize>(op: &str, inputs: [(&str, Node); N]) -> Node {
    Node::output(Type::Any, op, inputs)
}

/// `add(lhs, rhs)` by common name.
pub fn add(lhs: &Node, rhs: &Node) -> Node {
    call("add", [("lhs", lhs.clone()), ("rhs", rhs.clone())])
}

/// `row => body` over one `Any`-typed parameter.
pub fn row_fn(param: &str, body: Node) -> Node {
    Node::lambda([(param, Type::Any)], body)
}

pub fn lit(value: impl Into<Value>) -> Node {
    Node::literal(value)
}
