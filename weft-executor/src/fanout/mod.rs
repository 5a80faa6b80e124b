//! Fan-out: applying a lambda to every element of a collection.
//!
//! Before mapping, the body is folded (see [`fold`]). A body with no async,
//! must-ledger or graph-engine ops is evaluated directly per element; any
//! other body goes through the forward-graph scheduler once per element.
//! Elements are spread over scoped worker threads within the request's
//! [`ParallelBudget`]; each worker runs on a forked scope that is absorbed
//! back after the join.

mod budget;
mod eval;
mod fold;

pub use budget::{GaugeGuard, ParallelBudget, ThreadGauge};

use crate::engine::Engine;
use crate::scope::ExecutionScope;
use crate::worker::panic_message;
use eval::DirectEvaluator;
use fold::Folded;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use weft_core::error::{Result, WeftError};
use weft_core::graph::{substitute_vars, Lambda, Node};
use weft_core::value::{NodeOutput, Value};

enum Plan {
    Direct(Folded),
    Scheduled,
}

impl Plan {
    fn prepare(engine: &Engine, scope: &ExecutionScope, lambda: &Lambda) -> Result<Self> {
        let folded = fold::fold(engine, scope, lambda)?;
        if fold::eligible(engine, folded.lambda.body()) {
            Ok(Plan::Direct(folded))
        } else {
            Ok(Plan::Scheduled)
        }
    }

    fn is_direct(&self) -> bool {
        matches!(self, Plan::Direct(_))
    }
}

/// Call `lambda` once with `args` bound to its parameters in order.
pub(crate) fn apply(
    engine: &Engine,
    scope: &mut ExecutionScope,
    lambda: &Lambda,
    args: Vec<NodeOutput>,
) -> Result<NodeOutput> {
    let plan = Plan::prepare(engine, scope, lambda)?;
    invoke(engine, scope, lambda, &plan, args)
}

/// Apply `lambda` to each item; results keep the item order.
///
/// The first parameter is bound to the item and a second one, when
/// declared, to its index.
pub(crate) fn map(
    engine: &Engine,
    scope: &mut ExecutionScope,
    lambda: &Lambda,
    items: Vec<NodeOutput>,
) -> Result<Vec<NodeOutput>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let plan = Plan::prepare(engine, scope, lambda)?;
    if plan.is_direct() {
        scope.stats.fast_path_maps += 1;
    } else {
        scope.stats.fallback_maps += 1;
    }

    let (workers, child) = scope.budget.split(items.len());
    tracing::debug!(
        items = items.len(),
        workers,
        child_budget = child.get(),
        direct = plan.is_direct(),
        "Fan-out map"
    );

    let indexed: Vec<(usize, NodeOutput)> = items.into_iter().enumerate().collect();
    if workers <= 1 {
        return catch_panic(|| {
            indexed
                .into_iter()
                .map(|(index, item)| invoke(engine, scope, lambda, &plan, element_args(item, index)))
                .collect()
        })?;
    }

    let per_worker = indexed.len().div_ceil(workers);
    let mut chunks: Vec<Vec<(usize, NodeOutput)>> = Vec::with_capacity(workers);
    let mut rest = indexed.into_iter().peekable();
    while rest.peek().is_some() {
        chunks.push(rest.by_ref().take(per_worker).collect());
    }
    parallel_map(engine, scope, lambda, &plan, chunks, child)
}

/// Run `f` on the calling thread, turning a resolver panic into an error
/// the same way a panicking worker thread is reported.
fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| WeftError::ResolverPanic {
        op: "map".to_string(),
        message: panic_message(payload.as_ref()),
    })
}

fn element_args(item: NodeOutput, index: usize) -> Vec<NodeOutput> {
    vec![item, NodeOutput::new(Value::Int(index as i64))]
}

type ChunkOutcome = (ExecutionScope, Result<Vec<NodeOutput>>);

/// Run the first chunk on the calling thread and every other chunk on its
/// own scoped thread.
fn parallel_map(
    engine: &Engine,
    scope: &mut ExecutionScope,
    lambda: &Lambda,
    plan: &Plan,
    chunks: Vec<Vec<(usize, NodeOutput)>>,
    child: ParallelBudget,
) -> Result<Vec<NodeOutput>> {
    let run_chunk = |mut worker: ExecutionScope, chunk: Vec<(usize, NodeOutput)>| -> ChunkOutcome {
        let outputs = chunk
            .into_iter()
            .map(|(index, item)| invoke(engine, &mut worker, lambda, plan, element_args(item, index)))
            .collect();
        (worker, outputs)
    };

    let mut chunks = chunks.into_iter();
    let own = chunks.next().unwrap_or_default();

    let outcomes: Vec<Result<ChunkOutcome>> = std::thread::scope(|s| {
        let mut handles = Vec::new();
        for (n, chunk) in chunks.enumerate() {
            let forked = scope.fork(child);
            let gauge = Arc::clone(&scope.gauge);
            let run_chunk = &run_chunk;
            let spawned = std::thread::Builder::new()
                .name(format!("weft-fanout-{}", n + 1))
                .spawn_scoped(s, move || {
                    let _live = gauge.enter();
                    run_chunk(forked, chunk)
                });
            handles.push(spawned);
        }

        let forked = scope.fork(child);
        let mut outcomes = vec![catch_panic(|| run_chunk(forked, own))];
        for spawned in handles {
            let outcome = match spawned {
                Ok(handle) => handle.join().map_err(|payload| WeftError::ResolverPanic {
                    op: "map".to_string(),
                    message: panic_message(payload.as_ref()),
                }),
                Err(e) => Err(WeftError::WorkerUnavailable {
                    cause: e.to_string(),
                }),
            };
            outcomes.push(outcome);
        }
        outcomes
    });

    let mut first_error = None;
    let mut results = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok((worker, outputs)) => {
                scope.absorb(worker);
                match outputs {
                    Ok(outputs) => results.extend(outputs),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

/// Evaluate one call of the lambda.
fn invoke(
    engine: &Engine,
    scope: &mut ExecutionScope,
    lambda: &Lambda,
    plan: &Plan,
    args: Vec<NodeOutput>,
) -> Result<NodeOutput> {
    match plan {
        Plan::Direct(folded) => DirectEvaluator::new(engine, folded, args).run(scope),
        Plan::Scheduled => scheduled(engine, scope, lambda, args),
    }
}

/// Bind the arguments as literal nodes, seed their outputs (tags included)
/// into the request results and schedule the substituted body.
fn scheduled(
    engine: &Engine,
    scope: &mut ExecutionScope,
    lambda: &Lambda,
    args: Vec<NodeOutput>,
) -> Result<NodeOutput> {
    let mut bindings: HashMap<String, Node> = HashMap::new();
    for (param, output) in lambda.param_names().zip(args) {
        let literal = Node::literal(output.value.clone());
        scope.results.insert(literal.id(), output);
        bindings.insert(param.to_string(), literal);
    }
    let body = substitute_vars(lambda.body(), &bindings);
    engine
        .execute_in(scope, std::slice::from_ref(&body))?
        .pop()
        .ok_or_else(|| WeftError::InvalidGraph {
            cause: "scheduler returned no output for the lambda body".to_string(),
        })
}
