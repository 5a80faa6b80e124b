//! Execution and cache core: evaluate one node against the run ledger.
//!
//! For every output node the core fingerprints the invocation from the
//! canonical op name and the store references of its inputs. Pure ops with
//! caching enabled consult the ledger first; a hit is served without calling
//! the resolver. Misses run synchronously or are handed to a background
//! worker, and finished synchronous runs are written back to the ledger.

mod fingerprint;

pub(crate) use fingerprint::{fingerprint, memo_key, refinement_key};

use crate::context::EngineContext;
use crate::engine::Engine;
use crate::instrument_node;
use crate::scope::ExecutionScope;
use crate::stats::DiagnosticKind;
use std::sync::Arc;
use std::time::{Duration, Instant};
use weft_core::error::{Result, WeftError};
use weft_core::graph::{Node, NodeKind, Op};
use weft_core::registry::{OpDef, OpInputs, TagFlow};
use weft_core::store::{ObjectRef, RunState};
use weft_core::types::Fingerprint;
use weft_core::value::{NodeOutput, Value};

/// Evaluate `node`, whose inputs already have results in `scope`.
///
/// The result is recorded in `scope.results` under the node's identity; a
/// node that already has a result there is returned without any lookup.
pub(crate) fn execute_node(
    engine: &Engine,
    scope: &mut ExecutionScope,
    node: &Node,
) -> Result<NodeOutput> {
    if let Some(done) = scope.results.get(&node.id()) {
        return Ok(done.clone());
    }
    let op = match node.kind() {
        NodeKind::Output(op) => op,
        _ => return input_output(scope, node),
    };

    let span = instrument_node!(node.id(), op.name());
    let _enter = span.enter();

    let def = engine.lookup(op.name())?;
    let inputs = gather_inputs(scope, op)?;
    let refs = input_refs(engine, &inputs)?;
    let fp = fingerprint(def.name(), refs.iter().map(|(name, r)| (name.as_str(), r)));
    scope.stats.nodes_executed += 1;

    let cacheable = def.is_pure() && engine.config().cache_enabled && !scope.no_cache;
    let hit = if cacheable {
        lookup_ledger(engine, &def, &inputs, &fp)?
    } else {
        None
    };

    let output = match hit {
        Some(output) => {
            tracing::debug!(op = %def.name(), fingerprint = %fp, "Cache hit");
            scope.stats.record_cache_hit(def.name());
            output
        }
        None if def.is_async() => start_async(engine, scope, &def, inputs, refs, &fp)?,
        None => run_sync(engine, scope, &def, &inputs, refs, &fp)?,
    };

    if engine.config().strict_types && output.value.as_run().is_none() {
        let actual = engine.oracle().type_of(&output.value);
        engine.check_type(
            scope,
            DiagnosticKind::Result,
            def.name(),
            node.id(),
            node.ty(),
            &actual,
        );
    }

    scope.results.insert(node.id(), output.clone());
    Ok(output)
}

/// Result of an input node: its recorded result, or its literal value.
pub(crate) fn input_output(scope: &ExecutionScope, node: &Node) -> Result<NodeOutput> {
    if let Some(done) = scope.results.get(&node.id()) {
        return Ok(done.clone());
    }
    match node.kind() {
        NodeKind::Const(value) => Ok(NodeOutput::new(value.clone())),
        NodeKind::Void => Ok(NodeOutput::new(Value::Null)),
        NodeKind::Var(name) => Err(WeftError::UnboundVariable { name: name.clone() }),
        NodeKind::Output(op) => Err(WeftError::InvalidGraph {
            cause: format!("input {} ({}) has no result yet", node.id(), op.name()),
        }),
    }
}

fn gather_inputs(scope: &ExecutionScope, op: &Op) -> Result<OpInputs> {
    let mut inputs = OpInputs::new(op.name());
    for (name, input) in op.inputs() {
        inputs.push(name.clone(), input_output(scope, input)?);
    }
    Ok(inputs)
}

/// Store references of the inputs; literals are saved on first use.
fn input_refs(engine: &Engine, inputs: &OpInputs) -> Result<Vec<(String, ObjectRef)>> {
    inputs
        .iter()
        .map(|(name, output)| {
            let reference = match &output.object_ref {
                Some(reference) => reference.clone(),
                None => engine.store().save(&output.value, None)?,
            };
            Ok::<_, WeftError>((name.to_string(), reference))
        })
        .collect()
}

/// Attach the first argument's tags when the op flows them.
///
/// Tags the resolver set itself win over inherited ones.
pub(crate) fn flow_tags(def: &OpDef, inputs: &OpInputs, mut output: NodeOutput) -> NodeOutput {
    if def.tag_flow() == TagFlow::FromFirstArg {
        if let Some(first) = inputs.first() {
            let mut tags = first.tags.clone();
            tags.append(&mut output.tags);
            output.tags = tags;
        }
    }
    output
}

fn lookup_ledger(
    engine: &Engine,
    def: &OpDef,
    inputs: &OpInputs,
    fp: &Fingerprint,
) -> Result<Option<NodeOutput>> {
    let Some(run) = engine.store().get_run(fp)? else {
        return Ok(None);
    };

    if def.is_async() {
        // a failed run is retried rather than adopted
        if matches!(run.state(), RunState::Failed { .. }) {
            return Ok(None);
        }
        return Ok(Some(flow_tags(def, inputs, NodeOutput::new(Value::Run(run)))));
    }

    match (run.state(), run.output_ref()) {
        (RunState::Finished, Some(reference)) => match engine.store().get(&reference) {
            Ok(value) => Ok(Some(flow_tags(
                def,
                inputs,
                NodeOutput::stored(value, reference),
            ))),
            Err(WeftError::ObjectNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        },
        _ => Ok(None),
    }
}

fn start_async(
    engine: &Engine,
    scope: &mut ExecutionScope,
    def: &Arc<OpDef>,
    inputs: OpInputs,
    refs: Vec<(String, ObjectRef)>,
    fp: &Fingerprint,
) -> Result<NodeOutput> {
    let store = engine.store();
    let run = store.new_run(fp, def.name())?;
    run.set_inputs(refs);
    store.save_run(&run)?;

    let output = flow_tags(def, &inputs, NodeOutput::new(Value::Run(run.clone())));
    engine
        .workers()
        .dispatch(engine, Arc::clone(def), inputs, run)?;
    scope.stats.record_invocation(def.name(), Duration::ZERO);
    Ok(output)
}

fn run_sync(
    engine: &Engine,
    scope: &mut ExecutionScope,
    def: &OpDef,
    inputs: &OpInputs,
    refs: Vec<(String, ObjectRef)>,
    fp: &Fingerprint,
) -> Result<NodeOutput> {
    let started = Instant::now();
    let raw = {
        let mut ctx = EngineContext::new(engine, scope, None);
        def.resolve(inputs, &mut ctx)?
    };
    let elapsed = started.elapsed();
    scope.stats.record_invocation(def.name(), elapsed);
    tracing::debug!(
        op = %def.name(),
        fingerprint = %fp,
        elapsed_us = elapsed.as_micros() as u64,
        "Resolver ran"
    );

    if def.is_pure() {
        scope.memo.insert(fp.clone(), raw.clone());
    }
    let mut output = flow_tags(def, inputs, raw);

    // run handles are ledgered by the op that started them
    if output.value.as_run().is_some() {
        return Ok(output);
    }

    let store = engine.store();
    let reference = match &output.object_ref {
        Some(reference) => reference.clone(),
        None => store.save(&output.value, Some(&fp.object_name()))?,
    };
    output.object_ref = Some(reference.clone());

    if !def.op_flags().no_ledger {
        let run = store.new_run(fp, def.name())?;
        run.set_inputs(refs);
        run.finish(output.value.clone(), reference);
        store.save_run(&run)?;
    }
    Ok(output)
}
