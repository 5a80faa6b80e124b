//! The engine: compile, schedule and execute graphs.

use crate::builtins;
use crate::compiler;
use crate::config::EngineConfig;
use crate::fanout::ParallelBudget;
use crate::memo::TimeWindowCache;
use crate::scheduler;
use crate::scope::ExecutionScope;
use crate::stats::{Diagnostic, DiagnosticKind, ExecutionStats};
use crate::worker::BackgroundWorkers;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use weft_core::error::{Result, WeftError};
use weft_core::graph::Node;
use weft_core::registry::{MemoryRegistry, OpDef, OpRegistry};
use weft_core::store::{MemoryStore, ObjectStore};
use weft_core::types::{Fingerprint, NodeId, StructuralOracle, Type, TypeOracle};
use weft_core::value::{NodeOutput, Value};

/// User registry in front of the built-in adapter ops.
///
/// User definitions shadow built-ins of the same canonical name.
pub(crate) struct LayeredRegistry {
    user: Arc<dyn OpRegistry>,
    builtins: MemoryRegistry,
}

impl LayeredRegistry {
    fn new(user: Arc<dyn OpRegistry>) -> Self {
        Self {
            user,
            builtins: builtins::registry(),
        }
    }
}

impl OpRegistry for LayeredRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<OpDef>> {
        self.user
            .lookup(name)
            .or_else(|| self.builtins.lookup(name))
    }

    fn find_candidates(&self, common_name: &str) -> Vec<Arc<OpDef>> {
        let mut candidates = self.user.find_candidates(common_name);
        candidates.extend(
            self.builtins
                .find_candidates(common_name)
                .into_iter()
                .filter(|def| self.user.lookup(def.name()).is_none()),
        );
        candidates
    }
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    budget: ParallelBudget,
    registry: LayeredRegistry,
    store: Arc<dyn ObjectStore>,
    oracle: Arc<dyn TypeOracle>,
    workers: BackgroundWorkers,
    refinements: TimeWindowCache<Fingerprint, Type>,
    last_stats: Mutex<Option<ExecutionStats>>,
    last_diagnostics: Mutex<Vec<Diagnostic>>,
}

/// Lazy dataflow engine.
///
/// Cheap to clone; clones share the registry, store, background workers and
/// the cross-request type cache.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use weft_core::prelude::*;
/// use weft_executor::{Engine, EngineConfig};
///
/// let registry = MemoryRegistry::new().with(
///     OpDef::new("number-add", |inputs, _| {
///         Ok(NodeOutput::new(inputs.int("lhs")? + inputs.int("rhs")?))
///     })
///     .input("lhs", Type::Int)
///     .input("rhs", Type::Int)
///     .output(Type::Int),
/// );
/// let engine = Engine::new(
///     EngineConfig::default(),
///     Arc::new(registry),
///     Arc::new(MemoryStore::new()),
/// )?;
///
/// let sum = Node::output(
///     Type::Int,
///     "add",
///     [("lhs", Node::literal(3i64)), ("rhs", Node::literal(4i64))],
/// );
/// assert_eq!(engine.execute(&[sum], false)?, vec![Value::Int(7)]);
/// # Ok::<(), WeftError>(())
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with the structural type oracle.
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn OpRegistry>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        Self::builder()
            .config(config)
            .registry(registry)
            .store(store)
            .build()
    }

    /// Engine over an in-memory store with only the built-in ops.
    pub fn with_defaults() -> Result<Self> {
        Self::builder().build()
    }

    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The object store and run ledger.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    /// The type oracle.
    pub fn oracle(&self) -> &dyn TypeOracle {
        self.inner.oracle.as_ref()
    }

    /// Registry view including built-ins.
    pub fn registry(&self) -> &dyn OpRegistry {
        &self.inner.registry
    }

    /// Statistics of the most recent top-level request.
    pub fn last_stats(&self) -> Option<ExecutionStats> {
        self.inner.last_stats.lock().clone()
    }

    /// Strict-mode diagnostics of the most recent top-level request.
    pub fn last_diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.last_diagnostics.lock().clone()
    }

    /// Background runs dispatched and not yet completed.
    pub fn in_flight_runs(&self) -> usize {
        self.inner.workers.in_flight()
    }

    /// Rewrite `nodes` through the compiler passes.
    ///
    /// Refinement may execute upstream nodes; their results are discarded
    /// with the request, but ledger writes persist.
    #[instrument(skip_all, fields(roots = nodes.len()))]
    pub fn compile(&self, nodes: &[Node]) -> Result<Vec<Node>> {
        let mut scope = self.new_scope(false);
        let compiled = self.compile_in(&mut scope, nodes);
        self.publish(scope);
        compiled
    }

    /// Compile, schedule and execute `nodes`; values come back in input order.
    ///
    /// With `no_cache` the run ledger is not consulted, though results are
    /// still recorded. Async ops yield [`Value::Run`] handles.
    pub fn execute(&self, nodes: &[Node], no_cache: bool) -> Result<Vec<Value>> {
        Ok(self
            .execute_outputs(nodes, no_cache)?
            .into_iter()
            .map(|output| output.value)
            .collect())
    }

    /// Like [`execute`](Self::execute) but keeps tags and store references.
    #[instrument(skip_all, fields(roots = nodes.len(), no_cache = no_cache))]
    pub fn execute_outputs(&self, nodes: &[Node], no_cache: bool) -> Result<Vec<NodeOutput>> {
        let started = Instant::now();
        let mut scope = self.new_scope(no_cache);
        let outputs = self.execute_in(&mut scope, nodes);
        scope.stats.elapsed = started.elapsed();
        self.publish(scope);
        outputs
    }

    pub(crate) fn new_scope(&self, no_cache: bool) -> ExecutionScope {
        ExecutionScope::new(self.inner.budget, no_cache)
    }

    /// Compile unless a compile is already under way in this scope.
    pub(crate) fn compile_in(&self, scope: &mut ExecutionScope, nodes: &[Node]) -> Result<Vec<Node>> {
        if scope.compiling {
            return Ok(nodes.to_vec());
        }
        scope.compiling = true;
        let compiled = compiler::compile(self, scope, nodes);
        scope.compiling = false;
        compiled
    }

    /// Compile and run within an existing scope.
    pub(crate) fn execute_in(
        &self,
        scope: &mut ExecutionScope,
        nodes: &[Node],
    ) -> Result<Vec<NodeOutput>> {
        let compiled = self.compile_in(scope, nodes)?;
        scheduler::run_graph(self, scope, &compiled)
    }

    /// Definition under an exact canonical name.
    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<OpDef>> {
        self.inner
            .registry
            .lookup(name)
            .ok_or_else(|| WeftError::UnknownOperation {
                op: name.to_string(),
            })
    }

    pub(crate) fn workers(&self) -> &BackgroundWorkers {
        &self.inner.workers
    }

    pub(crate) fn refinements(&self) -> &TimeWindowCache<Fingerprint, Type> {
        &self.inner.refinements
    }

    /// Warn about a type mismatch; in strict mode also record it.
    pub(crate) fn check_type(
        &self,
        scope: &mut ExecutionScope,
        kind: DiagnosticKind,
        op: &str,
        node: NodeId,
        expected: &Type,
        actual: &Type,
    ) {
        if matches!(expected, Type::Any) || self.oracle().is_assignable(expected, actual) {
            return;
        }
        tracing::warn!(
            op = %op,
            node = %node,
            expected = %expected,
            actual = %actual,
            kind = ?kind,
            "Type mismatch"
        );
        if self.inner.config.strict_types {
            scope.diagnostics.push(Diagnostic {
                kind,
                op: op.to_string(),
                node,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    fn publish(&self, mut scope: ExecutionScope) {
        scope.finish();
        let stats = scope.stats;
        tracing::info!(
            nodes = stats.nodes_executed,
            waves = stats.waves,
            invocations = stats.total_invocations(),
            cache_hits = stats.total_cache_hits(),
            peak_threads = stats.peak_fanout_threads,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Execution finished"
        );
        *self.inner.last_stats.lock() = Some(stats);
        *self.inner.last_diagnostics.lock() = scope.diagnostics;
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("budget", &self.inner.budget)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    registry: Option<Arc<dyn OpRegistry>>,
    store: Option<Arc<dyn ObjectStore>>,
    oracle: Option<Arc<dyn TypeOracle>>,
}

impl EngineBuilder {
    /// Set the configuration (default: [`EngineConfig::default`]).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the user op registry (default: empty).
    pub fn registry(mut self, registry: Arc<dyn OpRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the object store (default: [`MemoryStore`]).
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the type oracle (default: [`StructuralOracle`]).
    pub fn oracle(mut self, oracle: Arc<dyn TypeOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Validate the configuration and start the background workers.
    pub fn build(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let workers = BackgroundWorkers::new(config.worker_threads)?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(MemoryRegistry::new()));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let oracle = self
            .oracle
            .unwrap_or_else(|| Arc::new(StructuralOracle::new()));

        tracing::debug!(
            max_parallelism = config.max_parallelism,
            worker_threads = config.worker_threads,
            cache = config.cache_enabled,
            strict = config.strict_types,
            "Engine created"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                budget: ParallelBudget::new(config.max_parallelism),
                refinements: TimeWindowCache::new(config.memo_capacity, config.memo_window),
                registry: LayeredRegistry::new(registry),
                store,
                oracle,
                workers,
                last_stats: Mutex::new(None),
                last_diagnostics: Mutex::new(Vec::new()),
                config,
            }),
        })
    }
}
