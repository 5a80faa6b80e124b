//! Operation definitions.

use super::context::ResolveContext;
use super::inputs::OpInputs;
use crate::error::Result;
use crate::types::Type;
use crate::value::NodeOutput;
use std::fmt;
use std::sync::Arc;

/// Resolver body of an op.
pub type ResolverFn =
    Arc<dyn Fn(&OpInputs, &mut dyn ResolveContext) -> Result<NodeOutput> + Send + Sync>;

/// Output type computed from the (possibly unrefined) input types.
pub type DeriveTypeFn = Arc<dyn Fn(&[Type]) -> Type + Send + Sync>;

/// Output type computed from actual input values; may require execution.
pub type RefineFn = Arc<dyn Fn(&OpInputs) -> Result<Type> + Send + Sync>;

/// How an op's declared output type is obtained.
#[derive(Clone)]
pub enum OutputType {
    /// Independent of the inputs.
    Fixed(Type),
    /// Derived from the input types.
    Derived(DeriveTypeFn),
}

impl fmt::Debug for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(ty) => write!(f, "Fixed({})", ty),
            Self::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// Whether the same inputs always yield the same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    /// Deterministic; eligible for the run cache.
    Pure,
    /// Side-effecting or nondeterministic; always re-run.
    Impure,
}

/// Where an op's resolver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Inline on the evaluating thread.
    Sync,
    /// On a background worker; the node yields a run handle.
    Async,
}

/// Tag propagation behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFlow {
    /// Results carry only the tags the resolver attaches.
    None,
    /// Results inherit the tags of the first argument.
    FromFirstArg,
}

/// Scheduling constraints that disqualify the fan-out fast path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpFlags {
    /// Results must always go through the run ledger.
    pub cache_required: bool,
    /// Must be scheduled by the forward-graph engine, never evaluated directly.
    pub graph_engine_required: bool,
    /// Never write a run record for this op.
    pub no_ledger: bool,
}

/// A registered operation: signature, flags, and resolver.
#[derive(Clone)]
pub struct OpDef {
    name: String,
    common_name: String,
    inputs: Vec<(String, Type)>,
    output: OutputType,
    refine: Option<RefineFn>,
    purity: Purity,
    kind: OpKind,
    tag_flow: TagFlow,
    flags: OpFlags,
    resolver: ResolverFn,
}

impl OpDef {
    /// Create a pure, synchronous op with no inputs and `Any` output.
    ///
    /// The common name is the part after the last `-` (`number-add` -> `add`).
    pub fn new<F>(name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&OpInputs, &mut dyn ResolveContext) -> Result<NodeOutput> + Send + Sync + 'static,
    {
        let name = name.into();
        let common_name = name
            .rsplit_once('-')
            .map(|(_, common)| common.to_string())
            .unwrap_or_else(|| name.clone());
        Self {
            name,
            common_name,
            inputs: Vec::new(),
            output: OutputType::Fixed(Type::Any),
            refine: None,
            purity: Purity::Pure,
            kind: OpKind::Sync,
            tag_flow: TagFlow::None,
            flags: OpFlags::default(),
            resolver: Arc::new(resolver),
        }
    }

    /// Append an input parameter.
    pub fn input(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.inputs.push((name.into(), ty));
        self
    }

    /// Fixed output type.
    pub fn output(mut self, ty: Type) -> Self {
        self.output = OutputType::Fixed(ty);
        self
    }

    /// Output type derived from input types.
    pub fn derive_output<F>(mut self, derive: F) -> Self
    where
        F: Fn(&[Type]) -> Type + Send + Sync + 'static,
    {
        self.output = OutputType::Derived(Arc::new(derive));
        self
    }

    /// Refine the output type from executed inputs.
    pub fn refine<F>(mut self, refine: F) -> Self
    where
        F: Fn(&OpInputs) -> Result<Type> + Send + Sync + 'static,
    {
        self.refine = Some(Arc::new(refine));
        self
    }

    /// Override the dispatch name.
    pub fn common_name(mut self, common: impl Into<String>) -> Self {
        self.common_name = common.into();
        self
    }

    /// Mark the op impure.
    pub fn impure(mut self) -> Self {
        self.purity = Purity::Impure;
        self
    }

    /// Run the resolver on a background worker.
    pub fn asynchronous(mut self) -> Self {
        self.kind = OpKind::Async;
        self
    }

    /// Inherit the first argument's tags.
    pub fn flows_tags(mut self) -> Self {
        self.tag_flow = TagFlow::FromFirstArg;
        self
    }

    /// Set scheduling flags.
    pub fn flags(mut self, flags: OpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch name.
    pub fn dispatch_name(&self) -> &str {
        &self.common_name
    }

    /// Ordered input signature.
    pub fn inputs(&self) -> &[(String, Type)] {
        &self.inputs
    }

    /// Input parameter names in order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(name, _)| name.as_str())
    }

    /// Declared output type for the given input types.
    pub fn output_type(&self, arg_types: &[Type]) -> Type {
        match &self.output {
            OutputType::Fixed(ty) => ty.clone(),
            OutputType::Derived(derive) => derive(arg_types),
        }
    }

    /// The refiner, when the op has one.
    pub fn refiner(&self) -> Option<&RefineFn> {
        self.refine.as_ref()
    }

    /// Purity.
    pub fn purity(&self) -> Purity {
        self.purity
    }

    /// Whether the op is pure.
    pub fn is_pure(&self) -> bool {
        self.purity == Purity::Pure
    }

    /// Sync or async.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Whether the op runs on a background worker.
    pub fn is_async(&self) -> bool {
        self.kind == OpKind::Async
    }

    /// Tag propagation.
    pub fn tag_flow(&self) -> TagFlow {
        self.tag_flow
    }

    /// Scheduling flags.
    pub fn op_flags(&self) -> OpFlags {
        self.flags
    }

    /// Invoke the resolver.
    pub fn resolve(&self, inputs: &OpInputs, ctx: &mut dyn ResolveContext) -> Result<NodeOutput> {
        (self.resolver)(inputs, ctx)
    }
}

impl fmt::Debug for OpDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDef")
            .field("name", &self.name)
            .field("common_name", &self.common_name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("purity", &self.purity)
            .field("kind", &self.kind)
            .field("tag_flow", &self.tag_flow)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_name_is_derived_from_suffix() {
        let def = OpDef::new("number-add", |_, _| Ok(NodeOutput::new(0i64)));
        assert_eq!(def.dispatch_name(), "add");
        let def = OpDef::new("count", |_, _| Ok(NodeOutput::new(0i64)));
        assert_eq!(def.dispatch_name(), "count");
    }

    #[test]
    fn derived_output_uses_arg_types() {
        let def = OpDef::new("list-first", |_, _| Ok(NodeOutput::new(0i64)))
            .input("arr", Type::list(Type::Any))
            .derive_output(|args| {
                args.first()
                    .and_then(Type::list_item)
                    .cloned()
                    .unwrap_or(Type::Any)
            });
        assert_eq!(def.output_type(&[Type::list(Type::String)]), Type::String);
    }

    #[test]
    fn builder_flags() {
        let def = OpDef::new("run-train", |_, _| Ok(NodeOutput::new(0i64)))
            .asynchronous()
            .impure()
            .flows_tags();
        assert!(def.is_async());
        assert!(!def.is_pure());
        assert_eq!(def.tag_flow(), TagFlow::FromFirstArg);
    }
}
