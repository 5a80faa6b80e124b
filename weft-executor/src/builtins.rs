//! Built-in adapter ops every engine registers.
//!
//! User registries may shadow any of these by canonical name.

use weft_core::registry::{MemoryRegistry, OpDef};
use weft_core::types::Type;
use weft_core::value::{NodeOutput, Value};

/// Blocks the evaluating thread until a run completes; inserted by coercion.
pub(crate) const AWAIT_OP: &str = "run-await";
/// Calls a zero-argument function value; inserted by coercion.
pub(crate) const CALL_OP: &str = "function-call";
/// Fan-out entry point.
pub(crate) const MAP_OP: &str = "map";
/// Retrieval of a named store object.
pub(crate) const GET_OP: &str = "get";
/// Returns its input.
pub(crate) const IDENTITY_OP: &str = "identity";

fn unwrapped_first(args: &[Type]) -> Type {
    args.first()
        .and_then(Type::unwrapped)
        .cloned()
        .unwrap_or(Type::Any)
}

pub(crate) fn registry() -> MemoryRegistry {
    let thunk = Type::function(Vec::<(String, Type)>::new(), Type::Any);
    let row_fn = Type::function([("row", Type::Any)], Type::Any);

    MemoryRegistry::new()
        .with(
            OpDef::new(AWAIT_OP, |inputs, _| inputs.run("run")?.wait())
                .input("run", Type::run(Type::Any))
                .derive_output(unwrapped_first)
                .flows_tags(),
        )
        .with(
            OpDef::new(CALL_OP, |inputs, ctx| {
                ctx.apply(inputs.lambda("fn")?, Vec::new())
            })
            .input("fn", thunk)
            .derive_output(unwrapped_first)
            .impure(),
        )
        .with(
            OpDef::new(MAP_OP, |inputs, ctx| {
                let tags = inputs.tags("arr")?;
                let items = inputs
                    .list("arr")?
                    .iter()
                    .map(|item| NodeOutput::new(item.clone()).with_tags(tags))
                    .collect();
                let outputs = ctx.fan_out(inputs.lambda("fn")?, items)?;
                Ok(NodeOutput::new(Value::List(
                    outputs.into_iter().map(|o| o.value).collect(),
                )))
            })
            .input("arr", Type::list(Type::Any))
            .input("fn", row_fn)
            .derive_output(|args| {
                Type::list(args.get(1).and_then(Type::unwrapped).cloned().unwrap_or(Type::Any))
            })
            .impure()
            .flows_tags(),
        )
        .with(
            OpDef::new(GET_OP, |inputs, ctx| ctx.store().get_by_name(inputs.str("name")?))
                .input("name", Type::String)
                .impure(),
        )
        .with(
            OpDef::new(IDENTITY_OP, |inputs, _| Ok(inputs.output("v")?.clone()))
                .input("v", Type::Any)
                .derive_output(|args| args.first().cloned().unwrap_or(Type::Any))
                .flows_tags(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::registry::OpRegistry;

    #[test]
    fn adapters_are_registered_under_their_common_names() {
        let registry = registry();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.find_candidates("await").len(), 1);
        assert_eq!(registry.find_candidates("call").len(), 1);
        assert!(registry.lookup(MAP_OP).is_some_and(|def| !def.is_pure()));
    }

    #[test]
    fn await_output_is_the_run_output_type() {
        let registry = registry();
        let def = registry.lookup(AWAIT_OP).unwrap();
        assert_eq!(def.output_type(&[Type::run(Type::Int)]), Type::Int);
    }
}
