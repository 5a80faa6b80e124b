//! Resolved inputs handed to a resolver.

use crate::error::{Result, WeftError};
use crate::graph::Lambda;
use crate::store::RunHandle;
use crate::value::{NodeOutput, TagMap, Value};

/// Ordered, tag-aware view of an op's resolved inputs.
#[derive(Debug, Clone, Default)]
pub struct OpInputs {
    op: String,
    entries: Vec<(String, NodeOutput)>,
}

impl OpInputs {
    /// Create an empty input set for `op`.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            entries: Vec::new(),
        }
    }

    /// Append a bound input.
    pub fn push(&mut self, name: impl Into<String>, output: NodeOutput) {
        self.entries.push((name.into(), output));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, output: NodeOutput) -> Self {
        self.push(name, output);
        self
    }

    /// Name of the op the inputs belong to.
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Number of bound inputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no inputs are bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inputs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeOutput)> {
        self.entries.iter().map(|(name, out)| (name.as_str(), out))
    }

    /// Input values in binding order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, out)| &out.value)
    }

    /// The first bound input, which tag-flowing ops inherit from.
    pub fn first(&self) -> Option<&NodeOutput> {
        self.entries.first().map(|(_, out)| out)
    }

    /// Full output (value and tags) of a named input.
    pub fn output(&self, name: &str) -> Result<&NodeOutput> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, out)| out)
            .ok_or_else(|| WeftError::MissingInput {
                op: self.op.clone(),
                input: name.to_string(),
            })
    }

    /// Value of a named input.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.output(name).map(|out| &out.value)
    }

    /// Tags of a named input.
    pub fn tags(&self, name: &str) -> Result<&TagMap> {
        self.output(name).map(|out| &out.tags)
    }

    /// Integer input.
    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_i64().ok_or_else(|| type_error(name, "int", value))
    }

    /// Numeric input, widened to f64.
    pub fn f64(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| type_error(name, "number", value))
    }

    /// String input.
    pub fn str(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| type_error(name, "string", value))
    }

    /// List input.
    pub fn list(&self, name: &str) -> Result<&[Value]> {
        let value = self.get(name)?;
        value.as_list().ok_or_else(|| type_error(name, "list", value))
    }

    /// Function input.
    pub fn lambda(&self, name: &str) -> Result<&Lambda> {
        let value = self.get(name)?;
        value
            .as_lambda()
            .ok_or_else(|| type_error(name, "function", value))
    }

    /// Run handle input.
    pub fn run(&self, name: &str) -> Result<&RunHandle> {
        let value = self.get(name)?;
        value.as_run().ok_or_else(|| type_error(name, "run", value))
    }
}

fn type_error(input: &str, expected: &str, actual: &Value) -> WeftError {
    WeftError::InputType {
        input: input.to_string(),
        expected: expected.to_string(),
        actual: actual.kind_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let inputs = OpInputs::new("number-add")
            .with("lhs", NodeOutput::new(3i64))
            .with("rhs", NodeOutput::new(2.5));
        assert_eq!(inputs.int("lhs").unwrap(), 3);
        assert_eq!(inputs.f64("rhs").unwrap(), 2.5);
        assert_eq!(inputs.f64("lhs").unwrap(), 3.0);
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn missing_and_mistyped_inputs() {
        let inputs = OpInputs::new("number-add").with("lhs", NodeOutput::new("x"));
        assert!(matches!(
            inputs.get("rhs"),
            Err(WeftError::MissingInput { ref input, .. }) if input == "rhs"
        ));
        assert!(matches!(
            inputs.int("lhs"),
            Err(WeftError::InputType { ref actual, .. }) if actual == "string"
        ));
    }

    #[test]
    fn first_carries_tags() {
        let inputs = OpInputs::new("identity")
            .with("val", NodeOutput::new(1i64).with_tag("run", "r1"));
        assert_eq!(
            inputs.first().and_then(|o| o.tag("run")),
            Some(&Value::string("r1"))
        );
    }
}
