//! Structural type model.

use std::collections::BTreeMap;
use std::fmt;

/// Type annotation carried by every IR node.
///
/// Types are structural: two `TypedDict`s with the same fields are the same
/// type. Tags never participate in a value's type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Unknown or unconstrained.
    Any,
    /// The null value.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// `Int` or `Float`.
    Number,
    /// UTF-8 string.
    String,
    /// Homogeneous list.
    List(Box<Type>),
    /// String-keyed map with a common value type.
    Dict(Box<Type>),
    /// String-keyed map with known fields.
    TypedDict(BTreeMap<String, Type>),
    /// Function value (lambda) with ordered parameters.
    Function {
        /// Parameter names and types, in call order.
        inputs: Vec<(String, Type)>,
        /// Type of the body.
        output: Box<Type>,
    },
    /// Handle to a background run that will eventually produce the inner type.
    Run(Box<Type>),
    /// One of several types.
    Union(Vec<Type>),
}

impl Type {
    /// `List<item>`.
    pub fn list(item: Type) -> Self {
        Self::List(Box::new(item))
    }

    /// `Dict<value>`.
    pub fn dict(value: Type) -> Self {
        Self::Dict(Box::new(value))
    }

    /// `Run<output>`.
    pub fn run(output: Type) -> Self {
        Self::Run(Box::new(output))
    }

    /// A typed dict from `(field, type)` pairs.
    pub fn typed_dict<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Self::TypedDict(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    /// A function type.
    pub fn function<I, K>(inputs: I, output: Type) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Self::Function {
            inputs: inputs.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            output: Box::new(output),
        }
    }

    /// Normalized union: flattened, deduplicated, collapsed when trivial.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Self::Union(inner) => {
                    for t in inner {
                        if !flat.contains(&t) {
                            flat.push(t);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        if flat.contains(&Self::Any) {
            return Self::Any;
        }
        match flat.len() {
            0 => Self::Any,
            1 => flat.pop().unwrap_or(Self::Any),
            _ => Self::Union(flat),
        }
    }

    /// Whether this is the pending-result type of an async op.
    pub fn is_run(&self) -> bool {
        matches!(self, Self::Run(_))
    }

    /// Whether this is a function type.
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }

    /// Output type of a function, or of the value a run will produce.
    pub fn unwrapped(&self) -> Option<&Type> {
        match self {
            Self::Function { output, .. } => Some(output),
            Self::Run(inner) => Some(inner),
            _ => None,
        }
    }

    /// Element type of a list.
    pub fn list_item(&self) -> Option<&Type> {
        match self {
            Self::List(item) => Some(item),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Null => write!(f, "none"),
            Self::Bool => write!(f, "boolean"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::List(item) => write!(f, "list<{}>", item),
            Self::Dict(value) => write!(f, "dict<{}>", value),
            Self::TypedDict(fields) => {
                write!(f, "{{")?;
                for (i, (k, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, t)?;
                }
                write!(f, "}}")
            }
            Self::Function { inputs, output } => {
                write!(f, "fn(")?;
                for (i, (k, t)) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, t)?;
                }
                write!(f, ") -> {}", output)
            }
            Self::Run(inner) => write!(f, "run<{}>", inner),
            Self::Union(members) => {
                for (i, t) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", t)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_normalizes() {
        assert_eq!(Type::union([Type::Int]), Type::Int);
        assert_eq!(Type::union([Type::Int, Type::Int]), Type::Int);
        assert_eq!(Type::union([Type::Int, Type::Any]), Type::Any);
        assert_eq!(
            Type::union([Type::Union(vec![Type::Int, Type::String]), Type::Int]),
            Type::Union(vec![Type::Int, Type::String])
        );
        assert_eq!(Type::union(Vec::new()), Type::Any);
    }

    #[test]
    fn display() {
        let t = Type::function([("row", Type::Int)], Type::list(Type::String));
        assert_eq!(t.to_string(), "fn(row: int) -> list<string>");
        assert_eq!(Type::run(Type::Float).to_string(), "run<float>");
    }
}
