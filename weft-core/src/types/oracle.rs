//! Type oracle: runtime typing and assignability rules.

use super::Type;
use crate::value::Value;

/// Pluggable typing rules consulted by the compiler and the strict verifier.
pub trait TypeOracle: Send + Sync {
    /// Type of a runtime value.
    fn type_of(&self, value: &Value) -> Type;

    /// Whether a value of type `from` may flow where `to` is expected.
    fn is_assignable(&self, to: &Type, from: &Type) -> bool;
}

/// Default structural oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOracle;

impl StructuralOracle {
    /// Create the oracle.
    pub fn new() -> Self {
        Self
    }
}

impl TypeOracle for StructuralOracle {
    fn type_of(&self, value: &Value) -> Type {
        value.type_of()
    }

    fn is_assignable(&self, to: &Type, from: &Type) -> bool {
        assignable(to, from)
    }
}

fn assignable(to: &Type, from: &Type) -> bool {
    if to == from || matches!(to, Type::Any) {
        return true;
    }
    if let Type::Union(members) = from {
        return members.iter().all(|m| assignable(to, m));
    }
    if let Type::Union(members) = to {
        return members.iter().any(|m| assignable(m, from));
    }
    match (to, from) {
        (Type::Number, Type::Int | Type::Float) => true,
        (Type::List(a), Type::List(b)) => assignable(a, b),
        (Type::Dict(a), Type::Dict(b)) => assignable(a, b),
        (Type::Dict(a), Type::TypedDict(fields)) => fields.values().all(|t| assignable(a, t)),
        (Type::TypedDict(want), Type::TypedDict(have)) => want
            .iter()
            .all(|(k, t)| have.get(k).is_some_and(|h| assignable(t, h))),
        (Type::Function { output: a, .. }, Type::Function { output: b, .. }) => assignable(a, b),
        (Type::Run(a), Type::Run(b)) => assignable(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_widen() {
        let oracle = StructuralOracle::new();
        assert!(oracle.is_assignable(&Type::Number, &Type::Int));
        assert!(oracle.is_assignable(&Type::Number, &Type::Float));
        assert!(!oracle.is_assignable(&Type::Int, &Type::Number));
    }

    #[test]
    fn any_accepts_everything_but_is_not_accepted() {
        let oracle = StructuralOracle::new();
        assert!(oracle.is_assignable(&Type::Any, &Type::run(Type::Int)));
        assert!(!oracle.is_assignable(&Type::Int, &Type::Any));
    }

    #[test]
    fn typed_dict_width_subtyping() {
        let oracle = StructuralOracle::new();
        let wide = Type::typed_dict([("a", Type::Int), ("b", Type::String)]);
        let narrow = Type::typed_dict([("a", Type::Number)]);
        assert!(oracle.is_assignable(&narrow, &wide));
        assert!(!oracle.is_assignable(&wide, &narrow));
        assert!(!oracle.is_assignable(&Type::dict(Type::Int), &wide));
    }

    #[test]
    fn runs_and_functions_are_distinct_from_their_outputs() {
        let oracle = StructuralOracle::new();
        assert!(!oracle.is_assignable(&Type::Int, &Type::run(Type::Int)));
        let f = Type::function(Vec::<(String, Type)>::new(), Type::Int);
        assert!(!oracle.is_assignable(&Type::Int, &f));
        assert!(oracle.is_assignable(
            &Type::function([("x", Type::Any)], Type::Number),
            &f
        ));
    }

    #[test]
    fn unions() {
        let oracle = StructuralOracle::new();
        let u = Type::union([Type::Int, Type::Float]);
        assert!(oracle.is_assignable(&Type::Number, &u));
        assert!(oracle.is_assignable(&u, &Type::Int));
        assert!(!oracle.is_assignable(&u, &Type::String));
    }
}
