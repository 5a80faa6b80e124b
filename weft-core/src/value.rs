//! Runtime values, tags, and node outputs.
//!
//! A [`Value`] is what a resolver computes. A [`NodeOutput`] is a value plus
//! the out-of-band [`TagMap`] attached to it and, once persisted, the store
//! reference it lives under. Tags never contribute to a value's type or to
//! its content reference.

use crate::graph::Lambda;
use crate::store::{ObjectRef, RunHandle};
use crate::types::{Digester, Type};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Out-of-band provenance metadata attached to a runtime value.
pub type TagMap = BTreeMap<String, Value>;

/// Dynamic runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// List.
    List(Vec<Value>),
    /// String-keyed map.
    Dict(BTreeMap<String, Value>),
    /// A function value whose body is an IR subgraph.
    Function(Lambda),
    /// Handle to a background run.
    Run(RunHandle),
}

impl Value {
    /// Create a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    /// Create a dict from `(key, value)` pairs.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Float view; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// List view.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Dict view.
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Function view.
    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Self::Function(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// Run handle view.
    pub fn as_run(&self) -> Option<&RunHandle> {
        match self {
            Self::Run(run) => Some(run),
            _ => None,
        }
    }

    /// Field of a dict value.
    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.as_dict().and_then(|map| map.get(key))
    }

    /// Short name of the value's shape, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "none",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Function(_) => "function",
            Self::Run(_) => "run",
        }
    }

    /// Structural type of the value.
    pub fn type_of(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::String(_) => Type::String,
            Self::List(items) => Type::list(Type::union(items.iter().map(Value::type_of))),
            Self::Dict(map) => Type::TypedDict(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.type_of()))
                    .collect(),
            ),
            Self::Function(lambda) => lambda.ty(),
            Self::Run(_) => Type::run(Type::Any),
        }
    }

    /// Content digest: equal values produce equal digests.
    pub fn digest(&self) -> String {
        let mut digester = Digester::new("value");
        self.feed(&mut digester);
        digester.finish()
    }

    fn feed(&self, d: &mut Digester) {
        match self {
            Self::Null => {
                d.field("n");
            }
            Self::Bool(b) => {
                d.field("b").field(if *b { "1" } else { "0" });
            }
            Self::Int(v) => {
                d.field("i").field(&v.to_string());
            }
            Self::Float(v) => {
                d.field("f").field(&v.to_bits().to_string());
            }
            Self::String(s) => {
                d.field("s").field(s);
            }
            Self::List(items) => {
                d.field("l").field(&items.len().to_string());
                for item in items {
                    item.feed(d);
                }
            }
            Self::Dict(map) => {
                d.field("d").field(&map.len().to_string());
                for (k, v) in map {
                    d.field(k);
                    v.feed(d);
                }
            }
            Self::Function(lambda) => {
                d.field("fn").field(&lambda.digest());
            }
            Self::Run(run) => {
                d.field("run").field(run.fingerprint().as_str());
            }
        }
    }

    /// JSON rendering; functions and runs render as reference objects.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => {
                serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number)
            }
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Self::Dict(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Function(lambda) => serde_json::json!({ "$fn": lambda.digest() }),
            Self::Run(run) => serde_json::json!({ "$run": run.fingerprint().as_str() }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.digest() == b.digest(),
            (Self::Run(a), Self::Run(b)) => a.fingerprint() == b.fingerprint(),
            _ => false,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => {
                Self::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Result of evaluating one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    /// The computed value.
    pub value: Value,
    /// Tags attached to the value.
    pub tags: TagMap,
    /// Store reference, once the value has been persisted or retrieved.
    pub object_ref: Option<ObjectRef>,
}

impl NodeOutput {
    /// Untagged, unpersisted output.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            tags: TagMap::new(),
            object_ref: None,
        }
    }

    /// Output that already lives in the store under `object_ref`.
    pub fn stored(value: Value, object_ref: ObjectRef) -> Self {
        Self {
            value,
            tags: TagMap::new(),
            object_ref: Some(object_ref),
        }
    }

    /// Attach one tag.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Attach a set of tags; existing names are overwritten.
    pub fn with_tags(mut self, tags: &TagMap) -> Self {
        self.tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Look up a tag.
    pub fn tag(&self, name: &str) -> Option<&Value> {
        self.tags.get(name)
    }

    /// Content reference of the value, computing it when not yet stored.
    pub fn reference(&self) -> ObjectRef {
        self.object_ref
            .clone()
            .unwrap_or_else(|| ObjectRef::for_value(&self.value))
    }
}
