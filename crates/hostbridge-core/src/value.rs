//! Engine value model.
//!
//! A `Value` is a closed tagged union; exactly one variant is populated. Every
//! value crosses the foreign interface wrapped in a `Term`. The serde derives
//! here are the wire format (externally tagged JSON); entry points live in
//! [`crate::protocol::wire`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Interned-by-value name (variables, attributes, class tags, dict keys).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: AsRef<str>> From<T> for Symbol {
    fn from(other: T) -> Self {
        Symbol(other.as_ref().to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A number. Integer and Float are never coerced into each other on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Numeric {
    Integer(i64),
    /// Non-finite values travel as `"Infinity"`, `"-Infinity"` or `"NaN"`.
    Float(#[serde(with = "crate::protocol::wire::float")] f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }
}

/// Wrapper every value travels in: `{"value": <Value>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Term {
    value: Value,
}

impl Term {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl<V: Into<Value>> From<V> for Term {
    fn from(v: V) -> Self {
        Term::new(v.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dictionary {
    pub fields: BTreeMap<Symbol, Term>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Handle to a host object. Never the object itself.
///
/// All four keys are always written; absent optionals go out as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalInstance {
    pub instance_id: u64,
    pub constructor: Option<Box<Term>>,
    pub repr: Option<String>,
    pub class_repr: Option<String>,
}

impl ExternalInstance {
    pub fn new(instance_id: u64) -> Self {
        Self {
            instance_id,
            constructor: None,
            repr: None,
            class_repr: None,
        }
    }
}

/// `Tag{field: value, ...}` as written in a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceLiteral {
    pub tag: Symbol,
    pub fields: Dictionary,
}

/// A specializer pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Dictionary(Dictionary),
    Instance(InstanceLiteral),
}

/// Predicate or constructor call: `name(args..., key: value...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Call {
    pub name: Symbol,
    pub args: Vec<Term>,
    pub kwargs: Option<BTreeMap<Symbol, Term>>,
}

impl Call {
    pub fn new(name: &str, args: Vec<Term>) -> Self {
        Self {
            name: Symbol::new(name),
            args,
            kwargs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Debug,
    Print,
    Cut,
    In,
    Isa,
    New,
    Dot,
    Not,
    Mul,
    Div,
    Mod,
    Rem,
    Add,
    Sub,
    Eq,
    Geq,
    Leq,
    Neq,
    Gt,
    Lt,
    Unify,
    Or,
    And,
    ForAll,
    Assign,
}

impl Operator {
    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Debug => "Debug",
            Operator::Print => "Print",
            Operator::Cut => "Cut",
            Operator::In => "In",
            Operator::Isa => "Isa",
            Operator::New => "New",
            Operator::Dot => "Dot",
            Operator::Not => "Not",
            Operator::Mul => "Mul",
            Operator::Div => "Div",
            Operator::Mod => "Mod",
            Operator::Rem => "Rem",
            Operator::Add => "Add",
            Operator::Sub => "Sub",
            Operator::Eq => "Eq",
            Operator::Geq => "Geq",
            Operator::Leq => "Leq",
            Operator::Neq => "Neq",
            Operator::Gt => "Gt",
            Operator::Lt => "Lt",
            Operator::Unify => "Unify",
            Operator::Or => "Or",
            Operator::And => "And",
            Operator::ForAll => "ForAll",
            Operator::Assign => "Assign",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbolic operation (`Expression`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Operation {
    pub operator: Operator,
    pub args: Vec<Term>,
}

/// A variable with the constraints accumulated on it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Partial {
    pub constraints: Vec<Operation>,
    pub variable: Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Number(Numeric),
    String(String),
    List(Vec<Term>),
    Dictionary(Dictionary),
    ExternalInstance(ExternalInstance),
    InstanceLiteral(InstanceLiteral),
    Pattern(Pattern),
    Call(Call),
    Variable(Symbol),
    RestVariable(Symbol),
    Expression(Operation),
    Partial(Partial),
}

impl Value {
    /// Wire tag of the populated variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Dictionary(_) => "Dictionary",
            Value::ExternalInstance(_) => "ExternalInstance",
            Value::InstanceLiteral(_) => "InstanceLiteral",
            Value::Pattern(_) => "Pattern",
            Value::Call(_) => "Call",
            Value::Variable(_) => "Variable",
            Value::RestVariable(_) => "RestVariable",
            Value::Expression(_) => "Expression",
            Value::Partial(_) => "Partial",
        }
    }

    pub fn as_instance_id(&self) -> Option<u64> {
        match self {
            Value::ExternalInstance(ExternalInstance { instance_id, .. }) => Some(*instance_id),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Value::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Numeric::Integer(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(Numeric::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ExternalInstance> for Value {
    fn from(e: ExternalInstance) -> Self {
        Value::ExternalInstance(e)
    }
}

impl From<Call> for Value {
    fn from(c: Call) -> Self {
        Value::Call(c)
    }
}

impl From<Operation> for Value {
    fn from(o: Operation) -> Self {
        Value::Expression(o)
    }
}
