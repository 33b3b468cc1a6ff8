//! Host-side values.
//!
//! `HostValue` is what registered classes, result rows and the resolver work
//! with. Domain objects travel as type-erased `Instance`s.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use hostbridge_core::{BridgeError, Operation, Result, Symbol, Term};

/// A registered (or registrable) host object.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    repr: String,
}

impl Instance {
    pub fn new<T: Any + Send + Sync + fmt::Debug>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing allocation; clones of the `Arc` stay the same object.
    pub fn from_arc<T: Any + Send + Sync + fmt::Debug>(value: Arc<T>) -> Self {
        let repr = format!("{value:?}");
        Self {
            inner: value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            repr,
        }
    }

    /// The shared "none" singleton.
    pub fn nil() -> Self {
        static NIL: OnceLock<Instance> = OnceLock::new();
        NIL.get_or_init(|| Instance::new(Nil)).clone()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name.
    pub fn short_type_name(&self) -> &'static str {
        short_name(self.type_name)
    }

    pub fn repr(&self) -> &str {
        &self.repr
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn is_nil(&self) -> bool {
        self.is::<Nil>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Like `downcast_ref` but reports the mismatch.
    pub fn downcast<T: Any>(&self) -> Result<&T> {
        self.downcast_ref().ok_or_else(|| BridgeError::Conversion {
            expected: std::any::type_name::<T>().to_string(),
            found: self.type_name.to_string(),
        })
    }

    /// Same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(&other.inner) as *const (),
        )
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

/// Identity comparison; value equality goes through class capabilities.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

pub(crate) fn short_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// The host's "none" value when it must be an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nil;

/// Receiver standing for a registered class (class methods, MRO entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<HostValue>),
    Dictionary(BTreeMap<String, HostValue>),
    Instance(Instance),
    /// Unbound engine variable.
    Variable(Symbol),
    /// Symbolic constraint, only produced when expressions are accepted.
    Expression(Operation),
    /// Engine-shaped value passed through untouched.
    Term(Term),
}

impl HostValue {
    pub fn instance<T: Any + Send + Sync + fmt::Debug>(value: T) -> Self {
        HostValue::Instance(Instance::new(value))
    }

    /// `TypeId` used for class identity checks.
    pub fn host_type_id(&self) -> Option<TypeId> {
        Some(match self {
            HostValue::None => TypeId::of::<Nil>(),
            HostValue::Boolean(_) => TypeId::of::<bool>(),
            HostValue::Integer(_) => TypeId::of::<i64>(),
            HostValue::Float(_) => TypeId::of::<f64>(),
            HostValue::String(_) => TypeId::of::<String>(),
            HostValue::List(_) => TypeId::of::<Vec<HostValue>>(),
            HostValue::Dictionary(_) => TypeId::of::<BTreeMap<String, HostValue>>(),
            HostValue::Instance(i) => i.type_id(),
            HostValue::Variable(_) | HostValue::Expression(_) | HostValue::Term(_) => return None,
        })
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            HostValue::None => "None",
            HostValue::Boolean(_) => "Boolean",
            HostValue::Integer(_) => "Integer",
            HostValue::Float(_) => "Float",
            HostValue::String(_) => "String",
            HostValue::List(_) => "List",
            HostValue::Dictionary(_) => "Dictionary",
            HostValue::Instance(i) => i.short_type_name(),
            HostValue::Variable(_) => "Variable",
            HostValue::Expression(_) => "Expression",
            HostValue::Term(_) => "Term",
        }
    }

    pub fn repr(&self) -> String {
        match self {
            HostValue::Instance(i) => i.repr().to_string(),
            HostValue::String(s) => format!("{s:?}"),
            other => format!("{other:?}"),
        }
    }

    /// Primitives and collections become typed instances so builtin class
    /// methods can run on them.
    pub fn to_instance(&self) -> Option<Instance> {
        Some(match self {
            HostValue::None => Instance::nil(),
            HostValue::Boolean(b) => Instance::new(*b),
            HostValue::Integer(i) => Instance::new(*i),
            HostValue::Float(f) => Instance::new(*f),
            HostValue::String(s) => Instance::new(s.clone()),
            HostValue::List(l) => Instance::new(l.clone()),
            HostValue::Dictionary(d) => Instance::new(d.clone()),
            HostValue::Instance(i) => i.clone(),
            HostValue::Variable(_) | HostValue::Expression(_) | HostValue::Term(_) => return None,
        })
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            HostValue::Instance(i) => i.downcast_ref(),
            _ => None,
        }
    }

    pub fn extract<T: FromHost>(self) -> Result<T> {
        T::from_host(self)
    }
}

macro_rules! host_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for HostValue {
            fn from(v: $ty) -> Self {
                HostValue::$variant(v.into())
            }
        })*
    };
}

host_from! {
    bool => Boolean,
    i64 => Integer,
    i32 => Integer,
    u32 => Integer,
    f64 => Float,
    f32 => Float,
    String => String,
    &str => String,
    Instance => Instance,
    Symbol => Variable,
    Operation => Expression,
    Term => Term,
}

impl From<Nil> for HostValue {
    fn from(_: Nil) -> Self {
        HostValue::None
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::None, Into::into)
    }
}

impl<T: Into<HostValue>> From<BTreeMap<String, T>> for HostValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        HostValue::Dictionary(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Extraction of typed Rust values from a `HostValue`.
pub trait FromHost: Sized {
    fn from_host(value: HostValue) -> Result<Self>;
}

fn mismatch<T>(value: &HostValue) -> BridgeError {
    BridgeError::Conversion {
        expected: short_name(std::any::type_name::<T>()).to_string(),
        found: value.type_label().to_string(),
    }
}

impl FromHost for HostValue {
    fn from_host(value: HostValue) -> Result<Self> {
        Ok(value)
    }
}

impl FromHost for bool {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Boolean(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromHost for i64 {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Integer(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromHost for f64 {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Float(f) => Ok(f),
            HostValue::Integer(i) => Ok(i as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromHost for String {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromHost for Instance {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Instance(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FromHost> FromHost for Vec<T> {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::List(items) => items.into_iter().map(T::from_host).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FromHost> FromHost for BTreeMap<String, T> {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Dictionary(fields) => fields
                .into_iter()
                .map(|(k, v)| Ok((k, T::from_host(v)?)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::None => Ok(None),
            other => T::from_host(other).map(Some),
        }
    }
}

/// Positional argument `index`, extracted as `T`.
pub fn arg<T: FromHost>(args: &[HostValue], index: usize) -> Result<T> {
    let value = args.get(index).cloned().ok_or_else(|| BridgeError::Conversion {
        expected: format!("argument {index}"),
        found: "nothing".to_string(),
    })?;
    T::from_host(value)
}

/// Positional argument `index` as a reference to a domain object.
pub fn arg_ref<T: Any>(args: &[HostValue], index: usize) -> Result<&T> {
    match args.get(index) {
        Some(HostValue::Instance(i)) => i.downcast(),
        Some(other) => Err(mismatch::<T>(other)),
        None => Err(BridgeError::Conversion {
            expected: format!("argument {index}"),
            found: "nothing".to_string(),
        }),
    }
}
