//! Class capability tables.
//!
//! A `Class` records, at registration time, everything the resolver may do
//! with instances of one host type: read attributes, call methods and class
//! methods, construct, compare, order and iterate. Nothing is discovered by
//! reflection at call time.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use hostbridge_core::{BridgeError, InvalidCallReason, Result};

use crate::value::{short_name, HostValue, Instance};

/// Iterator handed out by an iteration capability.
pub type HostIter = Box<dyn Iterator<Item = HostValue> + Send>;

type Getter = Arc<dyn Fn(&Instance) -> Result<HostValue> + Send + Sync>;
type MethodFn = Arc<dyn Fn(&Instance, Vec<HostValue>) -> Result<HostValue> + Send + Sync>;
type ClassMethodFn = Arc<dyn Fn(Vec<HostValue>) -> Result<HostValue> + Send + Sync>;
type ConstructorFn = Arc<dyn Fn(Vec<HostValue>) -> Result<Instance> + Send + Sync>;
type CompareFn = Arc<dyn Fn(&Instance, &Instance) -> Result<bool> + Send + Sync>;
type IterFn = Arc<dyn Fn(&Instance) -> Result<HostIter> + Send + Sync>;

/// Number of positional arguments a member accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// At least `required`; the rest are collected into one trailing `List`.
    Variadic { required: usize },
}

impl Arity {
    fn apply(self, receiver: &str, attribute: &str, mut args: Vec<HostValue>) -> Result<Vec<HostValue>> {
        let invalid = |reason| BridgeError::InvalidCall {
            receiver: receiver.to_string(),
            attribute: attribute.to_string(),
            reason,
        };
        match self {
            Arity::Fixed(expected) if args.len() != expected => Err(invalid(InvalidCallReason::Arity {
                expected,
                actual: args.len(),
            })),
            Arity::Fixed(_) => Ok(args),
            Arity::Variadic { required } if args.len() < required => {
                Err(invalid(InvalidCallReason::TooFewArguments {
                    required,
                    actual: args.len(),
                }))
            }
            Arity::Variadic { required } => {
                let rest = args.split_off(required);
                args.push(HostValue::List(rest));
                Ok(args)
            }
        }
    }
}

/// Argument conversion failures inside a member become `InvalidCall`.
fn argument_error(receiver: &str, attribute: &str, e: BridgeError) -> BridgeError {
    match e {
        BridgeError::Conversion { .. } => BridgeError::InvalidCall {
            receiver: receiver.to_string(),
            attribute: attribute.to_string(),
            reason: InvalidCallReason::Argument(e.to_string()),
        },
        other => other,
    }
}

#[derive(Clone)]
struct Member<F> {
    arity: Arity,
    func: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::One => "one",
            RelationKind::Many => "many",
        }
    }
}

/// Declared type of a field, consumed by data filtering and `isa` paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Plain field holding an instance of the named class.
    Type(String),
    /// Field resolved by fetching rows of `other_type` where
    /// `other_type.other_field == self.my_field`.
    Relation {
        kind: RelationKind,
        other_type: String,
        my_field: String,
        other_field: String,
    },
}

impl FieldType {
    /// Class tag reached by following this field.
    pub fn target(&self) -> &str {
        match self {
            FieldType::Type(tag) => tag,
            FieldType::Relation { other_type, .. } => other_type,
        }
    }
}

#[derive(Clone)]
pub struct Class {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
    constructor: Option<Member<ConstructorFn>>,
    attributes: HashMap<String, Getter>,
    methods: HashMap<String, Member<MethodFn>>,
    class_methods: HashMap<String, Member<ClassMethodFn>>,
    equality: Option<CompareFn>,
    less_than: Option<CompareFn>,
    iterator: Option<IterFn>,
    fields: BTreeMap<String, FieldType>,
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("constructor", &self.constructor.is_some())
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("fields", &self.fields)
            .finish()
    }
}

impl Class {
    pub fn builder<T: Any + Send + Sync + fmt::Debug>() -> ClassBuilder<T> {
        ClassBuilder::new()
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn is_instance(&self, instance: &Instance) -> bool {
        instance.type_id() == self.type_id
    }

    /// Run the registered constructor. The result must be exactly this
    /// class's host type.
    pub fn construct(&self, args: Vec<HostValue>) -> Result<Instance> {
        let ctor = self.constructor.as_ref().ok_or_else(|| BridgeError::InvalidConstructor {
            constructor: self.name.clone(),
            info: "class has no registered constructor".to_string(),
        })?;
        let args = ctor.arity.apply(&self.name, "new", args)?;
        let instance =
            (ctor.func)(args).map_err(|e| argument_error(&self.name, "new", e))?;
        if !self.is_instance(&instance) {
            return Err(BridgeError::InvalidConstructor {
                constructor: self.name.clone(),
                info: format!(
                    "constructor returned {}, expected {}",
                    instance.type_name(),
                    self.type_name
                ),
            });
        }
        Ok(instance)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Field read.
    pub fn get_attr(&self, instance: &Instance, name: &str) -> Result<HostValue> {
        let getter = self.attributes.get(name).ok_or_else(|| self.missing(name))?;
        getter(instance)
    }

    /// Method call. Attributes exist but are not callable.
    pub fn call(&self, instance: &Instance, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
        let Some(method) = self.methods.get(name) else {
            if self.attributes.contains_key(name) {
                return Err(BridgeError::InvalidCall {
                    receiver: self.name.clone(),
                    attribute: name.to_string(),
                    reason: InvalidCallReason::NotCallable,
                });
            }
            return Err(self.missing(name));
        };
        let args = method.arity.apply(&self.name, name, args)?;
        (method.func)(instance, args).map_err(|e| argument_error(&self.name, name, e))
    }

    pub fn call_class_method(&self, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
        let method = self.class_methods.get(name).ok_or_else(|| self.missing(name))?;
        let args = method.arity.apply(&self.name, name, args)?;
        (method.func)(args).map_err(|e| argument_error(&self.name, name, e))
    }

    pub fn has_equality(&self) -> bool {
        self.equality.is_some()
    }

    /// `None` when the class has no equality capability.
    pub fn equals(&self, left: &Instance, right: &Instance) -> Option<Result<bool>> {
        self.equality.as_ref().map(|f| f(left, right))
    }

    /// `None` when the class has no ordering capability.
    pub fn less_than(&self, left: &Instance, right: &Instance) -> Option<Result<bool>> {
        self.less_than.as_ref().map(|f| f(left, right))
    }

    /// `None` when the class is not iterable.
    pub fn iter(&self, instance: &Instance) -> Option<Result<HostIter>> {
        self.iterator.as_ref().map(|f| f(instance))
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    fn missing(&self, attribute: &str) -> BridgeError {
        BridgeError::MissingAttribute {
            receiver: self.name.clone(),
            attribute: attribute.to_string(),
        }
    }
}

/// Typed builder; closures receive `&T`, never an untyped instance.
pub struct ClassBuilder<T> {
    class: Class,
    ty: PhantomData<fn() -> T>,
}

fn receiver<T: Any>(instance: &Instance) -> Result<&T> {
    instance.downcast::<T>()
}

impl<T> ClassBuilder<T>
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn new() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            class: Class {
                name: short_name(type_name).to_string(),
                type_id: TypeId::of::<T>(),
                type_name,
                constructor: None,
                attributes: HashMap::new(),
                methods: HashMap::new(),
                class_methods: HashMap::new(),
                equality: None,
                less_than: None,
                iterator: None,
                fields: BTreeMap::new(),
            },
            ty: PhantomData,
        }
    }

    /// Engine-visible class name. Defaults to the short Rust type name.
    pub fn name(mut self, name: &str) -> Self {
        self.class.name = name.to_string();
        self
    }

    /// Zero-argument constructor from `Default`.
    pub fn with_default(self) -> Self
    where
        T: Default,
    {
        self.set_constructor(Arity::Fixed(0), |_| Ok(T::default()))
    }

    pub fn set_constructor<F>(mut self, arity: Arity, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<T> + Send + Sync + 'static,
    {
        self.class.constructor = Some(Member {
            arity,
            func: Arc::new(move |args: Vec<HostValue>| -> Result<Instance> {
                f(args).map(Instance::new)
            }),
        });
        self
    }

    /// Constructor producing an untyped instance; its type is checked on
    /// every construction.
    pub fn set_dynamic_constructor<F>(mut self, arity: Arity, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<Instance> + Send + Sync + 'static,
    {
        self.class.constructor = Some(Member {
            arity,
            func: Arc::new(f),
        });
        self
    }

    pub fn add_attribute_getter<F, R>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: Into<HostValue>,
    {
        self.class.attributes.insert(
            name.to_string(),
            Arc::new(move |inst: &Instance| -> Result<HostValue> {
                receiver::<T>(inst).map(|t| f(t).into())
            }),
        );
        self
    }

    pub fn add_method<F, R>(mut self, name: &str, arity: Arity, f: F) -> Self
    where
        F: Fn(&T, Vec<HostValue>) -> Result<R> + Send + Sync + 'static,
        R: Into<HostValue>,
    {
        self.class.methods.insert(
            name.to_string(),
            Member {
                arity,
                func: Arc::new(move |inst: &Instance, args: Vec<HostValue>| -> Result<HostValue> {
                    f(receiver::<T>(inst)?, args).map(Into::into)
                }),
            },
        );
        self
    }

    pub fn add_class_method<F, R>(mut self, name: &str, arity: Arity, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<R> + Send + Sync + 'static,
        R: Into<HostValue>,
    {
        self.class.class_methods.insert(
            name.to_string(),
            Member {
                arity,
                func: Arc::new(move |args: Vec<HostValue>| -> Result<HostValue> {
                    f(args).map(Into::into)
                }),
            },
        );
        self
    }

    pub fn set_equality_check<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.class.equality = Some(Arc::new(move |a: &Instance, b: &Instance| -> Result<bool> {
            Ok(f(receiver::<T>(a)?, receiver::<T>(b)?))
        }));
        self
    }

    /// Equality from `PartialEq`.
    pub fn with_equality_check(self) -> Self
    where
        T: PartialEq,
    {
        self.set_equality_check(|a, b| a == b)
    }

    pub fn set_less_than<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.class.less_than = Some(Arc::new(move |a: &Instance, b: &Instance| -> Result<bool> {
            Ok(f(receiver::<T>(a)?, receiver::<T>(b)?))
        }));
        self
    }

    /// Ordering from `PartialOrd`.
    pub fn with_ordering(self) -> Self
    where
        T: PartialOrd,
    {
        self.set_less_than(|a, b| a < b)
    }

    pub fn with_iter<F, I>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> I + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<HostValue>,
        I::IntoIter: Send + 'static,
    {
        self.class.iterator = Some(Arc::new(move |inst: &Instance| -> Result<HostIter> {
            let it = f(receiver::<T>(inst)?)
                .into_iter()
                .map(|item| -> HostValue { item.into() });
            Ok(Box::new(it))
        }));
        self
    }

    pub fn add_field(mut self, name: &str, class_tag: &str) -> Self {
        self.class
            .fields
            .insert(name.to_string(), FieldType::Type(class_tag.to_string()));
        self
    }

    pub fn add_relation(
        mut self,
        name: &str,
        kind: RelationKind,
        other_type: &str,
        my_field: &str,
        other_field: &str,
    ) -> Self {
        self.class.fields.insert(
            name.to_string(),
            FieldType::Relation {
                kind,
                other_type: other_type.to_string(),
                my_field: my_field.to_string(),
                other_field: other_field.to_string(),
            },
        );
        self
    }

    pub fn build(self) -> Class {
        self.class
    }
}
