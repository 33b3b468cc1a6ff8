//! External operation resolver.
//!
//! Answers the engine's questions about host values: attribute lookup, method
//! and class-method calls, construction, `isa`, subclassing, unification,
//! comparison operators and iteration. Everything goes through the capability
//! tables recorded on each `Class`.

use std::sync::Arc;

use hostbridge_core::{BridgeError, Operator, Result};
use tracing::trace;

use crate::class::{Class, FieldType, HostIter};
use crate::filter::fetch_relation;
use crate::registry::Registry;
use crate::value::{ClassHandle, HostValue, Instance};

pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Instantiate the class named `class_tag`.
    pub fn construct(&self, class_tag: &str, args: Vec<HostValue>) -> Result<Instance> {
        let class = self.registry.get_class(class_tag)?;
        class.construct(args)
    }

    /// `args: None` reads a field; `Some` (even empty) calls a method.
    pub fn lookup(
        &self,
        receiver: &HostValue,
        attribute: &str,
        args: Option<Vec<HostValue>>,
    ) -> Result<HostValue> {
        trace!(receiver = %receiver.repr(), attribute, call = args.is_some(), "lookup");

        if let (HostValue::Dictionary(fields), None) = (receiver, &args) {
            return fields
                .get(attribute)
                .cloned()
                .ok_or_else(|| BridgeError::MissingAttribute {
                    receiver: "Dictionary".to_string(),
                    attribute: attribute.to_string(),
                });
        }

        let instance = receiver
            .to_instance()
            .ok_or_else(|| BridgeError::MissingAttribute {
                receiver: receiver.type_label().to_string(),
                attribute: attribute.to_string(),
            })?;

        if let Some(handle) = instance.downcast_ref::<ClassHandle>() {
            let class = self.registry.get_class(&handle.name)?;
            return match args {
                Some(args) => class.call_class_method(attribute, args),
                None => Err(BridgeError::MissingAttribute {
                    receiver: class.name.clone(),
                    attribute: attribute.to_string(),
                }),
            };
        }

        let class = self.class_of(&instance, attribute)?;
        match args {
            Some(args) => class.call(&instance, attribute, args),
            None if class.has_attribute(attribute) => class.get_attr(&instance, attribute),
            None => match class.field(attribute) {
                Some(field @ FieldType::Relation { .. }) => fetch_relation(
                    self.registry.adapter().map(|a| a.as_ref()),
                    &class,
                    &instance,
                    attribute,
                    field,
                ),
                _ => class.get_attr(&instance, attribute),
            },
        }
    }

    fn class_of(&self, instance: &Instance, attribute: &str) -> Result<Arc<Class>> {
        self.registry
            .class_for(instance)
            .ok_or_else(|| BridgeError::MissingAttribute {
                receiver: instance.short_type_name().to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Exact host-type identity against the class registered as `class_tag`.
    pub fn isa(&self, value: &HostValue, class_tag: &str) -> Result<bool> {
        let class = self.registry.get_class(class_tag)?;
        Ok(value.host_type_id() == Some(class.type_id))
    }

    /// Follow field descriptors from `base_tag` along `path`, then compare the
    /// reached class with `class_tag`.
    pub fn isa_with_path(&self, base_tag: &str, path: &[HostValue], class_tag: &str) -> Result<bool> {
        let mut current = base_tag.to_string();
        for step in path {
            let HostValue::String(attribute) = step else {
                return Err(BridgeError::InvalidQueryEvent(format!(
                    "isa path element must be a string, found {}",
                    step.repr()
                )));
            };
            let class = self.registry.get_class(&current)?;
            let field = class.field(attribute).ok_or_else(|| BridgeError::MissingAttribute {
                receiver: class.name.clone(),
                attribute: attribute.clone(),
            })?;
            current = field.target().to_string();
        }
        self.is_subclass(&current, class_tag)
    }

    /// No inheritance between host types: subclass is type identity.
    pub fn is_subclass(&self, left_tag: &str, right_tag: &str) -> Result<bool> {
        let left = self.registry.get_class(left_tag)?;
        let right = self.registry.get_class(right_tag)?;
        Ok(left.type_id == right.type_id)
    }

    /// Specializer ordering is undecidable without inheritance; always false.
    pub fn is_subspecializer(&self, _instance_id: u64, _left_tag: &str, _right_tag: &str) -> bool {
        false
    }

    /// Equality capability when the class has one, otherwise identity or an
    /// identical repr of the same type.
    pub fn unify(&self, left: &Instance, right: &Instance) -> Result<bool> {
        if left.type_id() != right.type_id() {
            return Ok(false);
        }
        if let Some(eq) = self.registry.class_for(left).and_then(|c| c.equals(left, right)) {
            return eq;
        }
        Ok(left.ptr_eq(right) || left.repr() == right.repr())
    }

    pub fn operator(&self, op: Operator, left: &HostValue, right: &HostValue) -> Result<bool> {
        match op {
            Operator::Lt => self.lt(left, right),
            Operator::Leq => Ok(self.lt(left, right)? || self.eq(left, right)?),
            Operator::Gt => Ok(!self.lt(left, right)? && !self.eq(left, right)?),
            Operator::Geq => Ok(!self.lt(left, right)?),
            Operator::Eq => self.eq(left, right),
            Operator::Neq => Ok(!self.eq(left, right)?),
            other => Err(BridgeError::UnsupportedOperator(other.to_string())),
        }
    }

    fn eq(&self, left: &HostValue, right: &HostValue) -> Result<bool> {
        use HostValue as H;
        Ok(match (left, right) {
            (H::None, H::None) => true,
            (H::Boolean(a), H::Boolean(b)) => a == b,
            (H::Integer(a), H::Integer(b)) => a == b,
            (H::Float(a), H::Float(b)) => a == b,
            (H::Integer(a), H::Float(b)) | (H::Float(b), H::Integer(a)) => (*a as f64) == *b,
            (H::String(a), H::String(b)) => a == b,
            (H::Variable(a), H::Variable(b)) => a == b,
            (H::List(a), H::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !self.eq(x, y)? {
                        return Ok(false);
                    }
                }
                true
            }
            (H::Dictionary(a), H::Dictionary(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, x) in a {
                    match b.get(k) {
                        Some(y) if self.eq(x, y)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            (H::Instance(a), other) => {
                let Some(class) = self.registry.class_for(a).filter(|c| c.has_equality()) else {
                    return Err(unsupported(left, "Eq"));
                };
                match other {
                    H::Instance(b) if b.type_id() == a.type_id() => {
                        class.equals(a, b).unwrap_or(Ok(false))?
                    }
                    _ => false,
                }
            }
            (_, H::Instance(_)) => self.eq(right, left)?,
            _ => false,
        })
    }

    fn lt(&self, left: &HostValue, right: &HostValue) -> Result<bool> {
        use HostValue as H;
        match (left, right) {
            (H::Integer(a), H::Integer(b)) => Ok(a < b),
            (H::Float(a), H::Float(b)) => Ok(a < b),
            (H::Integer(a), H::Float(b)) => Ok((*a as f64) < *b),
            (H::Float(a), H::Integer(b)) => Ok(*a < (*b as f64)),
            (H::String(a), H::String(b)) => Ok(a < b),
            (H::Instance(a), H::Instance(b)) if a.type_id() == b.type_id() => self
                .registry
                .class_for(a)
                .and_then(|c| c.less_than(a, b))
                .unwrap_or_else(|| Err(unsupported(left, "Lt"))),
            _ => Err(unsupported(left, "Lt")),
        }
    }

    /// Iterator over `value`. Lists iterate natively; instances need an
    /// iteration capability.
    pub fn iterate(&self, value: HostValue) -> Result<HostIter> {
        match value {
            HostValue::List(items) => Ok(Box::new(items.into_iter())),
            HostValue::Instance(instance) => self
                .registry
                .class_for(&instance)
                .and_then(|c| c.iter(&instance))
                .unwrap_or_else(|| {
                    Err(BridgeError::InvalidIterator {
                        instance: instance.repr().to_string(),
                    })
                }),
            other => Err(BridgeError::InvalidIterator {
                instance: other.repr(),
            }),
        }
    }
}

fn unsupported(value: &HostValue, operation: &str) -> BridgeError {
    BridgeError::UnsupportedOperation {
        instance: value.repr(),
        operation: operation.to_string(),
    }
}
