//! Host <-> engine value translation.
//!
//! `to_foreign` never reuses a handle: every domain object it sees is cached
//! under a fresh id, even when the same object was translated before.

use std::collections::BTreeMap;

use hostbridge_core::{
    BridgeError, Dictionary, ExternalInstance, Numeric, Result, Symbol, Term, Value,
};

use crate::registry::Registry;
use crate::value::{HostValue, Instance};

#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    accept_expression: bool,
}

impl Translator {
    pub fn new(accept_expression: bool) -> Self {
        Self { accept_expression }
    }

    pub fn accept_expression(&self) -> bool {
        self.accept_expression
    }

    pub fn set_accept_expression(&mut self, accept: bool) {
        self.accept_expression = accept;
    }

    /// Host value -> engine term. Domain objects are cached in `registry`.
    pub fn to_foreign(&self, registry: &mut Registry, value: HostValue) -> Result<Term> {
        let value = match value {
            HostValue::None => self.instance_value(registry, Instance::nil())?,
            HostValue::Boolean(b) => Value::Boolean(b),
            HostValue::Integer(i) => Value::Number(Numeric::Integer(i)),
            HostValue::Float(f) => Value::Number(Numeric::Float(f)),
            HostValue::String(s) => Value::String(s),
            HostValue::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|v| self.to_foreign(registry, v))
                    .collect::<Result<_>>()?,
            ),
            HostValue::Dictionary(fields) => Value::Dictionary(Dictionary {
                fields: fields
                    .into_iter()
                    .map(|(k, v)| Ok((Symbol(k), self.to_foreign(registry, v)?)))
                    .collect::<Result<_>>()?,
            }),
            HostValue::Instance(instance) => self.instance_value(registry, instance)?,
            HostValue::Variable(name) => Value::Variable(name),
            HostValue::Expression(op) => Value::Expression(op),
            HostValue::Term(term) => return Ok(term),
        };
        Ok(Term::new(value))
    }

    fn instance_value(&self, registry: &mut Registry, instance: Instance) -> Result<Value> {
        let class_repr = registry
            .class_for(&instance)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| instance.short_type_name().to_string());
        let repr = instance.repr().to_string();
        let instance_id = registry.cache_instance(instance, None)?;
        Ok(Value::ExternalInstance(ExternalInstance {
            instance_id,
            constructor: None,
            repr: Some(repr),
            class_repr: Some(class_repr),
        }))
    }

    /// Engine term -> host value. Handles resolve through `registry`.
    pub fn to_host(&self, registry: &Registry, term: &Term) -> Result<HostValue> {
        Ok(match term.value() {
            Value::Boolean(b) => HostValue::Boolean(*b),
            Value::Number(Numeric::Integer(i)) => HostValue::Integer(*i),
            Value::Number(Numeric::Float(f)) => HostValue::Float(*f),
            Value::String(s) => HostValue::String(s.clone()),
            Value::List(items) => HostValue::List(
                items
                    .iter()
                    .map(|t| self.to_host(registry, t))
                    .collect::<Result<_>>()?,
            ),
            Value::Dictionary(dict) => HostValue::Dictionary(
                dict.fields
                    .iter()
                    .map(|(k, v)| Ok((k.0.clone(), self.to_host(registry, v)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
            Value::ExternalInstance(ExternalInstance { instance_id, .. }) => {
                let instance = registry.get_instance(*instance_id)?;
                if instance.is_nil() {
                    HostValue::None
                } else {
                    HostValue::Instance(instance.clone())
                }
            }
            Value::Variable(name) => HostValue::Variable(name.clone()),
            Value::Expression(op) => {
                if !self.accept_expression {
                    return Err(BridgeError::UnexpectedExpression);
                }
                HostValue::Expression(op.clone())
            }
            Value::Partial(_) => {
                if !self.accept_expression {
                    return Err(BridgeError::UnexpectedExpression);
                }
                HostValue::Term(term.clone())
            }
            Value::Call(_)
            | Value::InstanceLiteral(_)
            | Value::Pattern(_)
            | Value::RestVariable(_) => HostValue::Term(term.clone()),
        })
    }
}
