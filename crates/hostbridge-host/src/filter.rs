//! Data-filtering collaborator seam.
//!
//! The adapter turns a `Filter` into a backing store's native query and runs
//! it. The bridge only builds filters (relation fields, `Bridge::build_filter`)
//! and forwards them.

use std::any::Any;

use hostbridge_core::protocol::filter::{Comparison, Condition, Datum, Filter, Projection};
use hostbridge_core::{BridgeError, Numeric, Result, Term, Value};
use serde_json::{json, Map, Value as Json};
use tracing::debug;

use crate::class::{Class, FieldType, RelationKind};
use crate::registry::ClassRegistry;
use crate::value::{HostValue, Instance};

/// External adapter from `Filter` to rows of host values.
pub trait DataFilterAdapter: Send + Sync {
    fn build_query(&self, filter: &Filter) -> Result<Box<dyn Any + Send>>;
    fn execute_query(&self, query: Box<dyn Any + Send>) -> Result<Vec<HostValue>>;
}

/// Run `filter` through `adapter`.
pub fn run_filter(adapter: &dyn DataFilterAdapter, filter: &Filter) -> Result<Vec<HostValue>> {
    let query = adapter.build_query(filter)?;
    adapter.execute_query(query)
}

/// Immediate operand for a condition. Only plain data can be compared by a
/// backing store.
pub fn immediate(value: &HostValue) -> Result<Value> {
    Ok(match value {
        HostValue::Boolean(b) => Value::Boolean(*b),
        HostValue::Integer(i) => Value::Number(Numeric::Integer(*i)),
        HostValue::Float(f) => Value::Number(Numeric::Float(*f)),
        HostValue::String(s) => Value::String(s.clone()),
        HostValue::List(items) => Value::List(
            items
                .iter()
                .map(|v| immediate(v).map(Term::new))
                .collect::<Result<_>>()?,
        ),
        other => {
            return Err(BridgeError::DataFilter(format!(
                "cannot use {} as a filter operand",
                other.repr()
            )))
        }
    })
}

/// Filter selecting `other_type` rows whose `other_field` equals
/// `receiver.my_field`.
pub fn relation_filter(
    class: &Class,
    receiver: &Instance,
    other_type: &str,
    my_field: &str,
    other_field: &str,
) -> Result<Filter> {
    let key = class.get_attr(receiver, my_field)?;
    Ok(Filter {
        root: other_type.to_string(),
        relations: Vec::new(),
        conditions: vec![vec![Condition {
            left: Datum::Field(Projection {
                type_name: other_type.to_string(),
                field_name: Some(other_field.to_string()),
            }),
            cmp: Comparison::Eq,
            right: Datum::Immediate(immediate(&key)?),
        }]],
    })
}

/// Resolve a relation field on `receiver`.
pub fn fetch_relation(
    adapter: Option<&dyn DataFilterAdapter>,
    class: &Class,
    receiver: &Instance,
    attribute: &str,
    field: &FieldType,
) -> Result<HostValue> {
    let FieldType::Relation {
        kind,
        other_type,
        my_field,
        other_field,
    } = field
    else {
        return Err(BridgeError::DataFilter(format!(
            "{}.{attribute} is not a relation",
            class.name
        )));
    };
    let adapter = adapter.ok_or_else(|| {
        BridgeError::DataFilter("no data-filter adapter configured".to_string())
    })?;
    let filter = relation_filter(class, receiver, other_type, my_field, other_field)?;
    debug!(class = %class.name, attribute, other_type = %other_type, "fetching relation");
    let mut rows = run_filter(adapter, &filter)?;
    match kind {
        RelationKind::Many => Ok(HostValue::List(rows)),
        RelationKind::One => match rows.len() {
            1 => Ok(rows.remove(0)),
            n => Err(BridgeError::DataFilter(format!(
                "{}.{attribute}: expected exactly one {other_type}, found {n}",
                class.name
            ))),
        },
    }
}

/// Field descriptors of every registered class, in the engine's type map
/// format: `{class: {field: {"Base": ..} | {"Relation": ..}}}`.
pub fn types_json(classes: &ClassRegistry) -> Json {
    let mut types = Map::new();
    for class in classes.classes() {
        let fields: Map<String, Json> = class
            .fields()
            .iter()
            .map(|(name, field)| {
                let desc = match field {
                    FieldType::Type(tag) => json!({"Base": {"class_tag": tag}}),
                    FieldType::Relation {
                        kind,
                        other_type,
                        my_field,
                        other_field,
                    } => json!({"Relation": {
                        "kind": kind.as_str(),
                        "other_class_tag": other_type,
                        "my_field": my_field,
                        "other_field": other_field,
                    }}),
                };
                (name.clone(), desc)
            })
            .collect();
        types.insert(class.name.clone(), Json::Object(fields));
    }
    Json::Object(types)
}
