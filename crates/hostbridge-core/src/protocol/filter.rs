//! Data-filter plans.
//!
//! The engine turns a partially evaluated query into a `Filter`: a root type,
//! the joins needed to reach related types, and conditions in disjunctive
//! normal form. The bridge decodes it and hands it to an external adapter; it
//! performs no query planning itself.
//!
//! Relations, conditions and projections are JSON arrays on the wire
//! (`["Repo", "org", "Org"]`), so each converts through a tuple.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Comparison between two data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Eq,
    Neq,
    In,
    Nin,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq => "Eq",
            Comparison::Neq => "Neq",
            Comparison::In => "In",
            Comparison::Nin => "Nin",
            Comparison::Lt => "Lt",
            Comparison::Leq => "Leq",
            Comparison::Gt => "Gt",
            Comparison::Geq => "Geq",
        }
    }
}

/// `type_name.field_name`, or the whole row when `field_name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProjectionRepr", into = "ProjectionRepr")]
pub struct Projection {
    pub type_name: String,
    pub field_name: Option<String>,
}

/// `[type]` or `[type, field | null]`.
#[derive(Serialize, Deserialize)]
struct ProjectionRepr(String, #[serde(default)] Option<String>);

impl From<ProjectionRepr> for Projection {
    fn from(ProjectionRepr(type_name, field_name): ProjectionRepr) -> Self {
        Self {
            type_name,
            field_name,
        }
    }
}

impl From<Projection> for ProjectionRepr {
    fn from(p: Projection) -> Self {
        ProjectionRepr(p.type_name, p.field_name)
    }
}

/// One side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Field(Projection),
    // the engine core spells it `Imm`
    #[serde(alias = "Imm")]
    Immediate(Value),
}

/// `[left, cmp, right]` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(Datum, Comparison, Datum)",
    into = "(Datum, Comparison, Datum)"
)]
pub struct Condition {
    pub left: Datum,
    pub cmp: Comparison,
    pub right: Datum,
}

/// Join from `from_type.from_field` to `to_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(String, String, String)",
    into = "(String, String, String)"
)]
pub struct FilterRelation {
    pub from_type: String,
    pub from_field: String,
    pub to_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub root: String,
    pub relations: Vec<FilterRelation>,
    /// Disjunction of conjunctions.
    pub conditions: Vec<Vec<Condition>>,
}

impl From<(Datum, Comparison, Datum)> for Condition {
    fn from((left, cmp, right): (Datum, Comparison, Datum)) -> Self {
        Self { left, cmp, right }
    }
}

impl From<Condition> for (Datum, Comparison, Datum) {
    fn from(c: Condition) -> Self {
        (c.left, c.cmp, c.right)
    }
}

impl From<(String, String, String)> for FilterRelation {
    fn from((from_type, from_field, to_type): (String, String, String)) -> Self {
        Self {
            from_type,
            from_field,
            to_type,
        }
    }
}

impl From<FilterRelation> for (String, String, String) {
    fn from(r: FilterRelation) -> Self {
        (r.from_type, r.from_field, r.to_type)
    }
}
