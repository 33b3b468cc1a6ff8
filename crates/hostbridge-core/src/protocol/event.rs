//! Query events, engine messages and policy sources.
//!
//! All three are plain serde types; decode them through [`super::wire`] so
//! failures come back as `BridgeError`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::wire;
use crate::error::Result;
use crate::value::{Operator, Symbol, Term};

/// One step of a running query, as emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryEvent {
    None,
    /// No more results. `result` is whether the query ever succeeded.
    Done {
        #[serde(default)]
        result: bool,
    },
    Debug {
        message: String,
    },
    MakeExternal {
        instance_id: u64,
        constructor: Term,
    },
    /// `args: None` is a field read, `Some` (even empty) a method call.
    ExternalCall {
        call_id: u64,
        instance: Term,
        attribute: Symbol,
        args: Option<Vec<Term>>,
        kwargs: Option<BTreeMap<Symbol, Term>>,
    },
    ExternalIsa {
        call_id: u64,
        instance: Term,
        class_tag: Symbol,
    },
    ExternalIsaWithPath {
        call_id: u64,
        base_tag: Symbol,
        path: Vec<Term>,
        class_tag: Symbol,
    },
    ExternalIsSubSpecializer {
        call_id: u64,
        instance_id: u64,
        left_class_tag: Symbol,
        right_class_tag: Symbol,
    },
    ExternalIsSubclass {
        call_id: u64,
        left_class_tag: Symbol,
        right_class_tag: Symbol,
    },
    ExternalUnify {
        call_id: u64,
        left_instance_id: u64,
        right_instance_id: u64,
    },
    /// One solution. `trace` is kept raw; the bridge never interprets it.
    Result {
        bindings: BTreeMap<Symbol, Term>,
        #[serde(default)]
        trace: Option<Box<RawValue>>,
    },
    ExternalOp {
        call_id: u64,
        operator: Operator,
        args: Vec<Term>,
    },
    NextExternal {
        call_id: u64,
        iterable: Term,
    },
}

impl QueryEvent {
    /// Wire tag, used as the log label.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryEvent::None => "None",
            QueryEvent::Done { .. } => "Done",
            QueryEvent::Debug { .. } => "Debug",
            QueryEvent::MakeExternal { .. } => "MakeExternal",
            QueryEvent::ExternalCall { .. } => "ExternalCall",
            QueryEvent::ExternalIsa { .. } => "ExternalIsa",
            QueryEvent::ExternalIsaWithPath { .. } => "ExternalIsaWithPath",
            QueryEvent::ExternalIsSubSpecializer { .. } => "ExternalIsSubSpecializer",
            QueryEvent::ExternalIsSubclass { .. } => "ExternalIsSubclass",
            QueryEvent::ExternalUnify { .. } => "ExternalUnify",
            QueryEvent::Result { .. } => "Result",
            QueryEvent::ExternalOp { .. } => "ExternalOp",
            QueryEvent::NextExternal { .. } => "NextExternal",
        }
    }

    /// Id that must be echoed on the response, if the event expects one.
    pub fn call_id(&self) -> Option<u64> {
        match self {
            QueryEvent::ExternalCall { call_id, .. }
            | QueryEvent::ExternalIsa { call_id, .. }
            | QueryEvent::ExternalIsaWithPath { call_id, .. }
            | QueryEvent::ExternalIsSubSpecializer { call_id, .. }
            | QueryEvent::ExternalIsSubclass { call_id, .. }
            | QueryEvent::ExternalUnify { call_id, .. }
            | QueryEvent::ExternalOp { call_id, .. }
            | QueryEvent::NextExternal { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }
}

/// Severity of an engine-side message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Print,
    Warning,
}

/// Out-of-band output produced by the engine (`print`, lint warnings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineMessage {
    pub kind: MessageKind,
    pub msg: String,
}

impl EngineMessage {
    pub fn from_json(s: &str) -> Result<Self> {
        wire::from_str(s)
    }
}

/// A policy source handed to `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub src: String,
    #[serde(default)]
    pub filename: Option<String>,
}

impl Source {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            filename: None,
        }
    }

    pub fn with_filename(src: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            filename: Some(filename.into()),
        }
    }
}

