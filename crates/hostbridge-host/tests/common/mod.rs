//! Scripted in-memory engine for driving the dispatcher in tests.
//!
//! Each query replays a queue of JSON events and records everything the host
//! sends back. An exhausted script answers `Done`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hostbridge_core::{BridgeError, Result};
use hostbridge_host::{arg, Arity, Bridge, Class, Engine, EngineQuery, HostValue};
use serde_json::{json, Value as Json};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Load(Json),
    ClearRules,
    NewQuery(String),
    RegisterConstant { name: String, term: Json },
    RegisterMro { name: String, ids: Json },
    CallResult { call_id: u64, term: Option<Json> },
    QuestionResult { call_id: u64, answer: bool },
    ApplicationError(String),
    DebugCommand(Json),
    Bind { name: String, term: Json },
    Release(String),
    BuildDataFilter(Json),
}

type Log = Arc<Mutex<Vec<Outbound>>>;

#[derive(Default)]
struct Scripts {
    queries: VecDeque<Vec<Json>>,
    inline: VecDeque<(String, Vec<Json>)>,
    pending_inline: VecDeque<(String, Vec<Json>)>,
    messages: VecDeque<String>,
    filter_response: Option<Json>,
    load_error: Option<String>,
}

pub struct ScriptedEngine {
    ids: AtomicU64,
    log: Log,
    scripts: Mutex<Scripts>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            ids: AtomicU64::new(1000),
            log: Arc::default(),
            scripts: Mutex::default(),
        }
    }
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Events for the next query created with `new_query_*`.
    pub fn script(&self, events: Vec<Json>) {
        self.scripts.lock().unwrap().queries.push_back(events);
    }

    /// Inline query collected by the next `load`.
    pub fn inline(&self, source: &str, events: Vec<Json>) {
        self.scripts
            .lock()
            .unwrap()
            .inline
            .push_back((source.to_string(), events));
    }

    pub fn message(&self, kind: &str, msg: &str) {
        self.scripts
            .lock()
            .unwrap()
            .messages
            .push_back(json!({"kind": kind, "msg": msg}).to_string());
    }

    pub fn pending_messages(&self) -> usize {
        self.scripts.lock().unwrap().messages.len()
    }

    pub fn filter_response(&self, filter: Json) {
        self.scripts.lock().unwrap().filter_response = Some(filter);
    }

    pub fn fail_load(&self, msg: &str) {
        self.scripts.lock().unwrap().load_error = Some(msg.to_string());
    }

    pub fn log(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn call_results(&self) -> Vec<(u64, Option<Json>)> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::CallResult { call_id, term } => Some((call_id, term)),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<(u64, bool)> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::QuestionResult { call_id, answer } => Some((call_id, answer)),
                _ => None,
            })
            .collect()
    }

    pub fn releases(&self) -> usize {
        self.log()
            .iter()
            .filter(|o| matches!(o, Outbound::Release(_)))
            .count()
    }

    fn record(&self, o: Outbound) {
        self.log.lock().unwrap().push(o);
    }

    fn query(&self, source: String, events: Vec<Json>) -> Box<dyn EngineQuery> {
        Box::new(ScriptedQuery {
            source,
            events: events.into(),
            log: self.log.clone(),
        })
    }
}

impl Engine for ScriptedEngine {
    fn new_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::SeqCst)
    }

    fn load(&self, sources_json: &str) -> Result<()> {
        self.record(Outbound::Load(serde_json::from_str(sources_json).unwrap()));
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(msg) = scripts.load_error.take() {
            return Err(BridgeError::Engine(msg));
        }
        let inline: Vec<_> = scripts.inline.drain(..).collect();
        scripts.pending_inline.extend(inline);
        Ok(())
    }

    fn clear_rules(&self) {
        self.record(Outbound::ClearRules);
    }

    fn new_query_from_str(&self, src: &str) -> Result<Box<dyn EngineQuery>> {
        self.record(Outbound::NewQuery(src.to_string()));
        let events = self.scripts.lock().unwrap().queries.pop_front().unwrap_or_default();
        Ok(self.query(src.to_string(), events))
    }

    fn new_query_from_term(&self, term_json: &str) -> Result<Box<dyn EngineQuery>> {
        self.record(Outbound::NewQuery(term_json.to_string()));
        let events = self.scripts.lock().unwrap().queries.pop_front().unwrap_or_default();
        Ok(self.query(term_json.to_string(), events))
    }

    fn next_inline_query(&self) -> Option<Box<dyn EngineQuery>> {
        let (source, events) = self.scripts.lock().unwrap().pending_inline.pop_front()?;
        Some(self.query(source, events))
    }

    fn register_constant(&self, name: &str, term_json: &str) -> Result<()> {
        self.record(Outbound::RegisterConstant {
            name: name.to_string(),
            term: serde_json::from_str(term_json).unwrap(),
        });
        Ok(())
    }

    fn register_mro(&self, name: &str, ids_json: &str) -> Result<()> {
        self.record(Outbound::RegisterMro {
            name: name.to_string(),
            ids: serde_json::from_str(ids_json).unwrap(),
        });
        Ok(())
    }

    fn build_data_filter(&self, request_json: &str) -> Result<String> {
        self.record(Outbound::BuildDataFilter(
            serde_json::from_str(request_json).unwrap(),
        ));
        self.scripts
            .lock()
            .unwrap()
            .filter_response
            .as_ref()
            .map(Json::to_string)
            .ok_or_else(|| BridgeError::Engine("no filter scripted".into()))
    }

    fn next_message(&self) -> Option<String> {
        self.scripts.lock().unwrap().messages.pop_front()
    }
}

pub struct ScriptedQuery {
    source: String,
    events: VecDeque<Json>,
    log: Log,
}

impl ScriptedQuery {
    fn record(&self, o: Outbound) {
        self.log.lock().unwrap().push(o);
    }
}

impl EngineQuery for ScriptedQuery {
    fn next_event(&mut self) -> Result<String> {
        let event = self
            .events
            .pop_front()
            .unwrap_or_else(|| json!({"Done": {"result": true}}));
        Ok(event.to_string())
    }

    fn call_result(&mut self, call_id: u64, term_json: Option<&str>) -> Result<()> {
        self.record(Outbound::CallResult {
            call_id,
            term: term_json.map(|t| serde_json::from_str(t).unwrap()),
        });
        Ok(())
    }

    fn question_result(&mut self, call_id: u64, answer: bool) -> Result<()> {
        self.record(Outbound::QuestionResult { call_id, answer });
        Ok(())
    }

    fn application_error(&mut self, message: &str) -> Result<()> {
        self.record(Outbound::ApplicationError(message.to_string()));
        Ok(())
    }

    fn debug_command(&mut self, term_json: &str) -> Result<()> {
        self.record(Outbound::DebugCommand(serde_json::from_str(term_json).unwrap()));
        Ok(())
    }

    fn bind(&mut self, name: &str, term_json: &str) -> Result<()> {
        self.record(Outbound::Bind {
            name: name.to_string(),
            term: serde_json::from_str(term_json).unwrap(),
        });
        Ok(())
    }

    fn source(&self) -> String {
        self.source.clone()
    }

    fn next_message(&mut self) -> Option<String> {
        None
    }

    fn release(&mut self) {
        self.record(Outbound::Release(self.source.clone()));
    }
}

/// Bridge with default config over a fresh scripted engine.
pub fn bridge() -> (Arc<ScriptedEngine>, Bridge) {
    init_tracing();
    let engine = ScriptedEngine::new();
    let bridge = Bridge::with_defaults(engine.clone()).unwrap();
    engine.clear_log();
    (engine, bridge)
}

pub fn term(value: Json) -> Json {
    json!({ "value": value })
}

pub fn int(i: i64) -> Json {
    term(json!({"Number": {"Integer": i}}))
}

pub fn string(s: &str) -> Json {
    term(json!({ "String": s }))
}

pub fn boolean(b: bool) -> Json {
    term(json!({ "Boolean": b }))
}

pub fn list(items: Vec<Json>) -> Json {
    term(json!({ "List": items }))
}

pub fn instance(id: u64) -> Json {
    term(json!({"ExternalInstance": {"instance_id": id}}))
}

pub fn call(name: &str, args: Vec<Json>) -> Json {
    term(json!({"Call": {"name": name, "args": args}}))
}

pub fn make_external(instance_id: u64, constructor: Json) -> Json {
    json!({"MakeExternal": {"instance_id": instance_id, "constructor": constructor}})
}

pub fn external_call(call_id: u64, receiver: Json, attribute: &str, args: Option<Vec<Json>>) -> Json {
    let mut body = json!({"call_id": call_id, "instance": receiver, "attribute": attribute});
    if let Some(args) = args {
        body["args"] = json!(args);
    }
    json!({ "ExternalCall": body })
}

pub fn result(bindings: Json) -> Json {
    json!({"Result": {"bindings": bindings, "trace": null}})
}

pub fn done() -> Json {
    json!({"Done": {"result": true}})
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
}

impl Widget {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// `Widget(id, name)` with equality, a 2-ary `label`, a variadic `total`
/// and a `create` class method.
pub fn widget_class() -> Class {
    Class::builder::<Widget>()
        .name("Widget")
        .set_constructor(Arity::Fixed(2), |args: Vec<HostValue>| {
            Ok(Widget {
                id: arg(&args, 0)?,
                name: arg(&args, 1)?,
            })
        })
        .add_attribute_getter("id", |w: &Widget| w.id)
        .add_attribute_getter("name", |w: &Widget| w.name.clone())
        .add_method("label", Arity::Fixed(2), |w: &Widget, args: Vec<HostValue>| {
            let prefix: String = arg(&args, 0)?;
            let suffix: String = arg(&args, 1)?;
            Ok(format!("{prefix}{}{suffix}", w.name))
        })
        .add_method(
            "total",
            Arity::Variadic { required: 0 },
            |w: &Widget, args: Vec<HostValue>| {
                let rest: Vec<i64> = arg(&args, 0)?;
                Ok(w.id + rest.iter().sum::<i64>())
            },
        )
        .add_class_method("create", Arity::Fixed(1), |args: Vec<HostValue>| {
            Ok(HostValue::instance(Widget {
                id: arg(&args, 0)?,
                name: "created".to_string(),
            }))
        })
        .add_field("id", "Integer")
        .add_field("name", "String")
        .with_equality_check()
        .build()
}

/// A type with no capabilities beyond one attribute.
#[derive(Debug)]
pub struct Opaque(pub i64);

pub fn opaque_class() -> Class {
    Class::builder::<Opaque>()
        .name("Opaque")
        .add_attribute_getter("value", |o: &Opaque| o.0)
        .build()
}
