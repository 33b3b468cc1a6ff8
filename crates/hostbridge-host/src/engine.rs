//! Foreign interface to the native policy engine.
//!
//! The engine is opaque: every payload crossing this seam is a JSON string in
//! the `hostbridge_core::protocol::wire` encoding. `QueryChannel` is the typed
//! side of one query and owns its release.

use hostbridge_core::protocol::event::{EngineMessage, MessageKind, QueryEvent};
use hostbridge_core::protocol::wire;
use hostbridge_core::{Result, Term};
use tracing::{info, trace, warn};

/// Engine-wide operations.
pub trait Engine: Send + Sync {
    /// Fresh instance id, unique for the engine's lifetime.
    fn new_id(&self) -> u64;
    /// Load policy sources (`[{"src": .., "filename": ..}]`).
    fn load(&self, sources_json: &str) -> Result<()>;
    fn clear_rules(&self);
    fn new_query_from_str(&self, src: &str) -> Result<Box<dyn EngineQuery>>;
    fn new_query_from_term(&self, term_json: &str) -> Result<Box<dyn EngineQuery>>;
    /// Next inline query (`?= ...`) collected by the last `load`.
    fn next_inline_query(&self) -> Option<Box<dyn EngineQuery>>;
    fn register_constant(&self, name: &str, term_json: &str) -> Result<()>;
    fn register_mro(&self, name: &str, ids_json: &str) -> Result<()>;
    /// Returns the encoded `Filter`.
    fn build_data_filter(&self, request_json: &str) -> Result<String>;
    /// Pending `{"kind":..,"msg":..}` message, if any.
    fn next_message(&self) -> Option<String>;
}

/// One running query on the engine side.
pub trait EngineQuery: Send {
    /// Blocks until the engine produces the next event.
    fn next_event(&mut self) -> Result<String>;
    /// `None` answers the call with "no value".
    fn call_result(&mut self, call_id: u64, term_json: Option<&str>) -> Result<()>;
    fn question_result(&mut self, call_id: u64, answer: bool) -> Result<()>;
    fn application_error(&mut self, message: &str) -> Result<()>;
    fn debug_command(&mut self, term_json: &str) -> Result<()>;
    fn bind(&mut self, name: &str, term_json: &str) -> Result<()>;
    fn source(&self) -> String;
    fn next_message(&mut self) -> Option<String>;
    /// Free engine-side resources. Called exactly once by `QueryChannel`.
    fn release(&mut self);
}

/// Re-emit an engine message through `tracing`.
pub(crate) fn log_message(raw: &str) {
    match EngineMessage::from_json(raw) {
        Ok(m) => match m.kind {
            MessageKind::Print => info!(target: "hostbridge::engine", "{}", m.msg),
            MessageKind::Warning => warn!(target: "hostbridge::engine", "{}", m.msg),
        },
        Err(e) => warn!(error = %e, "dropping undecodable engine message"),
    }
}

pub(crate) fn drain_messages(engine: &dyn Engine) {
    while let Some(raw) = engine.next_message() {
        log_message(&raw);
    }
}

/// Typed, self-releasing handle on an `EngineQuery`.
pub struct QueryChannel {
    inner: Box<dyn EngineQuery>,
    released: bool,
}

impl QueryChannel {
    pub fn new(inner: Box<dyn EngineQuery>) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    pub fn next_event(&mut self) -> Result<QueryEvent> {
        let raw = self.inner.next_event();
        self.drain();
        wire::from_str(&raw?)
    }

    pub fn call_result(&mut self, call_id: u64, term: Option<&Term>) -> Result<()> {
        let json = term.map(wire::to_string).transpose()?;
        let res = self.inner.call_result(call_id, json.as_deref());
        self.drain();
        res
    }

    pub fn question_result(&mut self, call_id: u64, answer: bool) -> Result<()> {
        let res = self.inner.question_result(call_id, answer);
        self.drain();
        res
    }

    pub fn application_error(&mut self, message: &str) -> Result<()> {
        let res = self.inner.application_error(message);
        self.drain();
        res
    }

    pub fn debug_command(&mut self, command: &Term) -> Result<()> {
        let res = self.inner.debug_command(&wire::to_string(command)?);
        self.drain();
        res
    }

    pub fn bind(&mut self, name: &str, term: &Term) -> Result<()> {
        self.inner.bind(name, &wire::to_string(term)?)
    }

    pub fn source(&self) -> String {
        self.inner.source()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.drain();
            self.inner.release();
            trace!("engine query released");
        }
    }

    fn drain(&mut self) {
        while let Some(raw) = self.inner.next_message() {
            log_message(&raw);
        }
    }
}

impl Drop for QueryChannel {
    fn drop(&mut self) {
        self.release();
    }
}
