//! Query event dispatcher.
//!
//! One `Query` per engine query. It pulls events one at a time, resolves each
//! against its own forked `Registry`, and answers the engine before pulling
//! again. A `Result` event suspends the loop until the caller asks for the
//! next row.
//!
//! Any error aborts the query: the engine side is released and the iterator
//! yields the error once, then `None`.

use std::collections::{BTreeMap, HashMap};

use hostbridge_core::protocol::event::QueryEvent;
use hostbridge_core::{BridgeError, Result, Symbol, Term, Value};
use tracing::{debug, debug_span, info, warn, Span};

use crate::class::HostIter;
use crate::config::DebugMode;
use crate::engine::QueryChannel;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::translator::Translator;
use crate::value::{FromHost, HostValue};

/// One solution: variable name -> host value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    bindings: BTreeMap<String, HostValue>,
}

impl ResultRow {
    pub fn new(bindings: BTreeMap<String, HostValue>) -> Self {
        Self { bindings }
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.bindings.get(name)
    }

    pub fn get_typed<T: FromHost>(&self, name: &str) -> Result<T> {
        let value = self.get(name).cloned().ok_or_else(|| BridgeError::Conversion {
            expected: format!("binding for `{name}`"),
            found: "unbound variable".to_string(),
        })?;
        T::from_host(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn into_bindings(self) -> BTreeMap<String, HostValue> {
        self.bindings
    }
}

enum Step {
    Continue,
    Row(ResultRow),
    Done,
}

pub struct Query {
    channel: QueryChannel,
    registry: Registry,
    translator: Translator,
    /// call_id -> host iterator for `NextExternal`.
    iterators: HashMap<u64, HostIter>,
    debug: DebugMode,
    done: bool,
    span: Span,
}

impl Query {
    pub fn new(
        channel: QueryChannel,
        registry: Registry,
        translator: Translator,
        debug: DebugMode,
    ) -> Self {
        let span = debug_span!("query", source = %channel.source());
        Self {
            channel,
            registry,
            translator,
            iterators: HashMap::new(),
            debug,
            done: false,
            span,
        }
    }

    pub fn source(&self) -> String {
        self.channel.source()
    }

    /// Bind `name` to a host value before the first result is pulled.
    pub fn bind(&mut self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let term = self.translator.to_foreign(&mut self.registry, value.into())?;
        self.channel.bind(name, &term)
    }

    pub fn set_accept_expression(&mut self, accept: bool) {
        self.translator.set_accept_expression(accept);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Drain every remaining row; stops at the first error.
    pub fn all_results(self) -> Result<Vec<ResultRow>> {
        self.collect()
    }

    pub fn next_result(&mut self) -> Option<Result<ResultRow>> {
        if self.done {
            return None;
        }
        let span = self.span.clone();
        let _enter = span.enter();
        loop {
            let step = self
                .channel
                .next_event()
                .and_then(|event| self.handle(event));
            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Row(row)) => return Some(Ok(row)),
                Ok(Step::Done) => {
                    self.finish();
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind().as_str(), "query aborted");
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.iterators.clear();
        self.channel.release();
    }

    fn handle(&mut self, event: QueryEvent) -> Result<Step> {
        debug!(event = event.kind(), call_id = ?event.call_id(), "dispatch");
        match event {
            QueryEvent::None => {}
            QueryEvent::Done { result } => {
                debug!(result, "query done");
                return Ok(Step::Done);
            }
            QueryEvent::Result { bindings, .. } => {
                return self.result_row(bindings).map(Step::Row);
            }
            QueryEvent::Debug { message } => self.handle_debug(message)?,
            QueryEvent::MakeExternal {
                instance_id,
                constructor,
            } => self.handle_make_external(instance_id, constructor)?,
            QueryEvent::ExternalCall {
                call_id,
                instance,
                attribute,
                args,
                kwargs,
            } => self.handle_external_call(call_id, instance, attribute, args, kwargs)?,
            QueryEvent::ExternalIsa {
                call_id,
                instance,
                class_tag,
            } => {
                let value = self.to_host(&instance)?;
                let answer = Resolver::new(&self.registry).isa(&value, class_tag.as_str())?;
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::ExternalIsaWithPath {
                call_id,
                base_tag,
                path,
                class_tag,
            } => {
                let path = self.to_host_all(&path)?;
                let answer = Resolver::new(&self.registry).isa_with_path(
                    base_tag.as_str(),
                    &path,
                    class_tag.as_str(),
                )?;
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::ExternalIsSubSpecializer {
                call_id,
                instance_id,
                left_class_tag,
                right_class_tag,
            } => {
                let answer = Resolver::new(&self.registry).is_subspecializer(
                    instance_id,
                    left_class_tag.as_str(),
                    right_class_tag.as_str(),
                );
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::ExternalIsSubclass {
                call_id,
                left_class_tag,
                right_class_tag,
            } => {
                let answer = Resolver::new(&self.registry)
                    .is_subclass(left_class_tag.as_str(), right_class_tag.as_str())?;
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::ExternalUnify {
                call_id,
                left_instance_id,
                right_instance_id,
            } => {
                let left = self.registry.get_instance(left_instance_id)?;
                let right = self.registry.get_instance(right_instance_id)?;
                let answer = Resolver::new(&self.registry).unify(left, right)?;
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::ExternalOp {
                call_id,
                operator,
                args,
            } => {
                let [left, right] = args.as_slice() else {
                    return Err(BridgeError::InvalidQueryEvent(format!(
                        "{operator} expects 2 operands, got {}",
                        args.len()
                    )));
                };
                let left = self.to_host(left)?;
                let right = self.to_host(right)?;
                let answer = Resolver::new(&self.registry).operator(operator, &left, &right)?;
                self.channel.question_result(call_id, answer)?;
            }
            QueryEvent::NextExternal { call_id, iterable } => {
                self.handle_next_external(call_id, iterable)?
            }
        }
        Ok(Step::Continue)
    }

    fn to_host(&self, term: &Term) -> Result<HostValue> {
        self.translator.to_host(&self.registry, term)
    }

    fn to_host_all(&self, terms: &[Term]) -> Result<Vec<HostValue>> {
        terms.iter().map(|t| self.to_host(t)).collect()
    }

    fn result_row(&self, bindings: BTreeMap<Symbol, Term>) -> Result<ResultRow> {
        let bindings = bindings
            .into_iter()
            .map(|(k, v)| Ok((k.0, self.to_host(&v)?)))
            .collect::<Result<_>>()?;
        Ok(ResultRow { bindings })
    }

    fn handle_debug(&mut self, message: String) -> Result<()> {
        match self.debug {
            DebugMode::Continue => {
                info!(target: "hostbridge::debug", "{message}");
                self.channel.debug_command(&Term::from("continue"))
            }
            DebugMode::Fail => Err(BridgeError::Application(format!(
                "query stopped in debugger: {message}"
            ))),
        }
    }

    fn handle_make_external(&mut self, instance_id: u64, constructor: Term) -> Result<()> {
        let Value::Call(call) = constructor.value() else {
            return Err(BridgeError::InvalidConstructor {
                constructor: format!("{:?}", constructor.value().tag()),
                info: "constructor must be a call".to_string(),
            });
        };
        reject_kwargs(call.kwargs.as_ref())?;
        if self.registry.has_instance(instance_id) {
            return Err(BridgeError::DuplicateInstanceRegistration { id: instance_id });
        }
        let args = self.to_host_all(&call.args)?;
        let instance = Resolver::new(&self.registry).construct(call.name.as_str(), args)?;
        self.registry.cache_instance(instance, Some(instance_id))?;
        Ok(())
    }

    fn handle_external_call(
        &mut self,
        call_id: u64,
        instance: Term,
        attribute: Symbol,
        args: Option<Vec<Term>>,
        kwargs: Option<BTreeMap<Symbol, Term>>,
    ) -> Result<()> {
        reject_kwargs(kwargs.as_ref())?;
        let receiver = self.to_host(&instance)?;
        let args = args.map(|a| self.to_host_all(&a)).transpose()?;
        let looked_up = Resolver::new(&self.registry).lookup(&receiver, attribute.as_str(), args);
        let result =
            looked_up.and_then(|value| self.translator.to_foreign(&mut self.registry, value));
        let err = match result {
            Ok(term) => return self.channel.call_result(call_id, Some(&term)),
            Err(e) => e,
        };
        // The engine is waiting on this call id whichever way the query goes.
        self.channel.call_result(call_id, None)?;
        if !err.is_reportable_lookup() {
            return Err(err);
        }
        warn!(error = %err, call_id, "application error");
        self.channel.application_error(&err.to_string())
    }

    fn handle_next_external(&mut self, call_id: u64, iterable: Term) -> Result<()> {
        if !self.iterators.contains_key(&call_id) {
            let value = self.to_host(&iterable)?;
            let iter = Resolver::new(&self.registry).iterate(value)?;
            self.iterators.insert(call_id, iter);
        }
        let next = self.iterators.get_mut(&call_id).and_then(|it| it.next());
        match next {
            Some(value) => {
                let term = self.translator.to_foreign(&mut self.registry, value)?;
                self.channel.call_result(call_id, Some(&term))
            }
            None => {
                self.iterators.remove(&call_id);
                self.channel.call_result(call_id, None)
            }
        }
    }
}

/// Keyword arguments are not a host capability; an empty map is no kwargs.
fn reject_kwargs(kwargs: Option<&BTreeMap<Symbol, Term>>) -> Result<()> {
    match kwargs {
        Some(k) if !k.is_empty() => Err(BridgeError::Kwargs),
        _ => Ok(()),
    }
}

impl Iterator for Query {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_result()
    }
}
