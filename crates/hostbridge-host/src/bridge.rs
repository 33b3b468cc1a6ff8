//! `Bridge`: the host-facing entry point.
//!
//! Owns the engine handle and the base registry (classes, class constants,
//! the nil constant). Every query gets a fork of that registry.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use hostbridge_core::protocol::event::Source;
use hostbridge_core::protocol::filter::Filter;
use hostbridge_core::protocol::wire;
use hostbridge_core::{BridgeError, Call, ExternalInstance, Result, Symbol, Term, Value};
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info};

use crate::builtins;
use crate::class::Class;
use crate::config::BridgeConfig;
use crate::engine::{drain_messages, Engine, EngineQuery, QueryChannel};
use crate::filter::{run_filter, types_json, DataFilterAdapter};
use crate::query::{Query, ResultRow};
use crate::registry::Registry;
use crate::translator::Translator;
use crate::value::{ClassHandle, FromHost, HostValue, Instance};

pub struct Bridge {
    engine: Arc<dyn Engine>,
    registry: Registry,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(engine: Arc<dyn Engine>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let mut bridge = Self {
            registry: Registry::new(engine.clone()),
            engine,
            config,
        };
        if bridge.config.host.builtin_classes {
            for class in builtins::classes() {
                bridge.register_class(class)?;
            }
        }
        let nil = bridge.config.host.nil_constant.clone();
        bridge.register_constant(&nil, HostValue::None)?;
        info!(
            classes = bridge.registry.classes().names().len(),
            nil_constant = %nil,
            "bridge ready"
        );
        Ok(bridge)
    }

    pub fn with_defaults(engine: Arc<dyn Engine>) -> Result<Self> {
        Self::new(engine, BridgeConfig::default())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Register `class` and expose it to policies as a constant of the same
    /// name. Re-registering the same type under the same name is a no-op.
    pub fn register_class(&mut self, class: Class) -> Result<Arc<Class>> {
        let class = self.registry.register_class(class)?;
        if self.registry.classes().class_id(&class.name).is_some() {
            return Ok(class);
        }
        let handle = Instance::new(ClassHandle {
            name: class.name.clone(),
        });
        let id = self.registry.cache_instance(handle, None)?;
        self.registry.classes().set_class_id(&class.name, id);

        let term = Term::new(Value::ExternalInstance(ExternalInstance {
            instance_id: id,
            constructor: None,
            repr: Some(class.name.clone()),
            class_repr: Some(class.name.clone()),
        }));
        self.engine
            .register_constant(&class.name, &wire::to_string(&term)?)?;
        drain_messages(self.engine.as_ref());
        debug!(class = %class.name, id, "class constant registered");
        Ok(class)
    }

    pub fn register_constant(&mut self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let term = Translator::default().to_foreign(&mut self.registry, value.into())?;
        self.engine.register_constant(name, &wire::to_string(&term)?)?;
        drain_messages(self.engine.as_ref());
        Ok(())
    }

    pub fn load_str(&mut self, src: &str) -> Result<()> {
        self.load_sources(&[Source::new(src)])
    }

    /// Load policy sources, then run every inline query they declare. An
    /// inline query without a single result fails the load.
    pub fn load_sources(&mut self, sources: &[Source]) -> Result<()> {
        for (name, id) in self.registry.classes().class_ids() {
            self.engine
                .register_mro(&name, &Json::from(vec![id]).to_string())?;
        }
        let payload = serde_json::to_string(sources)?;
        let loaded = self.engine.load(&payload);
        drain_messages(self.engine.as_ref());
        loaded?;
        info!(sources = sources.len(), "policy loaded");

        while let Some(inner) = self.engine.next_inline_query() {
            let mut query = self.new_query(inner, self.registry.copy());
            let source = query.source();
            match query.next_result() {
                Some(Ok(_)) => debug!(query = %source, "inline query passed"),
                Some(Err(e)) => return Err(e),
                None => return Err(BridgeError::InlineQueryFailed { query: source }),
            }
        }
        Ok(())
    }

    pub fn clear_rules(&self) {
        self.engine.clear_rules();
        drain_messages(self.engine.as_ref());
    }

    pub fn query_str(&self, src: &str) -> Result<Query> {
        let inner = self.engine.new_query_from_str(src);
        drain_messages(self.engine.as_ref());
        Ok(self.new_query(inner?, self.registry.copy()))
    }

    pub fn query_term(&self, term: &Term) -> Result<Query> {
        let inner = self.engine.new_query_from_term(&wire::to_string(term)?);
        drain_messages(self.engine.as_ref());
        Ok(self.new_query(inner?, self.registry.copy()))
    }

    /// Query the rule `name(args..)`. Arguments are cached in the query's own
    /// registry fork.
    pub fn query_rule(&self, name: &str, args: Vec<HostValue>) -> Result<Query> {
        let mut registry = self.registry.copy();
        let translator = self.translator();
        let args = args
            .into_iter()
            .map(|a| translator.to_foreign(&mut registry, a))
            .collect::<Result<Vec<_>>>()?;
        let term = Term::new(Value::Call(Call::new(name, args)));
        let inner = self.engine.new_query_from_term(&wire::to_string(&term)?);
        drain_messages(self.engine.as_ref());
        Ok(self.new_query(inner?, registry))
    }

    /// Whether `allow(actor, action, resource)` has at least one result.
    pub fn is_allowed(
        &self,
        actor: impl Into<HostValue>,
        action: impl Into<HostValue>,
        resource: impl Into<HostValue>,
    ) -> Result<bool> {
        let mut query =
            self.query_rule("allow", vec![actor.into(), action.into(), resource.into()])?;
        match query.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
            None => Ok(false),
        }
    }

    /// Every `action` bound by `allow(actor, action, resource)`.
    pub fn get_allowed_actions<T>(
        &self,
        actor: impl Into<HostValue>,
        resource: impl Into<HostValue>,
    ) -> Result<HashSet<T>>
    where
        T: FromHost + Eq + Hash,
    {
        let action = HostValue::Variable(Symbol::new("action"));
        let query = self.query_rule("allow", vec![actor.into(), action, resource.into()])?;
        let mut actions = HashSet::new();
        for row in query {
            if let Some(action) = row?.get("action") {
                actions.insert(T::from_host(action.clone())?);
            }
        }
        Ok(actions)
    }

    pub fn set_data_filter_adapter(&mut self, adapter: Arc<dyn DataFilterAdapter>) {
        self.registry.set_adapter(adapter);
    }

    /// Ask the engine to turn partial results for `variable` into a `Filter`
    /// over `class_tag`.
    pub fn build_filter(&self, rows: &[ResultRow], variable: &str, class_tag: &str) -> Result<Filter> {
        let mut registry = self.registry.copy();
        let translator = Translator::new(true);
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let mut bindings = Map::new();
            for (name, value) in row.iter() {
                let term = translator.to_foreign(&mut registry, value.clone())?;
                bindings.insert(name.to_string(), wire::encode(&term)?);
            }
            results.push(json!({ "bindings": bindings }));
        }
        let request = json!({
            "types": types_json(self.registry.classes()),
            "results": results,
            "variable": variable,
            "class_tag": class_tag,
        });
        let response = self.engine.build_data_filter(&request.to_string());
        drain_messages(self.engine.as_ref());
        let filter: Filter = wire::from_str(&response?)?;
        debug!(root = %filter.root, conditions = filter.conditions.len(), "filter built");
        Ok(filter)
    }

    /// Run `filter` through the configured adapter.
    pub fn filter_rows(&self, filter: &Filter) -> Result<Vec<HostValue>> {
        let adapter = self
            .registry
            .adapter()
            .ok_or_else(|| BridgeError::DataFilter("no data-filter adapter configured".into()))?;
        run_filter(adapter.as_ref(), filter)
    }

    fn translator(&self) -> Translator {
        Translator::new(self.config.query.accept_expression)
    }

    fn new_query(&self, inner: Box<dyn EngineQuery>, registry: Registry) -> Query {
        Query::new(
            QueryChannel::new(inner),
            registry,
            self.translator(),
            self.config.query.debug,
        )
    }
}
