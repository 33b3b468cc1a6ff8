//! Type & instance registry.
//!
//! - `ClassRegistry`: name -> class, shared by every fork and append-only.
//! - `Registry`: the classes plus one query's private instance table.
//!
//! A fork (`copy`) shares the classes and clones the instance map, so handles
//! cached by one query are never visible to another.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hostbridge_core::{BridgeError, Result};
use tracing::trace;

use crate::class::Class;
use crate::engine::Engine;
use crate::filter::DataFilterAdapter;
use crate::value::Instance;

#[derive(Clone, Default)]
pub struct ClassRegistry {
    by_name: Arc<DashMap<String, Arc<Class>>>,
    by_type: Arc<DashMap<TypeId, Arc<Class>>>,
    /// Instance id of each class's handle constant.
    class_ids: Arc<DashMap<String, u64>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same name with the same type is a no-op returning the existing class.
    pub fn register(&self, class: Class) -> Result<Arc<Class>> {
        match self.by_name.entry(class.name.clone()) {
            Entry::Occupied(e) => {
                let existing = e.get();
                if existing.type_id == class.type_id {
                    Ok(existing.clone())
                } else {
                    Err(BridgeError::DuplicateClassAlias {
                        name: class.name.clone(),
                        existing: existing.type_name.to_string(),
                        new: class.type_name.to_string(),
                    })
                }
            }
            Entry::Vacant(v) => {
                let class = Arc::new(class);
                self.by_type
                    .entry(class.type_id)
                    .or_insert_with(|| class.clone());
                trace!(class = %class.name, "class registered");
                v.insert(class.clone());
                Ok(class)
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Class>> {
        self.find(name).ok_or_else(|| BridgeError::UnregisteredClass {
            name: name.to_string(),
        })
    }

    pub fn find(&self, name: &str) -> Option<Arc<Class>> {
        self.by_name.get(name).map(|c| c.value().clone())
    }

    /// First class registered for this host type.
    pub fn by_type(&self, type_id: TypeId) -> Option<Arc<Class>> {
        self.by_type.get(&type_id).map(|c| c.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn classes(&self) -> Vec<Arc<Class>> {
        let mut classes: Vec<Arc<Class>> = self.by_name.iter().map(|e| e.value().clone()).collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes
    }

    pub(crate) fn set_class_id(&self, name: &str, id: u64) {
        self.class_ids.insert(name.to_string(), id);
    }

    pub fn class_id(&self, name: &str) -> Option<u64> {
        self.class_ids.get(name).map(|e| *e.value())
    }

    /// `(name, handle id)` pairs, sorted by name.
    pub fn class_ids(&self) -> Vec<(String, u64)> {
        let mut ids: Vec<(String, u64)> = self
            .class_ids
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        ids.sort();
        ids
    }
}

#[derive(Clone)]
pub struct Registry {
    classes: ClassRegistry,
    instances: HashMap<u64, Instance>,
    engine: Arc<dyn Engine>,
    adapter: Option<Arc<dyn DataFilterAdapter>>,
}

impl Registry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            classes: ClassRegistry::new(),
            instances: HashMap::new(),
            engine,
            adapter: None,
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn register_class(&self, class: Class) -> Result<Arc<Class>> {
        self.classes.register(class)
    }

    pub fn get_class(&self, name: &str) -> Result<Arc<Class>> {
        self.classes.get(name)
    }

    pub fn class_for(&self, instance: &Instance) -> Option<Arc<Class>> {
        self.classes.by_type(instance.type_id())
    }

    /// Store `instance` under `id`, or under a fresh engine id when `None`.
    pub fn cache_instance(&mut self, instance: Instance, id: Option<u64>) -> Result<u64> {
        let id = match id {
            Some(id) if self.instances.contains_key(&id) => {
                return Err(BridgeError::DuplicateInstanceRegistration { id })
            }
            Some(id) => id,
            None => self.engine.new_id(),
        };
        trace!(id, instance = %instance.repr(), "instance cached");
        self.instances.insert(id, instance);
        Ok(id)
    }

    pub fn get_instance(&self, id: u64) -> Result<&Instance> {
        self.instances
            .get(&id)
            .ok_or(BridgeError::UnregisteredInstance { id })
    }

    pub fn has_instance(&self, id: u64) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Fork for one query: shared classes, private instances.
    pub fn copy(&self) -> Registry {
        self.clone()
    }

    pub fn set_adapter(&mut self, adapter: Arc<dyn DataFilterAdapter>) {
        self.adapter = Some(adapter);
    }

    pub fn adapter(&self) -> Option<&Arc<dyn DataFilterAdapter>> {
        self.adapter.as_ref()
    }
}
