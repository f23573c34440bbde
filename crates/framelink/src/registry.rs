// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Object registry - per-channel mapping from instance id to local surface
//
// Entries are resolved at call-arrival time, never cached: unregistering an
// id makes calls dispatched afterwards fail even if they were already in
// flight when the entry was removed.

use crate::error::{Error, Result};
use crate::invocable::{Callback, RemoteInvocable};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type InstanceFactory = dyn Fn(Option<&Value>) -> Arc<dyn RemoteInvocable> + Send + Sync;

#[derive(Clone)]
enum Registered {
    Instance(Arc<dyn RemoteInvocable>),
    Factory(Arc<InstanceFactory>),
    Callback(Callback),
}

/// What one lookup produced for an inbound request.
pub(crate) enum Resolved {
    Object(Arc<dyn RemoteInvocable>),
    Callback(Callback),
}

/// Mapping from instance id to locally owned object, scoped to one channel.
///
/// Instance ids are unique within a registry. `register` overwrites an
/// existing id silently (last writer wins); callers that want a duplicate to
/// be an error use [`try_register`](ObjectRegistry::try_register) instead.
#[derive(Default)]
pub struct ObjectRegistry {
    entries: Mutex<HashMap<String, Registered>>,
}

impl ObjectRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Expose `instance` to the remote side under `instance_id`.
    pub fn register(&self, instance_id: &str, instance: Arc<dyn RemoteInvocable>) {
        self.entries
            .lock()
            .insert(instance_id.to_string(), Registered::Instance(instance));
    }

    /// Like [`register`](ObjectRegistry::register), but errors instead of
    /// replacing an existing entry.
    pub fn try_register(
        &self,
        instance_id: &str,
        instance: Arc<dyn RemoteInvocable>,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(instance_id) {
            return Err(Error::DuplicateInstance(instance_id.to_string()));
        }
        entries.insert(instance_id.to_string(), Registered::Instance(instance));
        Ok(())
    }

    /// Expose a factory. It runs on every resolution with the request's
    /// instance context; the returned object handles that one invocation.
    pub fn register_factory<F>(&self, instance_id: &str, factory: F)
    where
        F: Fn(Option<&Value>) -> Arc<dyn RemoteInvocable> + Send + Sync + 'static,
    {
        self.entries
            .lock()
            .insert(instance_id.to_string(), Registered::Factory(Arc::new(factory)));
    }

    /// Expose a bare callback; it answers any method name. Proxy generation
    /// uses this for function arguments.
    pub fn register_callback(&self, instance_id: &str, callback: Callback) {
        self.entries
            .lock()
            .insert(instance_id.to_string(), Registered::Callback(callback));
    }

    /// Remove an entry. Later inbound calls to `instance_id` receive a
    /// not-found error.
    pub fn unregister(&self, instance_id: &str) {
        self.entries.lock().remove(instance_id);
    }

    pub(crate) fn resolve(&self, instance_id: &str, context: Option<&Value>) -> Option<Resolved> {
        let entry = self.entries.lock().get(instance_id).cloned()?;
        Some(match entry {
            Registered::Instance(instance) => Resolved::Object(instance),
            Registered::Factory(factory) => Resolved::Object(factory(context)),
            Registered::Callback(callback) => Resolved::Callback(callback),
        })
    }
}
