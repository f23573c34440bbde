// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Invocable surface - what a channel dispatches inbound calls against
//
// Exposed objects implement RemoteInvocable (usually via MethodObject);
// function arguments travel as Callback handles, which serialize to proxy
// references and reconstruct on the far side as callables that route back
// over the originating channel.

use crate::protocol::RemoteError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`RemoteInvocable::invoke`].
pub type InvokeFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Value, InvokeError>> + Send + 'static>>;

/// Boxed future returned by callback invocation.
pub type CallbackFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Value, RemoteError>> + Send + 'static>>;

/// Why an inbound invocation produced no result.
#[derive(Debug)]
pub enum InvokeError {
    /// The method name does not resolve to a callable on this object.
    MethodNotFound,
    /// The method ran and failed; the payload is forwarded to the caller.
    Raised(RemoteError),
}

impl From<RemoteError> for InvokeError {
    fn from(error: RemoteError) -> Self {
        Self::Raised(error)
    }
}

/// An object exposed for remote invocation.
///
/// The channel resolves the instance id, then calls `invoke` with the method
/// name and deserialized arguments; once the returned future settles, the
/// outcome becomes a success or error response. Implement this directly for
/// dynamic dispatch, or build a [`MethodObject`] for the common
/// closure-per-method case.
pub trait RemoteInvocable: Send + Sync {
    fn invoke(&self, method: &str, args: Vec<Arg>) -> InvokeFuture;
}

/// One argument of a remote call: plain data, or a callable that crosses the
/// transport as a proxy reference.
///
/// The variant is explicit on both sides of the boundary; there is no
/// duck-typed detection of "is this a function" anywhere in the crate.
#[derive(Clone)]
pub enum Arg {
    Data(Value),
    Callback(Callback),
}

impl Arg {
    /// The plain-data payload, as an error a handler can bubble up directly.
    pub fn into_data(self) -> std::result::Result<Value, RemoteError> {
        match self {
            Arg::Data(value) => Ok(value),
            Arg::Callback(_) => Err(RemoteError::new("expected a data argument, got a callback")),
        }
    }

    /// The callback payload, as an error a handler can bubble up directly.
    pub fn into_callback(self) -> std::result::Result<Callback, RemoteError> {
        match self {
            Arg::Callback(callback) => Ok(callback),
            Arg::Data(_) => Err(RemoteError::new("expected a callback argument, got data")),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Data(value)
    }
}

impl From<Callback> for Arg {
    fn from(callback: Callback) -> Self {
        Arg::Callback(callback)
    }
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Arg::Callback(_) => f.write_str("Callback"),
        }
    }
}

type CallbackFn = dyn Fn(Vec<Value>) -> CallbackFuture + Send + Sync;

/// Cloneable handle to an async function.
///
/// A locally constructed callback wraps a closure; a callback reconstructed
/// from a proxy reference forwards each invocation back over the channel
/// that delivered it. Either way, `call` settles with the function's result.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackFn>,
}

impl Callback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RemoteError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |args| -> CallbackFuture { Box::pin(f(args)) }),
        }
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> std::result::Result<Value, RemoteError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(move |args| -> CallbackFuture {
                let result = f(args);
                Box::pin(std::future::ready(result))
            }),
        }
    }

    pub async fn call(&self, args: Vec<Value>) -> std::result::Result<Value, RemoteError> {
        (self.inner)(args).await
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Callback")
    }
}

type MethodFn = dyn Fn(Vec<Arg>) -> CallbackFuture + Send + Sync;

/// Method-table implementation of [`RemoteInvocable`].
///
/// ```ignore
/// let echo = MethodObject::new()
///     .method("identity", |mut args: Vec<Arg>| async move {
///         args.remove(0).into_data()
///     })
///     .build();
/// channel.object_registry().register("echo", echo);
/// ```
pub struct MethodObject {
    methods: HashMap<String, Arc<MethodFn>>,
}

impl MethodObject {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Add an async method under `name`. Re-adding a name replaces the
    /// previous handler.
    pub fn method<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RemoteError>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            Arc::new(move |args| -> CallbackFuture { Box::pin(f(args)) }),
        );
        self
    }

    pub fn build(self) -> Arc<dyn RemoteInvocable> {
        Arc::new(self)
    }
}

impl Default for MethodObject {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteInvocable for MethodObject {
    fn invoke(&self, method: &str, args: Vec<Arg>) -> InvokeFuture {
        match self.methods.get(method) {
            Some(handler) => {
                let future = handler(args);
                Box::pin(async move { future.await.map_err(InvokeError::Raised) })
            }
            None => Box::pin(std::future::ready(Err(InvokeError::MethodNotFound))),
        }
    }
}
