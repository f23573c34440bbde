// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Channel - one logical RPC connection bound to a single remote context
//
// Owns the pending-call table and the object registry for that peer.
// Outbound: allocate a call id, record a pending call, serialize arguments
// (proxying callbacks), post, await the correlated response. Inbound:
// responses complete pending calls; requests resolve through the registry
// and are answered on their own task once the handler settles.

use crate::error::{Error, Result};
use crate::invocable::{Arg, Callback, InvokeError};
use crate::protocol::{self, Message, ProxyRef, RemoteError, Request, Response, WireValue};
use crate::registry::{ObjectRegistry, Resolved};
use crate::transport::{ContextId, MessageSink};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::oneshot;

/// One logical bidirectional RPC connection to a single remote context.
///
/// Channels are created by [`ChannelManager::add_channel`] and live for the
/// manager's lifetime. Concurrent calls on one channel are fully
/// independent: responses may arrive and resolve out of order.
///
/// [`ChannelManager::add_channel`]: crate::manager::ChannelManager::add_channel
pub struct Channel {
    id: u32,
    target: ContextId,
    target_origin: Option<String>,
    next_call_id: AtomicU32,
    next_proxy_id: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>,
    registry: ObjectRegistry,
    sink: TokioMutex<Box<dyn MessageSink>>,
    call_timeout: Mutex<Option<Duration>>,
}

impl Channel {
    pub(crate) fn new(
        id: u32,
        target: ContextId,
        sink: Box<dyn MessageSink>,
        target_origin: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            target,
            target_origin,
            next_call_id: AtomicU32::new(0),
            next_proxy_id: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
            registry: ObjectRegistry::new(),
            sink: TokioMutex::new(sink),
            call_timeout: Mutex::new(None),
        })
    }

    /// Identity of this channel within the process, carried by proxy
    /// references generated for its outbound calls.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The remote context this channel is bound to.
    pub fn target(&self) -> ContextId {
        self.target
    }

    /// The registry of objects this side exposes to the peer.
    pub fn object_registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Configure an optional per-call timeout.
    ///
    /// `None` (the default) leaves a call with a silent peer pending
    /// forever, matching the wire protocol, which has no way to signal
    /// "give up". With a timeout set, an unanswered call rejects with
    /// [`Error::Timeout`] and its pending record is removed.
    pub fn set_call_timeout(&self, timeout: Option<Duration>) {
        *self.call_timeout.lock() = timeout;
    }

    /// Invoke `method` on the object the peer registered under
    /// `instance_id`.
    ///
    /// Arguments that are [`Arg::Callback`] are auto-registered locally and
    /// replaced by proxy references on the wire; the peer can call them
    /// back as if they were its own.
    pub async fn invoke_remote_method<T: DeserializeOwned>(
        self: &Arc<Self>,
        method: &str,
        instance_id: &str,
        args: Vec<Arg>,
    ) -> Result<T> {
        self.invoke_with_context(method, instance_id, None, args)
            .await
    }

    /// Like [`invoke_remote_method`](Channel::invoke_remote_method), with
    /// instance context data for the peer's factory registrations.
    pub async fn invoke_with_context<T: DeserializeOwned>(
        self: &Arc<Self>,
        method: &str,
        instance_id: &str,
        instance_context: Option<Value>,
        args: Vec<Arg>,
    ) -> Result<T> {
        let id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "Sending request: id={}, instance='{}', method='{}', channel={}",
            id,
            instance_id,
            method,
            self.id
        );

        let params = self.serialize_args(args);
        let request = Request {
            method: method.to_string(),
            instance_id: instance_id.to_string(),
            instance_context,
            params,
            id,
        };
        let payload = serde_json::to_value(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.post(payload).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let timeout = *self.call_timeout.lock();
        let received = match timeout {
            Some(window) => match tokio::time::timeout(window, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().remove(&id);
                    return Err(Error::Timeout(format!(
                        "no response to '{method}' on '{instance_id}' (call {id}) within {window:?}"
                    )));
                }
            },
            None => rx.await,
        };

        let value = received.map_err(|_| Error::ChannelClosed).and_then(|r| r)?;
        serde_json::from_value(value).map_err(Into::into)
    }

    /// Route one delivery into this channel. Messages failing the origin
    /// check are discarded as if they never arrived.
    pub(crate) fn handle_delivery(self: &Arc<Self>, origin: &str, payload: Value) {
        if let Some(expected) = self.target_origin.as_deref() {
            if expected != "*" && expected != origin {
                tracing::trace!(
                    "Dropping message from origin '{}' (channel {} expects '{}')",
                    origin,
                    self.id,
                    expected
                );
                return;
            }
        }

        match serde_json::from_value::<Message>(payload) {
            Ok(Message::Response(response)) => self.handle_response(response),
            Ok(Message::Request(request)) => {
                // Requests run on their own task so calls to independent
                // instances are dispatched and answered concurrently.
                let channel = Arc::clone(self);
                tokio::spawn(async move { channel.handle_request(request).await });
            }
            Err(e) => {
                tracing::warn!("Dropping malformed message on channel {}: {}", self.id, e);
            }
        }
    }

    fn handle_response(&self, response: Response) {
        let Some(tx) = self.pending.lock().remove(&response.id) else {
            tracing::debug!(
                "Dropping response for unknown call id {} on channel {}",
                response.id,
                self.id
            );
            return;
        };

        let result = match response.error {
            Some(error) => Err(reconstruct_error(error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };

        // The caller may already have given up (timeout).
        let _ = tx.send(result);
    }

    async fn handle_request(self: Arc<Self>, request: Request) {
        let id = request.id;
        let response = match self.run_request(request).await {
            Ok(result) => Response {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Response {
                id,
                result: None,
                error: Some(error),
            },
        };

        match serde_json::to_value(&response) {
            Ok(payload) => {
                if let Err(e) = self.post(payload).await {
                    tracing::warn!("Failed to send response for call {}: {}", id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response for call {}: {}", id, e);
            }
        }
    }

    async fn run_request(
        self: &Arc<Self>,
        request: Request,
    ) -> std::result::Result<Value, RemoteError> {
        tracing::debug!(
            "Dispatching request: id={}, instance='{}', method='{}', channel={}",
            request.id,
            request.instance_id,
            request.method,
            self.id
        );

        // Resolution happens here, at call-arrival time; an instance
        // unregistered while this request was in flight is already gone.
        let resolved = self
            .registry
            .resolve(&request.instance_id, request.instance_context.as_ref())
            .ok_or_else(|| RemoteError::remote_not_found(&request.instance_id))?;

        let args = self.deserialize_params(request.params);

        match resolved {
            Resolved::Callback(callback) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.into_data()?);
                }
                callback.call(values).await
            }
            Resolved::Object(object) => {
                match object.invoke(&request.method, args).await {
                    Ok(value) => Ok(value),
                    Err(InvokeError::MethodNotFound) => Err(RemoteError::method_not_found(
                        &request.method,
                        &request.instance_id,
                    )),
                    Err(InvokeError::Raised(error)) => Err(error),
                }
            }
        }
    }

    fn serialize_args(&self, args: Vec<Arg>) -> Vec<WireValue> {
        args.into_iter()
            .map(|arg| match arg {
                Arg::Data(value) => WireValue::Data(value),
                Arg::Callback(callback) => {
                    let proxy_id = format!(
                        "{}{}",
                        protocol::PROXY_ID_PREFIX,
                        self.next_proxy_id.fetch_add(1, Ordering::SeqCst)
                    );
                    self.registry.register_callback(&proxy_id, callback);
                    WireValue::Proxy(ProxyRef {
                        proxy_function_id: proxy_id,
                        channel_id: self.id,
                    })
                }
            })
            .collect()
    }

    fn deserialize_params(self: &Arc<Self>, params: Vec<WireValue>) -> Vec<Arg> {
        params
            .into_iter()
            .map(|wire| match wire {
                WireValue::Data(value) => Arg::Data(value),
                WireValue::Proxy(proxy) => Arg::Callback(self.proxy_callback(proxy)),
            })
            .collect()
    }

    /// Reconstruct a local callable for a proxy reference: invoking it
    /// issues a call back over this channel addressed at the proxied
    /// function's id.
    fn proxy_callback(self: &Arc<Self>, proxy: ProxyRef) -> Callback {
        let channel = Arc::downgrade(self);
        Callback::new(move |args: Vec<Value>| {
            let channel = Weak::clone(&channel);
            let instance_id = proxy.proxy_function_id.clone();
            async move {
                let Some(channel) = channel.upgrade() else {
                    return Err(RemoteError::new("channel is gone"));
                };
                channel
                    .invoke_remote_method::<Value>(
                        protocol::PROXY_METHOD,
                        &instance_id,
                        args.into_iter().map(Arg::Data).collect(),
                    )
                    .await
                    .map_err(|e| match e {
                        Error::RemoteThrew {
                            message,
                            name,
                            stack,
                        } => RemoteError {
                            message,
                            name,
                            stack,
                        },
                        other => RemoteError::new(other.to_string()),
                    })
            }
        })
    }

    async fn post(&self, message: Value) -> Result<()> {
        self.sink.lock().await.post(message).await
    }

    #[cfg(test)]
    pub(crate) fn insert_pending(&self, id: u32, tx: oneshot::Sender<Result<Value>>) {
        self.pending.lock().insert(id, tx);
    }
}

/// Map a wire error payload back onto the caller-facing error kinds.
fn reconstruct_error(error: RemoteError) -> Error {
    match error.name.as_deref() {
        Some(protocol::ERROR_NAME_REMOTE_NOT_FOUND) => Error::RemoteNotFound(error.message),
        Some(protocol::ERROR_NAME_METHOD_NOT_FOUND) => Error::MethodNotFound(error.message),
        _ => Error::RemoteThrew {
            message: error.message,
            name: error.name,
            stack: error.stack,
        },
    }
}
