//! Wire protocol for framelink channels
//!
//! Defines the request/response correlation contract over a transport that
//! only supports fire-and-forget delivery of structured messages plus an
//! advertised sender origin. Every request carries a call id unique within
//! its channel; a response carries the same id and nothing else identifying
//! the call. The protocol is strictly request -> single response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reserved error name for "instance id unknown on the receiving side".
pub const ERROR_NAME_REMOTE_NOT_FOUND: &str = "RemoteNotFound";

/// Reserved error name for "instance exists, method does not resolve".
pub const ERROR_NAME_METHOD_NOT_FOUND: &str = "MethodNotFound";

/// Method name carried by proxy-callback invocations. Callback registry
/// entries answer any method name, so the value only has to be well-formed.
pub(crate) const PROXY_METHOD: &str = "";

/// Prefix for generated proxy-function instance ids.
pub(crate) const PROXY_ID_PREFIX: &str = "proxy";

/// Request message: invoke `method` on the object registered under
/// `instance_id` on the receiving side.
///
/// `instance_context` is optional data handed to factory registrations when
/// the instance id is resolved; it is omitted from the wire entirely for
/// plain calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_context: Option<Value>,
    #[serde(default)]
    pub params: Vec<WireValue>,
    pub id: u32,
}

/// Response message. Exactly one of `result`/`error` is present; a response
/// whose id matches no outstanding call is dropped by the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

/// Error payload carried by a failed response.
///
/// This is also the error type local method handlers return: `message`,
/// `name` and `stack` are forwarded to the caller best-effort. The reserved
/// names [`ERROR_NAME_REMOTE_NOT_FOUND`] and [`ERROR_NAME_METHOD_NOT_FOUND`]
/// mark dispatch failures; any other name travels through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: None,
            stack: None,
        }
    }

    pub fn named(name: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: Some(name.to_string()),
            stack: None,
        }
    }

    pub(crate) fn remote_not_found(instance_id: &str) -> Self {
        Self::named(
            ERROR_NAME_REMOTE_NOT_FOUND,
            format!("Object {instance_id} not found"),
        )
    }

    pub(crate) fn method_not_found(method: &str, instance_id: &str) -> Self {
        Self::named(
            ERROR_NAME_METHOD_NOT_FOUND,
            format!("Method {method} does not exist on object {instance_id}"),
        )
    }
}

/// One serialized argument or result position.
///
/// Function arguments cannot cross the transport by value; they travel as a
/// [`ProxyRef`] the receiving side can route a call back through. The proxy
/// variant must come first so the untagged deserializer claims marker
/// objects before the data catch-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Proxy(ProxyRef),
    Data(Value),
}

/// Serializable stand-in for a function argument: addresses a callback
/// auto-registered on the sending side's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRef {
    pub proxy_function_id: String,
    pub channel_id: u32,
}

/// Discriminated union of wire messages.
///
/// Untagged: requests are recognized by `method` + `instanceId`; anything
/// else carrying an `id` is a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let request = Request {
            method: "identity".to_string(),
            instance_id: "echo".to_string(),
            instance_context: None,
            params: vec![WireValue::Data(json!(42))],
            id: 7,
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            json!({"method": "identity", "instanceId": "echo", "params": [42], "id": 7})
        );
    }

    #[test]
    fn request_carries_instance_context_when_present() {
        let request = Request {
            method: "getData".to_string(),
            instance_id: "settings".to_string(),
            instance_context: Some(json!({"scope": "user"})),
            params: vec![],
            id: 1,
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["instanceContext"], json!({"scope": "user"}));
    }

    #[test]
    fn success_response_omits_error() {
        let response = Response {
            id: 3,
            result: Some(json!({"ok": true})),
            error: None,
        };

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({"id": 3, "result": {"ok": true}}));
    }

    #[test]
    fn error_response_round_trips() {
        let wire = json!({"id": 9, "error": {"message": "boom", "name": "RemoteNotFound"}});
        let response: Response = serde_json::from_value(wire).unwrap();

        assert_eq!(response.id, 9);
        let error = response.error.unwrap();
        assert_eq!(error.message, "boom");
        assert_eq!(error.name.as_deref(), Some(ERROR_NAME_REMOTE_NOT_FOUND));
        assert_eq!(error.stack, None);
    }

    #[test]
    fn message_discriminates_request_from_response() {
        let request: Message = serde_json::from_value(json!({
            "method": "resize", "instanceId": "control", "params": [800, 600], "id": 0
        }))
        .unwrap();
        assert!(matches!(request, Message::Request(_)));

        let response: Message =
            serde_json::from_value(json!({"id": 0, "result": null})).unwrap();
        assert!(matches!(response, Message::Response(_)));
    }

    #[test]
    fn proxy_ref_is_claimed_before_plain_data() {
        let params: Vec<WireValue> = serde_json::from_value(json!([
            {"proxyFunctionId": "proxy0", "channelId": 2},
            {"a": 1},
            "text"
        ]))
        .unwrap();

        assert!(matches!(
            &params[0],
            WireValue::Proxy(p) if p.proxy_function_id == "proxy0" && p.channel_id == 2
        ));
        assert!(matches!(&params[1], WireValue::Data(v) if v == &json!({"a": 1})));
        assert!(matches!(&params[2], WireValue::Data(v) if v == &json!("text")));
    }
}
