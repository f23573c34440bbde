//! framelink: asynchronous RPC between isolated contexts over
//! message-passing transports
//!
//! An embedding host and an embedded (typically cross-origin) guest call
//! methods on each other as if they were local objects. Each side exposes
//! surface by registering instances under string ids; calls are correlated
//! requests/responses over a transport that only offers fire-and-forget
//! delivery plus an asserted sender origin. Function arguments cross the
//! boundary as proxy references that route invocations back to their owning
//! side.
//!
//! # Example
//!
//! ```ignore
//! use framelink::transport::LocalContext;
//! use framelink::{Arg, ChannelManager, MethodObject};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut host = LocalContext::new("https://host.example");
//! let mut guest = LocalContext::new("https://guest.example");
//!
//! let host_manager = ChannelManager::new(host.deliveries());
//! let guest_manager = ChannelManager::new(guest.deliveries());
//!
//! let to_guest = host_manager.add_channel(
//!     guest.id(), guest.sink_from(&host), Some("https://guest.example"));
//! let to_host = guest_manager.add_channel(
//!     host.id(), host.sink_from(&guest), Some("https://host.example"));
//!
//! to_host.object_registry().register(
//!     "echo",
//!     MethodObject::new()
//!         .method("identity", |mut args| async move { args.remove(0).into_data() })
//!         .build(),
//! );
//!
//! let answer: i64 = to_guest
//!     .invoke_remote_method("identity", "echo", vec![Arg::Data(json!(42))])
//!     .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod invocable;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use channel::Channel;
pub use error::{Error, Result};
pub use invocable::{Arg, Callback, InvokeError, MethodObject, RemoteInvocable};
pub use manager::ChannelManager;
pub use protocol::{Message, ProxyRef, RemoteError, Request, Response, WireValue};
pub use registry::ObjectRegistry;
pub use transport::{ContextId, Delivery, MessageSink};
