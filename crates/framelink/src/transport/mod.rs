//! Transport seam for framelink
//!
//! The wire primitive is fire-and-forget delivery of a JSON payload plus an
//! envelope naming the sending context and the origin it asserted.
//! [`MessageSink`] is the outbound half a channel writes to; inbound traffic
//! from every transport is merged into a single [`Delivery`] stream that the
//! channel manager demultiplexes by sender.
//!
//! - [`local`]: in-process mailboxes, for same-process host/guest pairs and
//!   tests. The pairing code stamps sender identity and origin, mirroring
//!   the platform's trusted envelope.
//! - [`pipe`]: length-prefixed JSON envelopes over any `AsyncRead`/`AsyncWrite`
//!   pair, for a guest in a separate process.

use crate::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod local;
pub mod pipe;

pub use local::{LocalContext, LocalSink};
pub use pipe::{PipeReceiver, PipeSink, send_envelope};

/// Process-unique identity of a remote context, standing in for the window
/// identity the platform keys messages by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// One inbound message as the transport hands it over.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Identity of the sending context.
    pub sender: ContextId,
    /// Origin the transport asserted for the sender.
    pub origin: String,
    /// The wire message.
    pub payload: Value,
}

/// Sending half of a transport, bound to one remote context.
pub trait MessageSink: Send + Unpin {
    fn post(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
