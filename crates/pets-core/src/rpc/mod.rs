//! Request/reply RPC layered over the broker.
//!
//! - [`client::RpcClient`] – the caller side.  Publishes a request with a
//!   fresh correlation id and waits (with a deadline) for the matching
//!   reply.
//! - [`listener::RpcListener`] – the callee side.  Consumes request queues,
//!   hands each request to an [`RpcHandler`] and publishes its reply.

pub mod client;
pub mod listener;

use std::time::Duration;

pub use client::{RpcClient, RpcError};
pub use listener::{HandlerError, HandlerReply, RpcHandler, RpcListener};

/// Default bound on how long a caller waits for a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Caller-side RPC settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// How long a call waits for its reply before giving up.
    pub timeout: Duration,
    /// Suffix appended to reply queue names so that separate processes
    /// calling the same operation never consume each other's replies.
    pub reply_namespace: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            reply_namespace: None,
        }
    }
}

impl RpcConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.reply_namespace = Some(namespace.into());
        self
    }
}
