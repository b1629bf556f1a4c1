//! Runtime configuration for the broker daemon.

use std::net::SocketAddr;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5679";

/// Configuration for a running broker daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Frames buffered per connection before the writer applies
    /// back-pressure to deliveries.
    pub outbound_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5679)),
            outbound_buffer: 256,
        }
    }
}
