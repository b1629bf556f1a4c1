//! Gateway configuration.
//!
//! Populated from CLI arguments (with environment fallbacks) by the binary;
//! tests build it directly.

use std::net::SocketAddr;
use std::time::Duration;

use pets_core::rpc::DEFAULT_TIMEOUT;
use pets_core::RpcConfig;

/// Default broker daemon address, matching the services' default config.
pub const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:5679";

/// Reply-queue namespace used by the gateway's RPC client.
pub const REPLY_NAMESPACE: &str = "gateway";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub broker_addr: SocketAddr,

    /// How long each call waits for a reply before it counts as silence.
    pub rpc_timeout: Duration,
}

impl GatewayConfig {
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig::default()
            .with_timeout(self.rpc_timeout)
            .with_namespace(REPLY_NAMESPACE)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker_addr: SocketAddr::from(([127, 0, 0, 1], 5679)),
            rpc_timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_broker_addr_matches_constant() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.broker_addr.to_string(), DEFAULT_BROKER_ADDR);
    }

    #[test]
    fn test_rpc_config_uses_gateway_namespace() {
        let cfg = GatewayConfig {
            rpc_timeout: Duration::from_millis(750),
            ..GatewayConfig::default()
        };
        let rpc = cfg.rpc_config();
        assert_eq!(rpc.timeout, Duration::from_millis(750));
        assert_eq!(rpc.reply_namespace.as_deref(), Some(REPLY_NAMESPACE));
    }
}
