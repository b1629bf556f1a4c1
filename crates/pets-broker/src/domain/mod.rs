//! Domain layer for the broker daemon: its configuration.

pub mod config;

pub use config::BrokerConfig;
