//! Gateway domain types.

pub mod config;
pub mod response;
pub mod user;

pub use config::GatewayConfig;
pub use response::{EdgeResponse, EdgeStatus};
pub use user::{Role, User};
