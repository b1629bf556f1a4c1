//! # pets-gateway
//!
//! The edge of the system.  Every external operation becomes one RPC call
//! to the cat or owner service, and the outcome is projected onto an
//! [`EdgeResponse`] whose status mirrors an HTTP status code.
//!
//! # Architecture overview (for beginners)
//!
//! ```text
//! CLI / external caller
//!       ↕
//! pets-gateway  ← this crate
//!   domain/       EdgeResponse, users and roles, GatewayConfig
//!   application/  GatewayService (one method per operation),
//!                 CatSecurityService + access guards, UserDirectory
//!       ↕  RpcClient over the broker
//! pets-cat-service / pets-owner-service
//! ```
//!
//! # Silence is an answer
//!
//! The domain services reply with nothing when there is no result.  The
//! gateway therefore maps "no reply within the timeout" to `NotFound` for
//! lookups and updates, and to `RequestTimeout` for commands, the same way
//! for every operation.

pub mod application;
pub mod domain;

pub use application::gateway_service::GatewayService;
pub use application::security::CatSecurityService;
pub use application::user_directory::UserDirectory;
pub use application::GatewayError;
pub use domain::response::{EdgeResponse, EdgeStatus};
pub use domain::user::{Role, User};
