//! Application layer: the edge operations and the rules guarding them.

pub mod gateway_service;
pub mod security;
pub mod user_directory;

use pets_core::protocol::payload::PayloadError;
use pets_core::{Operation, RpcError};
use thiserror::Error;

/// Failures the gateway cannot express as an [`crate::EdgeStatus`].
///
/// A missing reply is not one of them; it becomes `NotFound` or
/// `RequestTimeout`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The broker refused or dropped the request.
    #[error("broker request failed: {0}")]
    Rpc(#[from] RpcError),

    /// A service replied with a body the gateway cannot read.
    #[error("undecodable reply to {operation}: {source}")]
    Reply {
        operation: Operation,
        #[source]
        source: PayloadError,
    },

    /// A request record could not be serialised.
    #[error("cannot encode request: {0}")]
    Encode(#[source] PayloadError),
}
