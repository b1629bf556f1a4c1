//! Seam through which the cat service confirms an owner exists.

use async_trait::async_trait;
use pets_core::{DomainError, OwnerDto, OwnerId};

/// Looks owners up in the owner service.
///
/// Infrastructure implementation uses RPC; tests use stubs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// Returns the owner, or `NotFound` / `Timeout` / `Unavailable` when it
    /// could not be confirmed.
    async fn find_owner(&self, id: OwnerId) -> Result<OwnerDto, DomainError>;
}
