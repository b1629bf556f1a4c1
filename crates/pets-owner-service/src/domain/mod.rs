//! Domain layer of the owner service.

pub mod owner;
pub mod sorting;

pub use owner::Owner;
pub use sorting::OwnerSortKey;
