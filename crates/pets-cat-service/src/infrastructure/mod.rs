//! Infrastructure layer: storage, the owner-service client, and the RPC
//! request handler.

pub mod listener;
pub mod memory_store;
pub mod owner_directory;
