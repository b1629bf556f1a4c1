//! Infrastructure layer: storage, the cat-service client, and the RPC
//! request handler.

pub mod cat_directory;
pub mod listener;
pub mod memory_store;
