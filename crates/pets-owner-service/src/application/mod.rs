//! Application layer: owner use cases and the seams they depend on.

pub mod cat_directory;
pub mod owner_service;
pub mod repository;
