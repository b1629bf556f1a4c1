//! Application layer: cat use cases and the traits they depend on.

pub mod cat_service;
pub mod friendship;
pub mod owner_directory;
pub mod repository;
