//! Domain layer of the cat service.

pub mod cat;
pub mod sorting;

pub use cat::Cat;
pub use sorting::CatSortKey;
