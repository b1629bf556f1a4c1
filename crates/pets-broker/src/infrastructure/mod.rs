//! Infrastructure layer: the TCP daemon and the client that talks to it.

pub mod client;
pub mod server;

/// Size of each socket read.
pub(crate) const READ_CHUNK: usize = 8192;
