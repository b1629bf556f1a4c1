//! Protocol module: the RPC envelope, payload encoding, and the binary
//! frame codec used between a service and the broker daemon.

pub mod codec;
pub mod envelope;
pub mod payload;

pub use codec::{decode_frame, encode_frame, BrokerFrame, ProtocolError};
pub use envelope::{CorrelationId, DeathRecord, Envelope};
pub use payload::{FriendPair, PayloadError, PetTransfer};
