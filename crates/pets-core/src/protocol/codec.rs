//! Binary codec for frames exchanged between a service and the broker daemon.
//!
//! Wire format:
//! ```text
//! [version:1][frame_type:1][reserved:2][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes.  `payload_len` is big-endian.  The payload
//! is the `bincode` encoding of the frame's fields.
//!
//! # Why a length prefix? (for beginners)
//!
//! TCP delivers a stream of bytes, not messages.  One `read()` may return
//! half a frame or three frames glued together.  The length in the header
//! tells the reader exactly where each frame ends, so it can buffer until a
//! whole frame is available and then decode it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::protocol::envelope::Envelope;
use crate::topology::QueueSpec;

/// Current frame protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a frame may declare (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// Not enough bytes yet for a complete frame.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The frame type byte is not a recognised value.
    #[error("unknown frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be (de)serialised.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The header declares a payload larger than [`MAX_PAYLOAD_SIZE`].
    #[error("frame too large: {declared} bytes exceeds limit of {max}")]
    FrameTooLarge { declared: usize, max: usize },
}

/// Frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Publish = 0x01,
    DeclareQueue = 0x02,
    Consume = 0x03,
    Deliver = 0x04,
    Ack = 0x05,
    Reject = 0x06,
    Requeue = 0x07,
    Error = 0x7F,
}

impl TryFrom<u8> for FrameType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(FrameType::Publish),
            0x02 => Ok(FrameType::DeclareQueue),
            0x03 => Ok(FrameType::Consume),
            0x04 => Ok(FrameType::Deliver),
            0x05 => Ok(FrameType::Ack),
            0x06 => Ok(FrameType::Reject),
            0x07 => Ok(FrameType::Requeue),
            0x7F => Ok(FrameType::Error),
            _ => Err(()),
        }
    }
}

/// Every frame that can cross the service ⇄ broker link.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerFrame {
    /// Client → broker: route this envelope.
    Publish(Envelope),
    /// Client → broker: make sure this queue exists.
    DeclareQueue(QueueSpec),
    /// Client → broker: start delivering from `queue` under `consumer_tag`.
    Consume {
        consumer_tag: u32,
        queue: String,
        prefetch: u16,
    },
    /// Broker → client: one message for the consumer `consumer_tag`.
    Deliver {
        consumer_tag: u32,
        delivery_tag: u64,
        envelope: Envelope,
    },
    /// Client → broker: the delivery was processed.
    Ack { delivery_tag: u64 },
    /// Client → broker: the delivery failed; dead-letter it.
    Reject { delivery_tag: u64, reason: String },
    /// Client → broker: the delivery was not processed; put it back.
    Requeue { delivery_tag: u64 },
    /// Broker → client: a request could not be honoured.
    Error { message: String },
}

impl BrokerFrame {
    /// The type code written into the header for this frame.
    pub fn frame_type(&self) -> FrameType {
        match self {
            BrokerFrame::Publish(_) => FrameType::Publish,
            BrokerFrame::DeclareQueue(_) => FrameType::DeclareQueue,
            BrokerFrame::Consume { .. } => FrameType::Consume,
            BrokerFrame::Deliver { .. } => FrameType::Deliver,
            BrokerFrame::Ack { .. } => FrameType::Ack,
            BrokerFrame::Reject { .. } => FrameType::Reject,
            BrokerFrame::Requeue { .. } => FrameType::Requeue,
            BrokerFrame::Error { .. } => FrameType::Error,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`BrokerFrame`] into a byte vector including the 8-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if serialisation fails, or
/// [`ProtocolError::FrameTooLarge`] if the payload exceeds the limit.
///
/// # Examples
///
/// ```rust
/// use pets_core::protocol::{decode_frame, encode_frame, BrokerFrame};
///
/// let frame = BrokerFrame::Ack { delivery_tag: 42 };
/// let bytes = encode_frame(&frame).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &BrokerFrame) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(frame)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            declared: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let payload_len = payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(frame.frame_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`BrokerFrame`] from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed, so a stream reader
/// can drain them from its buffer.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when the buffer holds less
/// than one complete frame (the caller should read more and retry), or
/// another [`ProtocolError`] when the bytes are malformed.
pub fn decode_frame(bytes: &[u8]) -> Result<(BrokerFrame, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let type_byte = bytes[1];
    let frame_type =
        FrameType::try_from(type_byte).map_err(|_| ProtocolError::UnknownFrameType(type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            declared: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let frame = decode_payload(frame_type, &bytes[HEADER_SIZE..total_needed])?;
    Ok((frame, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(frame: &BrokerFrame) -> Result<Vec<u8>, ProtocolError> {
    match frame {
        BrokerFrame::Publish(envelope) => serialize(envelope),
        BrokerFrame::DeclareQueue(spec) => serialize(spec),
        BrokerFrame::Consume {
            consumer_tag,
            queue,
            prefetch,
        } => serialize(&(consumer_tag, queue, prefetch)),
        BrokerFrame::Deliver {
            consumer_tag,
            delivery_tag,
            envelope,
        } => serialize(&(consumer_tag, delivery_tag, envelope)),
        BrokerFrame::Ack { delivery_tag } => serialize(delivery_tag),
        BrokerFrame::Reject {
            delivery_tag,
            reason,
        } => serialize(&(delivery_tag, reason)),
        BrokerFrame::Requeue { delivery_tag } => serialize(delivery_tag),
        BrokerFrame::Error { message } => serialize(message),
    }
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(frame_type: FrameType, payload: &[u8]) -> Result<BrokerFrame, ProtocolError> {
    let frame = match frame_type {
        FrameType::Publish => BrokerFrame::Publish(deserialize(payload)?),
        FrameType::DeclareQueue => BrokerFrame::DeclareQueue(deserialize(payload)?),
        FrameType::Consume => {
            let (consumer_tag, queue, prefetch) = deserialize(payload)?;
            BrokerFrame::Consume {
                consumer_tag,
                queue,
                prefetch,
            }
        }
        FrameType::Deliver => {
            let (consumer_tag, delivery_tag, envelope) = deserialize(payload)?;
            BrokerFrame::Deliver {
                consumer_tag,
                delivery_tag,
                envelope,
            }
        }
        FrameType::Ack => BrokerFrame::Ack {
            delivery_tag: deserialize(payload)?,
        },
        FrameType::Reject => {
            let (delivery_tag, reason) = deserialize(payload)?;
            BrokerFrame::Reject {
                delivery_tag,
                reason,
            }
        }
        FrameType::Requeue => BrokerFrame::Requeue {
            delivery_tag: deserialize(payload)?,
        },
        FrameType::Error => BrokerFrame::Error {
            message: deserialize(payload)?,
        },
    };
    Ok(frame)
}

fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(payload).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}
