//! Uniform payload encoding for RPC bodies.
//!
//! | Payload              | Encoding                              |
//! |----------------------|---------------------------------------|
//! | Records and requests | JSON, camelCase keys                  |
//! | Single id            | UUID text (`"4b0d…"`)                 |
//! | Boolean result       | JSON `true` / `false`                 |
//! | Acknowledge only     | Empty body                            |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Body of an acknowledge-only reply.
pub const ACK: &[u8] = &[];

/// Errors raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed id payload: {0}")]
    Id(String),
}

/// Two cat ids, for `cat.makeFriends` and `cat.deleteFriendship`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendPair {
    pub id1: Uuid,
    pub id2: Uuid,
}

/// Owner and pet ids, for `owner.changeForPet` and `owner.deletePet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetTransfer {
    pub owner_id: Uuid,
    pub pet_id: Uuid,
}

/// Serialises `value` as JSON.
///
/// # Errors
///
/// Returns [`PayloadError::Json`] if serialisation fails.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, PayloadError> {
    Ok(serde_json::to_vec(value)?)
}

/// Parses a JSON body.
///
/// # Errors
///
/// Returns [`PayloadError::Json`] for malformed or mistyped JSON.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, PayloadError> {
    Ok(serde_json::from_slice(body)?)
}

/// Encodes a bare id as its hyphenated text form.
pub fn encode_id(id: Uuid) -> Vec<u8> {
    id.to_string().into_bytes()
}

/// Parses a bare id body.  Surrounding whitespace and JSON quotes are
/// tolerated.
///
/// # Errors
///
/// Returns [`PayloadError::Id`] if the body is not UTF-8 or not a UUID.
pub fn decode_id(body: &[u8]) -> Result<Uuid, PayloadError> {
    let text = std::str::from_utf8(body).map_err(|e| PayloadError::Id(e.to_string()))?;
    let text = text.trim().trim_matches('"');
    Uuid::parse_str(text).map_err(|e| PayloadError::Id(format!("'{text}': {e}")))
}

/// Encodes a boolean result.
pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        b"true".to_vec()
    } else {
        b"false".to_vec()
    }
}

/// Parses a boolean result.
///
/// # Errors
///
/// Returns [`PayloadError::Json`] if the body is not `true` or `false`.
pub fn decode_bool(body: &[u8]) -> Result<bool, PayloadError> {
    decode_json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_id_accepts_plain_and_quoted_text() {
        let id = Uuid::new_v4();
        assert_eq!(decode_id(&encode_id(id)).unwrap(), id);
        assert_eq!(decode_id(format!("\"{id}\"\n").as_bytes()).unwrap(), id);
    }

    #[test]
    fn test_decode_id_rejects_garbage() {
        assert!(matches!(decode_id(b"not-a-uuid"), Err(PayloadError::Id(_))));
        assert!(matches!(decode_id(&[0xFF, 0xFE]), Err(PayloadError::Id(_))));
    }

    #[test]
    fn test_bool_payloads() {
        assert!(decode_bool(&encode_bool(true)).unwrap());
        assert!(!decode_bool(&encode_bool(false)).unwrap());
        assert!(decode_bool(ACK).is_err());
    }

    #[test]
    fn test_pet_transfer_uses_camel_case_keys() {
        let transfer = PetTransfer {
            owner_id: Uuid::nil(),
            pet_id: Uuid::nil(),
        };
        let value: serde_json::Value = serde_json::from_slice(&encode_json(&transfer).unwrap()).unwrap();
        assert!(value.get("ownerId").is_some());
        assert!(value.get("petId").is_some());
    }

    #[test]
    fn test_friend_pair_reads_id1_id2_map() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let body = format!(r#"{{"id1":"{a}","id2":"{b}"}}"#);
        let pair: FriendPair = decode_json(body.as_bytes()).unwrap();
        assert_eq!(pair, FriendPair { id1: a, id2: b });
    }
}
