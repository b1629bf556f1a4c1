//! Outcome of one edge operation.
//!
//! [`EdgeStatus`] mirrors the HTTP status the operation would carry on a
//! REST front-end; [`EdgeResponse`] pairs it with an optional body.
//!
//! # JSON projection
//!
//! ```json
//! {"status":404,"reason":"Not Found","body":null}
//! ```

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    Ok,
    Created,
    NoContent,
    BadRequest,
    Forbidden,
    NotFound,
    RequestTimeout,
}

impl EdgeStatus {
    pub fn code(self) -> u16 {
        match self {
            EdgeStatus::Ok => 200,
            EdgeStatus::Created => 201,
            EdgeStatus::NoContent => 204,
            EdgeStatus::BadRequest => 400,
            EdgeStatus::Forbidden => 403,
            EdgeStatus::NotFound => 404,
            EdgeStatus::RequestTimeout => 408,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            EdgeStatus::Ok => "OK",
            EdgeStatus::Created => "Created",
            EdgeStatus::NoContent => "No Content",
            EdgeStatus::BadRequest => "Bad Request",
            EdgeStatus::Forbidden => "Forbidden",
            EdgeStatus::NotFound => "Not Found",
            EdgeStatus::RequestTimeout => "Request Timeout",
        }
    }

    /// `true` for the 2xx statuses.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.code())
    }
}

/// Status plus optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse<T> {
    pub status: EdgeStatus,
    pub body: Option<T>,
}

impl<T> EdgeResponse<T> {
    pub fn with_body(status: EdgeStatus, body: T) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn status(status: EdgeStatus) -> Self {
        Self { status, body: None }
    }

    pub fn forbidden() -> Self {
        Self::status(EdgeStatus::Forbidden)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl<T: Serialize> EdgeResponse<T> {
    /// The JSON shape printed by the CLI.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error if the body cannot be represented.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let body = match &self.body {
            Some(body) => serde_json::to_value(body)?,
            None => Value::Null,
        };
        Ok(json!({
            "status": self.status.code(),
            "reason": self.status.reason(),
            "body": body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_http() {
        assert_eq!(EdgeStatus::NoContent.code(), 204);
        assert_eq!(EdgeStatus::RequestTimeout.code(), 408);
        assert!(EdgeStatus::Created.is_success());
        assert!(!EdgeStatus::Forbidden.is_success());
    }

    #[test]
    fn test_json_projection_without_body() {
        let response: EdgeResponse<u32> = EdgeResponse::status(EdgeStatus::NotFound);
        let value = response.to_json().unwrap();
        assert_eq!(value["status"], 404);
        assert_eq!(value["reason"], "Not Found");
        assert!(value["body"].is_null());
    }

    #[test]
    fn test_json_projection_with_body() {
        let response = EdgeResponse::with_body(EdgeStatus::Ok, vec!["a", "b"]);
        assert_eq!(response.to_json().unwrap()["body"][1], "b");
    }
}
