//! Serde-deserializable types matching the API response envelope.
//!
//! Every endpoint answers with the same envelope. These types stay separate
//! from the domain types so the envelope can be checked once, at the client
//! boundary, and turned into either typed data or a [`NormalizedError`].

use serde::Deserialize;

use super::error::{ErrorKind, NormalizedError};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Option<T>,
  pub error: Option<ApiErrorBody>,
  pub meta: Option<Meta>,
  #[serde(default)]
  pub request_id: String,
  #[serde(default)]
  pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
  pub code: Option<String>,
  pub message: Option<String>,
  pub details: Option<serde_json::Value>,
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Meta {
  pub pagination: Option<Pagination>,
  pub sorting: Option<Sorting>,
  pub filtering: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub offset: u32,
  #[serde(default)]
  pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sorting {
  pub sort_by: String,
  pub sort_order: String,
}

// ============================================================================
// Decoded response
// ============================================================================

/// Successful response with the envelope already unpacked.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
  pub data: T,
  pub meta: Option<Meta>,
  pub request_id: String,
  pub timestamp: String,
}

impl<T> Envelope<T> {
  /// Turn the envelope into typed data or a normalized error.
  ///
  /// `success: false` is an application error even with a 2xx status.
  pub fn into_response(self) -> Result<ApiResponse<T>, NormalizedError> {
    if !self.success {
      return Err(
        self
          .error
          .map(ApiErrorBody::into_normalized)
          .unwrap_or_else(|| {
            NormalizedError::new(ErrorKind::Unknown(String::new()), "request failed")
          })
          .with_request_id(Some(self.request_id)),
      );
    }

    match self.data {
      Some(data) => Ok(ApiResponse {
        data,
        meta: self.meta,
        request_id: self.request_id,
        timestamp: self.timestamp,
      }),
      None => Err(
        NormalizedError::decode("response envelope has no data").with_request_id(Some(self.request_id)),
      ),
    }
  }
}

impl ApiErrorBody {
  pub fn into_normalized(self) -> NormalizedError {
    let kind = self
      .code
      .as_deref()
      .map(ErrorKind::from_code)
      .unwrap_or_else(|| ErrorKind::Unknown(String::new()));
    NormalizedError::new(kind, self.message.unwrap_or_default())
  }
}

/// Build the error for a non-2xx response.
///
/// Uses the structured envelope error when the body has one, otherwise a
/// synthetic `HTTP <status>` message.
pub fn error_from_body(status: u16, body: &[u8]) -> NormalizedError {
  let parsed = serde_json::from_slice::<Envelope<serde_json::Value>>(body).ok();

  match parsed {
    Some(Envelope {
      error: Some(error),
      request_id,
      ..
    }) if error.code.is_some() || error.message.is_some() => {
      let mut normalized = error.into_normalized();
      if normalized.message.trim().is_empty() {
        normalized.message = format!("HTTP {}", status);
      }
      if matches!(normalized.kind, ErrorKind::Unknown(ref c) if c.is_empty()) {
        normalized.kind = ErrorKind::Http(status);
      }
      normalized.with_status(status).with_request_id(Some(request_id))
    }
    _ => NormalizedError::http_status(status),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_success_envelope() {
    let body = r#"{
      "success": true,
      "data": [1, 2, 3],
      "meta": { "pagination": { "total": 30, "limit": 3, "offset": 0, "has_more": true } },
      "request_id": "req-1",
      "timestamp": "2024-03-01T12:00:00Z"
    }"#;

    let envelope: Envelope<Vec<u32>> = serde_json::from_str(body).unwrap();
    let response = envelope.into_response().unwrap();

    assert_eq!(response.data, vec![1, 2, 3]);
    assert_eq!(response.request_id, "req-1");
    let pagination = response.meta.unwrap().pagination.unwrap();
    assert_eq!(pagination.total, 30);
    assert!(pagination.has_more);
  }

  #[test]
  fn test_failure_envelope_with_2xx() {
    let body = r#"{
      "success": false,
      "error": { "code": "MISSING_QUERY", "message": "q is required" },
      "request_id": "req-2",
      "timestamp": ""
    }"#;

    let envelope: Envelope<Vec<u32>> = serde_json::from_str(body).unwrap();
    let err = envelope.into_response().unwrap_err();

    assert_eq!(err.kind, ErrorKind::MissingQuery);
    assert_eq!(err.message, "q is required");
    assert_eq!(err.request_id.as_deref(), Some("req-2"));
  }

  #[test]
  fn test_success_without_data_is_decode_error() {
    let envelope: Envelope<u32> =
      serde_json::from_str(r#"{ "success": true, "request_id": "r" }"#).unwrap();
    assert_eq!(envelope.into_response().unwrap_err().kind, ErrorKind::Decode);
  }

  #[test]
  fn test_error_from_structured_body() {
    let body = br#"{
      "success": false,
      "error": { "code": "NOT_FOUND", "message": "article 9 not found", "details": { "id": 9 } },
      "request_id": "req-3",
      "timestamp": ""
    }"#;

    let err = error_from_body(404, body);
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.status, Some(404));
    assert_eq!(err.request_id.as_deref(), Some("req-3"));
  }

  #[test]
  fn test_error_from_unparseable_body() {
    let err = error_from_body(503, b"<html>Service Unavailable</html>");
    assert_eq!(err.kind, ErrorKind::Http(503));
    assert_eq!(err.message, "HTTP 503");
  }

  #[test]
  fn test_error_body_without_code_or_message() {
    let err = error_from_body(500, br#"{ "success": false, "error": {} }"#);
    assert_eq!(err.kind, ErrorKind::Http(500));
    assert_eq!(err.message, "HTTP 500");
  }
}
