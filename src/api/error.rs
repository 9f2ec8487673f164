//! Error taxonomy for API calls and the user-facing message table.
//!
//! Every failed request, whatever broke, ends up as a single
//! [`NormalizedError`]. Views never branch on transport exceptions versus
//! server payloads; they read the error stored on the cache entry and ask it
//! for a message in the active locale.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// What went wrong, as far as the dashboard is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  // Codes reported by the server in the envelope's `error.code`
  NotFound,
  DatabaseError,
  InvalidDate,
  InvalidSource,
  MissingQuery,
  SearchError,
  ScrapingFailed,
  InvalidRequest,
  InvalidId,

  // Produced on the client side
  /// Server unreachable (DNS, refused connection, TLS, reset)
  Network,
  /// No response within the per-request timeout
  Timeout,
  /// Non-2xx response without a parseable error body
  Http(u16),
  /// Response did not match the expected schema
  Decode,
  /// Quota exhausted (HTTP 429)
  RateLimited,
  /// A server code we do not know about
  Unknown(String),
}

/// Coarse grouping of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Transport,
  Application,
  RateLimit,
}

impl ErrorKind {
  /// Map a server error code to a kind. Matching ignores case and
  /// surrounding whitespace.
  pub fn from_code(code: &str) -> Self {
    match code.trim().to_ascii_uppercase().as_str() {
      "NOT_FOUND" => Self::NotFound,
      "DATABASE_ERROR" => Self::DatabaseError,
      "INVALID_DATE" => Self::InvalidDate,
      "INVALID_SOURCE" => Self::InvalidSource,
      "MISSING_QUERY" => Self::MissingQuery,
      "SEARCH_ERROR" => Self::SearchError,
      "SCRAPING_FAILED" => Self::ScrapingFailed,
      "INVALID_REQUEST" => Self::InvalidRequest,
      "INVALID_ID" => Self::InvalidId,
      "RATE_LIMITED" | "RATE_LIMIT_EXCEEDED" => Self::RateLimited,
      _ => Self::Unknown(code.trim().to_string()),
    }
  }

  /// Stable code string, matching the server's spelling where one exists.
  pub fn code(&self) -> String {
    match self {
      Self::NotFound => "NOT_FOUND".into(),
      Self::DatabaseError => "DATABASE_ERROR".into(),
      Self::InvalidDate => "INVALID_DATE".into(),
      Self::InvalidSource => "INVALID_SOURCE".into(),
      Self::MissingQuery => "MISSING_QUERY".into(),
      Self::SearchError => "SEARCH_ERROR".into(),
      Self::ScrapingFailed => "SCRAPING_FAILED".into(),
      Self::InvalidRequest => "INVALID_REQUEST".into(),
      Self::InvalidId => "INVALID_ID".into(),
      Self::Network => "NETWORK_ERROR".into(),
      Self::Timeout => "TIMEOUT".into(),
      Self::Http(status) => format!("HTTP_{}", status),
      Self::Decode => "DECODE_ERROR".into(),
      Self::RateLimited => "RATE_LIMITED".into(),
      Self::Unknown(code) => code.clone(),
    }
  }

  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Network | Self::Timeout | Self::Http(_) | Self::Decode => ErrorCategory::Transport,
      Self::RateLimited => ErrorCategory::RateLimit,
      _ => ErrorCategory::Application,
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.code())
  }
}

/// A failed request, in the one shape the rest of the app understands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NormalizedError {
  pub kind: ErrorKind,
  /// Raw message (server supplied, or synthesized on the client)
  pub message: String,
  pub request_id: Option<String>,
  /// HTTP status, if a response was received
  pub status: Option<u16>,
}

impl NormalizedError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      request_id: None,
      status: None,
    }
  }

  pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
    self.request_id = request_id.filter(|id| !id.is_empty());
    self
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = Some(status);
    self
  }

  pub fn network(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Network, message)
  }

  pub fn timeout(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Timeout, message)
  }

  /// Synthetic error for a non-2xx response whose body said nothing useful.
  pub fn http_status(status: u16) -> Self {
    Self::new(ErrorKind::Http(status), format!("HTTP {}", status)).with_status(status)
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Decode, message)
  }

  pub fn category(&self) -> ErrorCategory {
    self.kind.category()
  }

  /// Message suitable for display in the given locale.
  pub fn user_message(&self, locale: Locale) -> String {
    user_message(&self.kind, Some(&self.message), locale)
  }
}

/// Display language for user-facing messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
  #[default]
  En,
  Es,
}

const FALLBACK_EN: &str = "Something went wrong. Please try again.";
const FALLBACK_ES: &str = "Algo salió mal. Inténtalo de nuevo.";

/// Translate an error into a user-facing message.
///
/// Total: known kinds map to fixed strings, anything else falls back to the
/// server message and then to a generic string. Never returns an empty
/// string.
pub fn user_message(kind: &ErrorKind, server_message: Option<&str>, locale: Locale) -> String {
  if let Some(text) = known_message(kind, locale) {
    return text.to_string();
  }

  match server_message.map(str::trim) {
    Some(msg) if !msg.is_empty() => msg.to_string(),
    _ => match locale {
      Locale::En => FALLBACK_EN.to_string(),
      Locale::Es => FALLBACK_ES.to_string(),
    },
  }
}

fn known_message(kind: &ErrorKind, locale: Locale) -> Option<&'static str> {
  let (en, es) = match kind {
    ErrorKind::NotFound => (
      "The requested item could not be found.",
      "No se encontró el elemento solicitado.",
    ),
    ErrorKind::DatabaseError => (
      "The server could not read its database. Try again shortly.",
      "El servidor no pudo acceder a su base de datos. Inténtalo en breve.",
    ),
    ErrorKind::InvalidDate => (
      "The date or date range is not valid.",
      "La fecha o el rango de fechas no es válido.",
    ),
    ErrorKind::InvalidSource => ("Unknown news source.", "Fuente de noticias desconocida."),
    ErrorKind::MissingQuery => ("Enter a search term.", "Introduce un término de búsqueda."),
    ErrorKind::SearchError => (
      "Search failed. Try a different query.",
      "La búsqueda falló. Prueba con otra consulta.",
    ),
    ErrorKind::ScrapingFailed => (
      "The server failed to collect new articles.",
      "El servidor no pudo recopilar artículos nuevos.",
    ),
    ErrorKind::InvalidRequest => (
      "The server rejected the request.",
      "El servidor rechazó la solicitud.",
    ),
    ErrorKind::InvalidId => ("That identifier is not valid.", "Ese identificador no es válido."),
    ErrorKind::Network => (
      "Cannot reach the server. Check your connection.",
      "No se puede conectar con el servidor. Comprueba tu conexión.",
    ),
    ErrorKind::Timeout => (
      "The server took too long to respond.",
      "El servidor tardó demasiado en responder.",
    ),
    ErrorKind::RateLimited => (
      "Too many requests. Waiting for the quota to reset.",
      "Demasiadas solicitudes. Esperando a que se restablezca la cuota.",
    ),
    ErrorKind::Http(_) | ErrorKind::Decode | ErrorKind::Unknown(_) => return None,
  };

  Some(match locale {
    Locale::En => en,
    Locale::Es => es,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL_KNOWN: &[&str] = &[
    "NOT_FOUND",
    "DATABASE_ERROR",
    "INVALID_DATE",
    "INVALID_SOURCE",
    "MISSING_QUERY",
    "SEARCH_ERROR",
    "SCRAPING_FAILED",
    "INVALID_REQUEST",
    "INVALID_ID",
  ];

  #[test]
  fn test_from_code_known() {
    assert_eq!(ErrorKind::from_code("NOT_FOUND"), ErrorKind::NotFound);
    assert_eq!(ErrorKind::from_code(" invalid_id "), ErrorKind::InvalidId);
    assert_eq!(
      ErrorKind::from_code("SCRAPING_FAILED"),
      ErrorKind::ScrapingFailed
    );
  }

  #[test]
  fn test_from_code_unknown_keeps_code() {
    assert_eq!(
      ErrorKind::from_code("QUOTA_MELTDOWN"),
      ErrorKind::Unknown("QUOTA_MELTDOWN".to_string())
    );
  }

  #[test]
  fn test_codes_round_trip() {
    for code in ALL_KNOWN {
      assert_eq!(ErrorKind::from_code(code).code(), *code);
    }
  }

  #[test]
  fn test_every_known_code_has_a_message_in_every_locale() {
    for code in ALL_KNOWN {
      let kind = ErrorKind::from_code(code);
      for locale in [Locale::En, Locale::Es] {
        let msg = user_message(&kind, None, locale);
        assert!(!msg.is_empty(), "{} has no message", code);
        assert_ne!(msg, FALLBACK_EN);
        assert_ne!(msg, FALLBACK_ES);
      }
    }
  }

  #[test]
  fn test_unknown_code_uses_server_message() {
    let kind = ErrorKind::from_code("SOMETHING_NEW");
    assert_eq!(
      user_message(&kind, Some("  The feed is paused  "), Locale::En),
      "The feed is paused"
    );
  }

  #[test]
  fn test_unknown_code_without_message_uses_fallback() {
    let kind = ErrorKind::Unknown(String::new());
    assert_eq!(user_message(&kind, None, Locale::En), FALLBACK_EN);
    assert_eq!(user_message(&kind, Some("   "), Locale::Es), FALLBACK_ES);
  }

  #[test]
  fn test_http_error_shows_status_text() {
    let err = NormalizedError::http_status(502);
    assert_eq!(err.user_message(Locale::En), "HTTP 502");
    assert_eq!(err.status, Some(502));
    assert_eq!(err.category(), ErrorCategory::Transport);
  }

  #[test]
  fn test_categories() {
    assert_eq!(ErrorKind::Network.category(), ErrorCategory::Transport);
    assert_eq!(ErrorKind::Timeout.category(), ErrorCategory::Transport);
    assert_eq!(ErrorKind::NotFound.category(), ErrorCategory::Application);
    assert_eq!(ErrorKind::RateLimited.category(), ErrorCategory::RateLimit);
  }

  #[test]
  fn test_empty_request_id_is_dropped() {
    let err = NormalizedError::network("down").with_request_id(Some(String::new()));
    assert_eq!(err.request_id, None);
  }
}
