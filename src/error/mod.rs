//! Identity Error Types
//!
//! Error hierarchy for the identity client, with normalization of provider
//! error payloads into readable messages.

use thiserror::Error;

/// Root error type for identity operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Session expired and cannot be renewed")]
    ExpiredSession,

    #[error("Token refresh failed: {message}")]
    Refresh { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl IdentityError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "IDENTITY_TRANSPORT",
            Self::Authentication { .. } => "IDENTITY_AUTH",
            Self::ExpiredSession => "IDENTITY_EXPIRED",
            Self::Refresh { .. } => "IDENTITY_REFRESH",
            Self::Storage(_) => "IDENTITY_STORAGE",
            Self::Protocol(_) => "IDENTITY_PROTOCOL",
            Self::Configuration { .. } => "IDENTITY_CONFIG",
        }
    }

    /// Check if error requires a fresh login.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::ExpiredSession | Self::Refresh { .. } | Self::Authentication { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(TransportError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: std::time::Duration },

    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },
}

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Corrupted session record: {message}")]
    CorruptedRecord { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Provider error payload shape.
///
/// Provider responses carry either a structured `msg` field or the
/// `error`/`error_description` pair from the token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProviderErrorPayload {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Normalize a non-2xx HTTP response into a transport error.
///
/// Message preference order: provider `msg`, then
/// `"{error}: {error_description}"`, then a generic status description.
pub fn normalize_http_error(status: u16, body: &str) -> TransportError {
    let payload: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let message = serde_json::from_str::<ProviderErrorPayload>(body)
        .ok()
        .and_then(|parsed| {
            if let Some(msg) = parsed.msg {
                Some(msg)
            } else if let Some(error) = parsed.error {
                match parsed.error_description {
                    Some(description) => Some(format!("{}: {}", error, description)),
                    None => Some(error),
                }
            } else {
                None
            }
        })
        .unwrap_or_else(|| format!("request failed with status {}", status));

    TransportError::Http {
        status,
        message,
        payload,
    }
}

/// Map a 4xx credential-exchange failure to an authentication failure.
///
/// Used at the call sites that exchange credentials for tokens; other
/// errors pass through unchanged.
pub fn into_auth_failure(error: IdentityError) -> IdentityError {
    match error {
        IdentityError::Transport(TransportError::Http {
            status, message, ..
        }) if (400..500).contains(&status) => IdentityError::Authentication { message },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefers_msg_field() {
        let error = normalize_http_error(401, r#"{"msg":"invalid credentials"}"#);
        match error {
            TransportError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_falls_back_to_error_description() {
        let error = normalize_http_error(
            400,
            r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
        );
        match error {
            TransportError::Http { message, .. } => {
                assert_eq!(message, "invalid_grant: refresh token revoked");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_error_without_description() {
        let error = normalize_http_error(400, r#"{"error":"invalid_grant"}"#);
        match error {
            TransportError::Http { message, .. } => assert_eq!(message, "invalid_grant"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_generic_fallback() {
        let error = normalize_http_error(502, "<html>bad gateway</html>");
        match error {
            TransportError::Http {
                status,
                message,
                payload,
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "request failed with status 502");
                assert!(payload.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_retains_payload() {
        let error = normalize_http_error(422, r#"{"msg":"bad email","code":422}"#);
        match error {
            TransportError::Http { payload, .. } => {
                assert_eq!(payload.unwrap()["code"], 422);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_into_auth_failure_maps_client_errors() {
        let error = IdentityError::Transport(normalize_http_error(
            401,
            r#"{"error":"invalid_grant","error_description":"No user found"}"#,
        ));
        match into_auth_failure(error) {
            IdentityError::Authentication { message } => {
                assert_eq!(message, "invalid_grant: No user found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_into_auth_failure_passes_server_errors() {
        let error = IdentityError::Transport(normalize_http_error(500, "{}"));
        assert!(matches!(
            into_auth_failure(error),
            IdentityError::Transport(TransportError::Http { status: 500, .. })
        ));
    }

    #[test]
    fn test_needs_reauth() {
        assert!(IdentityError::ExpiredSession.needs_reauth());
        assert!(IdentityError::Refresh {
            message: "revoked".to_string()
        }
        .needs_reauth());
        assert!(!IdentityError::Storage(StorageError::ReadFailed {
            message: "io".to_string()
        })
        .needs_reauth());
    }
}
