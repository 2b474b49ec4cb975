//! Token Types
//!
//! Provider token-exchange response shapes.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{IdentityError, ProtocolError};

/// Token-exchange response from the provider.
///
/// Returned by the password grant, signup/recovery confirmation, invite
/// acceptance, federated callbacks, and the refresh exchange.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenExchangeResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token; absent for sessions that cannot silently renew.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Principal described by the token, passed through verbatim.
    #[serde(default)]
    pub user: Option<UserProfile>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Principal metadata returned by the provider. Opaque to the core.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// User-editable metadata blob.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    /// Application-managed metadata blob.
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Envelope wrapping captcha-guarded and federated responses.
///
/// These endpoints report failure in-band as `{success: false, message}`
/// rather than through HTTP status codes.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    // No `#[serde(default)]` here: that would bound `T: Default`, and a
    // missing `Option` field already deserializes as `None`.
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the envelope, treating `success: false` as an
    /// authentication failure carrying the provider's message.
    pub fn into_result(self) -> Result<T, IdentityError> {
        if !self.success {
            return Err(IdentityError::Authentication {
                message: self
                    .message
                    .unwrap_or_else(|| "authentication failed".to_string()),
            });
        }

        self.data.ok_or_else(|| {
            IdentityError::Protocol(ProtocolError::MissingField {
                field: "data".to_string(),
            })
        })
    }
}
