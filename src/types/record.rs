//! Persisted Session Record
//!
//! Wire layout of the single session record kept in the token store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized session record as written to the storage backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Token material for the persisted session.
    pub session: PersistedSession,
    /// Whether the session was reconstructed from storage at startup.
    /// Callers apply different cookie policy to recovered sessions.
    #[serde(rename = "fromStorage")]
    pub from_storage: bool,
}

/// Token material inside a [`SessionRecord`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub access_token: String,
    pub token_type: String,
    /// Absolute expiry, computed at session construction. Never a
    /// client-supplied value.
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}
