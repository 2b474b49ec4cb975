//! Identity Integration Module
//!
//! Client-side session and authentication-flow management for a hosted
//! identity provider.
//!
//! # Features
//!
//! - Password, captcha-guarded, and federated login flows
//! - Signup, email confirmation, invite acceptance, and password recovery
//! - Refresh-aware sessions with coalesced concurrent token refreshes
//! - Session persistence and startup recovery over a pluggable storage
//!   backend
//! - Dual-endpoint request dispatch with audience and cookie-mode headers
//!
//! # Example
//!
//! ```rust,ignore
//! use identity_integration::{identity_config, IdentityClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build configuration using the fluent builder
//!     let config = identity_config()
//!         .api_url("https://identity.example.com")
//!         .auth_url("https://auth.example.com")
//!         .audience("internal")
//!         .build()?;
//!
//!     // Create the identity client
//!     let client = IdentityClient::new(config)?;
//!
//!     // Log in and remember the session across restarts
//!     let session = client.login("a@b.com", "secret", true).await?;
//!
//!     // Always yields a usable token, refreshing if expired
//!     let token = session.valid_access_token().await?;
//!     println!("Bearer {}", token);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The module is organized into several sub-modules:
//!
//! - `types`: configuration, token-exchange payloads, and the persisted
//!   session record
//! - `error`: error hierarchy with HTTP error normalization
//! - `core`: core infrastructure (HTTP transport, request dispatcher)
//! - `session`: session lifecycle (token store, session, registry)
//! - `builders`: fluent builders for configuration
//! - `client`: high-level identity client combining all functionality

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod session;
pub mod types;

// Re-export main client
pub use client::{IdentityClient, VerificationChannel, VerificationType};

// Re-export builders
pub use builders::{identity_config, IdentityConfigBuilder};

// Re-export errors
pub use error::{
    into_auth_failure, normalize_http_error, IdentityError, IdentityResult, ProtocolError,
    ProviderErrorPayload, StorageError, TransportError,
};

// Re-export types
pub use types::{
    Envelope, IdentityConfig, PersistedSession, SessionRecord, TokenExchangeResponse,
    UserProfile, DEFAULT_EXPIRES_IN_SECS, DEFAULT_TIMEOUT_SECS,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Dispatch
    Endpoint, RequestBody, RequestDispatcher, RequestSpec,
};

// Re-export session lifecycle
pub use session::{
    // Storage
    InMemoryStorageBackend, MockStorageBackend, StorageBackend, TokenStore, SESSION_STORAGE_KEY,
    // Session
    Session, SessionPhase, SessionRegistry,
};
