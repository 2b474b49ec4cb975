//! Session Lifecycle
//!
//! Turns raw token-exchange responses into durable, refreshable sessions.
//!
//! This module provides:
//!
//! - **Token Store**: persistence of the single session record over an
//!   external key-value store
//! - **Session**: refresh-aware access-token accessor with coalesced
//!   concurrent refreshes
//! - **Session Registry**: session construction, persistence decisions, and
//!   startup recovery

pub mod registry;
#[allow(clippy::module_inception)]
pub mod session;
pub mod store;

pub use registry::SessionRegistry;
pub use session::{Session, SessionPhase};
pub use store::{
    InMemoryStorageBackend, MockStorageBackend, StorageBackend, TokenStore, SESSION_STORAGE_KEY,
};
