//! Session Registry
//!
//! Entry point for the authentication-flow layer: turns raw token-exchange
//! responses into sessions, decides persistence, and recovers a previously
//! persisted session on startup.

use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::core::{HttpTransport, RequestDispatcher};
use crate::error::IdentityError;
use crate::session::{Session, StorageBackend, TokenStore};
use crate::types::{Envelope, TokenExchangeResponse};

/// Owns the single current session and its persistence.
///
/// One registry instance belongs to the application's composition root;
/// there is no ambient global session.
pub struct SessionRegistry<T: HttpTransport, B: StorageBackend> {
    dispatcher: Arc<RequestDispatcher<T>>,
    store: Arc<TokenStore<B>>,
    current: Mutex<Option<Arc<Session<T, B>>>>,
}

impl<T: HttpTransport, B: StorageBackend> SessionRegistry<T, B> {
    /// Create new registry.
    pub fn new(dispatcher: Arc<RequestDispatcher<T>>, store: Arc<TokenStore<B>>) -> Self {
        Self {
            dispatcher,
            store,
            current: Mutex::new(None),
        }
    }

    /// Build a session from a raw token-exchange response.
    ///
    /// Any previously persisted record is discarded first so stale
    /// credentials never coexist with the new ones. When `remember` is set
    /// the new session is written to the token store.
    pub async fn from_token_exchange(
        &self,
        response: TokenExchangeResponse,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        self.discard().await?;

        let audience = self.dispatcher.config().audience.clone();
        let session = Arc::new(Session::from_exchange(
            self.dispatcher.clone(),
            self.store.clone(),
            response,
            audience,
            remember,
        )?);

        if remember {
            self.store.save(&session.record()).await?;
        }

        debug!(persisted = remember, "session established");
        *self.current.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    /// Build a session from an enveloped `{success, data|message}` response.
    pub async fn from_envelope(
        &self,
        envelope: Envelope<TokenExchangeResponse>,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let response = envelope.into_result()?;
        self.from_token_exchange(response, remember).await
    }

    /// Recover a previously persisted session.
    ///
    /// Returns `Ok(None)` when no record exists; absence of a session is a
    /// normal state, not a failure.
    pub async fn recover(&self) -> Result<Option<Arc<Session<T, B>>>, IdentityError> {
        let Some(record) = self.store.load().await? else {
            return Ok(None);
        };

        let session = Arc::new(Session::from_record(
            self.dispatcher.clone(),
            self.store.clone(),
            record,
        ));
        debug!("session recovered from storage");
        *self.current.lock().unwrap() = Some(session.clone());
        Ok(Some(session))
    }

    /// Drop the in-memory session reference and clear the token store.
    pub async fn discard(&self) -> Result<(), IdentityError> {
        *self.current.lock().unwrap() = None;
        self.store.clear().await
    }

    /// The in-memory session reference, if one is held.
    pub fn current(&self) -> Option<Arc<Session<T, B>>> {
        self.current.lock().unwrap().clone()
    }
}
