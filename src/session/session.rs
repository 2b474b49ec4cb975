//! Session
//!
//! Represents one authenticated principal. Wraps the token material from a
//! token exchange and exposes a refresh-aware access-token accessor.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::core::{Endpoint, HttpTransport, RequestDispatcher, RequestSpec};
use crate::error::{IdentityError, ProtocolError};
use crate::session::{StorageBackend, TokenStore};
use crate::types::{
    PersistedSession, SessionRecord, TokenExchangeResponse, UserProfile, DEFAULT_EXPIRES_IN_SECS,
};

/// Session lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Token valid.
    Fresh,
    /// Past expiry, refresh not yet attempted.
    Expired,
    /// Refresh exchange in flight.
    Refreshing,
    /// Refresh failed or no refresh capability; terminal.
    Invalid,
}

struct SessionState {
    access_token: String,
    token_type: String,
    expires_at: DateTime<Utc>,
    refresh_token: Option<String>,
    user: Option<UserProfile>,
    persisted: bool,
    refreshing: bool,
    /// Set when the session becomes terminally invalid.
    invalid_reason: Option<String>,
    /// Incremented on every completed refresh exchange, success or failure.
    /// Waiters use it to adopt an outcome produced while they were queued.
    refresh_seq: u64,
}

impl SessionState {
    fn record(&self, audience: &Option<String>, from_storage: bool) -> SessionRecord {
        SessionRecord {
            session: PersistedSession {
                access_token: self.access_token.clone(),
                token_type: self.token_type.clone(),
                expires_at: self.expires_at,
                refresh_token: self.refresh_token.clone(),
                audience: audience.clone(),
            },
            from_storage,
        }
    }
}

/// One authenticated principal's current token material.
///
/// Mutated only by the refresh operation; destroyed by [`Session::logout`]
/// or superseded when a new login replaces it.
pub struct Session<T: HttpTransport, B: StorageBackend> {
    state: Mutex<SessionState>,
    /// Serializes refresh exchanges. Concurrent refresh callers queue here
    /// and adopt the single outcome instead of issuing duplicate exchanges,
    /// which could invalidate the refresh token server-side.
    refresh_lock: tokio::sync::Mutex<()>,
    audience: Option<String>,
    from_storage: bool,
    dispatcher: Arc<RequestDispatcher<T>>,
    store: Arc<TokenStore<B>>,
}

impl<T: HttpTransport, B: StorageBackend> std::fmt::Debug for Session<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase())
            .field("expires_at", &self.expires_at())
            .field("persisted", &self.persisted())
            .field("from_storage", &self.from_storage)
            .finish()
    }
}

impl<T: HttpTransport, B: StorageBackend> Session<T, B> {
    /// Build a session from a provider token-exchange response.
    ///
    /// Expiry is always derived here from the response's reported lifetime;
    /// a caller-supplied expiry is never trusted.
    pub(crate) fn from_exchange(
        dispatcher: Arc<RequestDispatcher<T>>,
        store: Arc<TokenStore<B>>,
        response: TokenExchangeResponse,
        audience: Option<String>,
        persisted: bool,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            state: Mutex::new(SessionState {
                access_token: response.access_token,
                token_type: response.token_type,
                expires_at: expiry_from(response.expires_in)?,
                refresh_token: response.refresh_token,
                user: response.user,
                persisted,
                refreshing: false,
                invalid_reason: None,
                refresh_seq: 0,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            audience,
            from_storage: false,
            dispatcher,
            store,
        })
    }

    /// Reconstruct a session from a persisted record.
    pub(crate) fn from_record(
        dispatcher: Arc<RequestDispatcher<T>>,
        store: Arc<TokenStore<B>>,
        record: SessionRecord,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                access_token: record.session.access_token,
                token_type: record.session.token_type,
                expires_at: record.session.expires_at,
                refresh_token: record.session.refresh_token,
                user: None,
                persisted: true,
                refreshing: false,
                invalid_reason: None,
                refresh_seq: 0,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            audience: record.session.audience,
            from_storage: true,
            dispatcher,
            store,
        }
    }

    // ========== Accessors ==========

    /// Current access token without refresh. Prefer
    /// [`Session::valid_access_token`] for authorized calls.
    pub fn access_token(&self) -> String {
        self.state.lock().unwrap().access_token.clone()
    }

    /// Token type (usually "Bearer").
    pub fn token_type(&self) -> String {
        self.state.lock().unwrap().token_type.clone()
    }

    /// Absolute expiry of the current access token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().expires_at
    }

    /// Audience scope, when set.
    pub fn audience(&self) -> Option<String> {
        self.audience.clone()
    }

    /// Whether this session is written to the token store.
    pub fn persisted(&self) -> bool {
        self.state.lock().unwrap().persisted
    }

    /// Whether this session was recovered from storage at startup.
    pub fn from_storage(&self) -> bool {
        self.from_storage
    }

    /// Principal metadata, when known.
    pub fn user(&self) -> Option<UserProfile> {
        self.state.lock().unwrap().user.clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        let state = self.state.lock().unwrap();
        effective_phase(&state, Utc::now())
    }

    pub(crate) fn record(&self) -> SessionRecord {
        let state = self.state.lock().unwrap();
        state.record(&self.audience, self.from_storage)
    }

    // ========== Token lifecycle ==========

    /// Return a currently-valid access token, transparently refreshing an
    /// expired one when a refresh token is available.
    ///
    /// Fails with [`IdentityError::ExpiredSession`] when expired without
    /// refresh capability; no network call is made in that case.
    pub async fn valid_access_token(&self) -> Result<String, IdentityError> {
        self.refresh(false).await
    }

    /// Refresh the access token.
    ///
    /// With `force == false` this is a no-op on a non-expired session and
    /// returns the existing token. A single exchange is attempted; failure
    /// transitions the session to `Invalid` and clears the stored record.
    pub async fn refresh(&self, force: bool) -> Result<String, IdentityError> {
        let (seq_before, persisted) = {
            let state = self.state.lock().unwrap();
            if !state.refreshing {
                if let Some(outcome) = fast_outcome(&state, force) {
                    return outcome;
                }
            }
            (state.refresh_seq, state.persisted)
        };

        let _guard = self.refresh_lock.lock().await;

        // A refresh may have completed while this caller was queued on the
        // lock; adopt its outcome rather than issuing a duplicate exchange.
        let refresh_token = {
            let mut state = self.state.lock().unwrap();
            let effective_force = force && state.refresh_seq == seq_before;
            if let Some(outcome) = fast_outcome(&state, effective_force) {
                return outcome;
            }
            let Some(token) = state.refresh_token.clone() else {
                return Err(IdentityError::ExpiredSession);
            };
            state.refreshing = true;
            token
        };

        let spec = self.apply_audience(
            RequestSpec::post(Endpoint::Api, "/token")
                .form(vec![
                    ("grant_type".to_string(), "refresh_token".to_string()),
                    ("refresh_token".to_string(), refresh_token),
                ])
                .remember(persisted),
        );

        let result = self
            .dispatcher
            .dispatch_json::<TokenExchangeResponse>(spec)
            .await
            .and_then(|response| Ok((expiry_from(response.expires_in)?, response)));

        match result {
            Ok((expires_at, response)) => {
                let (token, record) = {
                    let mut state = self.state.lock().unwrap();
                    state.refresh_seq += 1;
                    state.refreshing = false;
                    state.access_token = response.access_token;
                    state.token_type = response.token_type;
                    state.expires_at = expires_at;
                    // Providers may rotate the refresh token; keep the prior
                    // one when the response omits it.
                    if let Some(rotated) = response.refresh_token {
                        state.refresh_token = Some(rotated);
                    }
                    if let Some(user) = response.user {
                        state.user = Some(user);
                    }
                    let record = state
                        .persisted
                        .then(|| state.record(&self.audience, self.from_storage));
                    (state.access_token.clone(), record)
                };

                if let Some(record) = record {
                    self.store.save(&record).await?;
                }

                debug!("access token refreshed");
                Ok(token)
            }
            Err(error) => {
                let message = error.to_string();
                {
                    let mut state = self.state.lock().unwrap();
                    state.refresh_seq += 1;
                    state.refreshing = false;
                    state.invalid_reason = Some(message.clone());
                }
                warn!(error = %message, "token refresh failed; session is now invalid");
                if let Err(clear_error) = self.store.clear().await {
                    warn!(error = %clear_error, "failed to clear stored session record");
                }
                Err(IdentityError::Refresh { message })
            }
        }
    }

    /// Log out.
    ///
    /// Issues a best-effort server-side revocation and always clears local
    /// state and the stored record, regardless of that request's outcome.
    pub async fn logout(&self) -> Result<(), IdentityError> {
        let (token_type, token) = {
            let state = self.state.lock().unwrap();
            (state.token_type.clone(), state.access_token.clone())
        };

        let spec =
            self.apply_audience(RequestSpec::post(Endpoint::Api, "/logout").bearer(token_type, token));
        if let Err(error) = self.dispatcher.dispatch(spec).await {
            warn!(error = %error, "server-side logout failed; clearing local session anyway");
        }

        {
            let mut state = self.state.lock().unwrap();
            state.invalid_reason = Some("session was logged out".to_string());
            state.refresh_token = None;
        }
        self.store.clear().await
    }

    /// Mark the session durable and write it to the token store now.
    pub async fn persist(&self) -> Result<(), IdentityError> {
        let record = {
            let mut state = self.state.lock().unwrap();
            state.persisted = true;
            state.record(&self.audience, self.from_storage)
        };
        self.store.save(&record).await
    }

    /// Mark the session ephemeral and remove it from the token store.
    pub async fn forget(&self) -> Result<(), IdentityError> {
        self.state.lock().unwrap().persisted = false;
        self.store.clear().await
    }

    /// Fetch the principal's metadata from the provider and install it on
    /// the session.
    pub async fn fetch_user(&self) -> Result<UserProfile, IdentityError> {
        let token = self.valid_access_token().await?;
        let token_type = self.token_type();

        let spec =
            self.apply_audience(RequestSpec::get(Endpoint::Api, "/user").bearer(token_type, token));
        let profile: UserProfile = self.dispatcher.dispatch_json(spec).await?;

        self.state.lock().unwrap().user = Some(profile.clone());
        Ok(profile)
    }

    fn apply_audience(&self, spec: RequestSpec) -> RequestSpec {
        match &self.audience {
            Some(audience) => spec.audience(audience.clone()),
            None => spec,
        }
    }
}

/// Absolute expiry for a provider-reported lifetime.
///
/// The lifetime is untrusted input; values that overflow the date range are
/// rejected rather than allowed to panic in date arithmetic.
fn expiry_from(expires_in: Option<u64>) -> Result<DateTime<Utc>, IdentityError> {
    let secs = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            IdentityError::Protocol(ProtocolError::InvalidField {
                field: "expires_in".to_string(),
                message: format!("lifetime of {} seconds is out of range", secs),
            })
        })
}

fn effective_phase(state: &SessionState, now: DateTime<Utc>) -> SessionPhase {
    if state.invalid_reason.is_some() {
        return SessionPhase::Invalid;
    }
    if state.refreshing {
        return SessionPhase::Refreshing;
    }
    if now < state.expires_at {
        return SessionPhase::Fresh;
    }
    if state.refresh_token.is_none() {
        // Expired without refresh capability is terminal.
        return SessionPhase::Invalid;
    }
    SessionPhase::Expired
}

/// Resolve a token request without touching the network, when possible.
fn fast_outcome(state: &SessionState, force: bool) -> Option<Result<String, IdentityError>> {
    if let Some(reason) = &state.invalid_reason {
        return Some(Err(IdentityError::Refresh {
            message: reason.clone(),
        }));
    }

    let expired = Utc::now() >= state.expires_at;
    if expired && state.refresh_token.is_none() {
        return Some(Err(IdentityError::ExpiredSession));
    }
    if !expired && !force {
        return Some(Ok(state.access_token.clone()));
    }
    None
}
