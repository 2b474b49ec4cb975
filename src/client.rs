//! Identity Client
//!
//! High-level client for the hosted identity provider. Every method here is
//! a thin request builder; session-creating flows funnel into the
//! [`SessionRegistry`].

use std::sync::Arc;

use crate::core::{
    Endpoint, HttpTransport, ReqwestHttpTransport, RequestDispatcher, RequestSpec,
};
use crate::error::{into_auth_failure, IdentityError};
use crate::session::{InMemoryStorageBackend, Session, SessionRegistry, StorageBackend, TokenStore};
use crate::types::{Envelope, IdentityConfig, TokenExchangeResponse};

/// Verification flavor accepted by the `/verify` endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationType {
    /// Signup confirmation (also used for invite acceptance).
    Signup,
    /// Password recovery confirmation.
    Recovery,
}

impl VerificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Recovery => "recovery",
        }
    }
}

/// Delivery channel for verification-gated logins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationChannel {
    Sms,
    Email,
}

impl VerificationChannel {
    fn path(&self) -> &'static str {
        match self {
            Self::Sms => "/api/loginForSmsVerification",
            Self::Email => "/api/loginForEmailVerification",
        }
    }
}

/// Identity client for authentication flows and session management.
pub struct IdentityClient<
    T: HttpTransport = ReqwestHttpTransport,
    B: StorageBackend = InMemoryStorageBackend,
> {
    dispatcher: Arc<RequestDispatcher<T>>,
    registry: SessionRegistry<T, B>,
}

impl IdentityClient<ReqwestHttpTransport, InMemoryStorageBackend> {
    /// Create a new client with default implementations.
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        let transport = ReqwestHttpTransport::with_timeout(config.timeout)?;
        Ok(Self::with_components(
            config,
            transport,
            InMemoryStorageBackend::new(),
        ))
    }
}

impl<T: HttpTransport, B: StorageBackend> IdentityClient<T, B> {
    /// Create a client with custom transport and storage backend.
    pub fn with_components(config: IdentityConfig, transport: T, backend: B) -> Self {
        let dispatcher = Arc::new(RequestDispatcher::new(config, Arc::new(transport)));
        let store = Arc::new(TokenStore::new(Arc::new(backend)));
        let registry = SessionRegistry::new(dispatcher.clone(), store);
        Self {
            dispatcher,
            registry,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &IdentityConfig {
        self.dispatcher.config()
    }

    /// The session registry owned by this client.
    pub fn registry(&self) -> &SessionRegistry<T, B> {
        &self.registry
    }

    // ========== Provider metadata ==========

    /// Fetch provider settings (enabled external providers, signup policy).
    pub async fn settings(&self) -> Result<serde_json::Value, IdentityError> {
        self.dispatcher
            .dispatch_json(RequestSpec::get(Endpoint::Api, "/settings"))
            .await
    }

    // ========== Signup & login ==========

    /// Register a new user. Depending on provider policy the account may
    /// require email confirmation before login succeeds.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        data: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Api, "/signup").json(serde_json::json!({
            "email": email,
            "password": password,
            "data": data,
        }));
        self.dispatcher.dispatch_json(spec).await
    }

    /// Log in with the password grant.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Api, "/token")
            .form(vec![
                ("grant_type".to_string(), "password".to_string()),
                ("username".to_string(), email.to_string()),
                ("password".to_string(), password.to_string()),
            ])
            .remember(remember);

        let response: TokenExchangeResponse = self
            .dispatcher
            .dispatch_json(spec)
            .await
            .map_err(into_auth_failure)?;
        self.registry.from_token_exchange(response, remember).await
    }

    /// Log in through the captcha-guarded endpoint.
    pub async fn login_with_captcha(
        &self,
        email: &str,
        password: &str,
        captcha_token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/login")
            .json(serde_json::json!({
                "grant_type": "password",
                "username": email,
                "password": password,
                "captcha_token": captcha_token,
            }))
            .remember(remember);

        let envelope: Envelope<TokenExchangeResponse> =
            self.dispatcher.dispatch_json(spec).await?;
        self.registry.from_envelope(envelope, remember).await
    }

    /// Captcha-guarded login that defers session establishment until an
    /// out-of-band verification completes.
    ///
    /// Returns the raw token-exchange payload; pass it to
    /// [`IdentityClient::create_session_from`] once the user is verified.
    pub async fn login_with_captcha_for_verification(
        &self,
        email: &str,
        password: &str,
        captcha_token: &str,
        channel: VerificationChannel,
        remember: bool,
    ) -> Result<TokenExchangeResponse, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, channel.path())
            .json(serde_json::json!({
                "grant_type": "password",
                "username": email,
                "password": password,
                "captcha_token": captcha_token,
            }))
            .remember(remember);

        let envelope: Envelope<TokenExchangeResponse> =
            self.dispatcher.dispatch_json(spec).await?;
        envelope.into_result()
    }

    /// Log in with a federated provider token.
    pub async fn login_federated(
        &self,
        email: &str,
        provider_token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/azurelogin")
            .json(serde_json::json!({
                "email": email,
                "azure_token": provider_token,
            }))
            .remember(remember);

        let envelope: Envelope<TokenExchangeResponse> =
            self.dispatcher.dispatch_json(spec).await?;
        self.registry.from_envelope(envelope, remember).await
    }

    /// Log in with a federated provider token through the
    /// client-credentials variant endpoint.
    pub async fn login_federated_cc(
        &self,
        email: &str,
        provider_token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/azurelogincc")
            .json(serde_json::json!({
                "email": email,
                "azure_token": provider_token,
            }))
            .remember(remember);

        let envelope: Envelope<TokenExchangeResponse> =
            self.dispatcher.dispatch_json(spec).await?;
        self.registry.from_envelope(envelope, remember).await
    }

    /// Log in with a Mobiliz device token issued by a partner server.
    pub async fn login_mobiliz(
        &self,
        token: &str,
        server_id: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/loginMB")
            .json(serde_json::json!({
                "grant_type": "password",
                "server_id": server_id,
                "token": token,
            }))
            .remember(remember);

        let envelope: Envelope<TokenExchangeResponse> =
            self.dispatcher.dispatch_json(spec).await?;
        self.registry.from_envelope(envelope, remember).await
    }

    /// Browser URL for an external (social) login redirect.
    pub fn login_external_url(&self, provider: &str) -> String {
        format!(
            "{}/authorize?provider={}",
            self.config().api_url.trim_end_matches('/'),
            urlencoding::encode(provider)
        )
    }

    // ========== Confirmation & recovery ==========

    /// Confirm a signup with the emailed token.
    pub async fn confirm(
        &self,
        token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        self.verify(VerificationType::Signup, token, remember).await
    }

    /// Request a password recovery email.
    pub async fn request_password_recovery(
        &self,
        email: &str,
    ) -> Result<serde_json::Value, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Api, "/recover")
            .json(serde_json::json!({"email": email}));
        self.dispatcher.dispatch_json(spec).await
    }

    /// Request a password recovery email through the captcha-guarded
    /// endpoint.
    pub async fn request_password_recovery_with_captcha(
        &self,
        email: &str,
        captcha_token: &str,
    ) -> Result<serde_json::Value, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/recover").json(serde_json::json!({
            "email": email,
            "captcha_token": captcha_token,
        }));
        self.dispatcher.dispatch_json(spec).await
    }

    /// Complete a password recovery with the emailed token, yielding a
    /// logged-in session.
    pub async fn recover_session(
        &self,
        token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        self.verify(VerificationType::Recovery, token, remember)
            .await
    }

    /// Set a new password during recovery without creating a session.
    pub async fn reset_password_on_recovery(
        &self,
        recovery_token: &str,
        captcha_token: &str,
        password: &str,
    ) -> Result<serde_json::Value, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Auth, "/api/resetPasswordOnRecovery").json(
            serde_json::json!({
                "recoveryToken": recovery_token,
                "recaptchaToken": captcha_token,
                "password": password,
            }),
        );
        self.dispatcher.dispatch_json(spec).await
    }

    // ========== Invites ==========

    /// Accept an invitation, setting the initial password.
    pub async fn accept_invite(
        &self,
        token: &str,
        password: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Api, "/verify")
            .json(serde_json::json!({
                "token": token,
                "password": password,
                "type": VerificationType::Signup.as_str(),
            }))
            .remember(remember);

        let response: TokenExchangeResponse = self
            .dispatcher
            .dispatch_json(spec)
            .await
            .map_err(into_auth_failure)?;
        self.registry.from_token_exchange(response, remember).await
    }

    /// Browser URL for accepting an invitation through an external provider.
    pub fn accept_invite_external_url(&self, provider: &str, token: &str) -> String {
        format!(
            "{}/authorize?provider={}&invite_token={}",
            self.config().api_url.trim_end_matches('/'),
            urlencoding::encode(provider),
            urlencoding::encode(token)
        )
    }

    // ========== Session management ==========

    /// Exchange a confirmation token of the given type for a session.
    pub async fn verify(
        &self,
        kind: VerificationType,
        token: &str,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        let spec = RequestSpec::post(Endpoint::Api, "/verify")
            .json(serde_json::json!({
                "token": token,
                "type": kind.as_str(),
            }))
            .remember(remember);

        let response: TokenExchangeResponse = self
            .dispatcher
            .dispatch_json(spec)
            .await
            .map_err(into_auth_failure)?;
        self.registry.from_token_exchange(response, remember).await
    }

    /// Establish a session from a token-exchange payload obtained earlier,
    /// e.g. after a deferred verification flow.
    pub async fn create_session_from(
        &self,
        response: TokenExchangeResponse,
        remember: bool,
    ) -> Result<Arc<Session<T, B>>, IdentityError> {
        self.registry.from_token_exchange(response, remember).await
    }

    /// Recover the persisted session from storage, if one exists.
    pub async fn current_session(
        &self,
    ) -> Result<Option<Arc<Session<T, B>>>, IdentityError> {
        self.registry.recover().await
    }
}
