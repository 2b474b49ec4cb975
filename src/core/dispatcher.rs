//! Request Dispatcher
//!
//! Routes logical calls to the resource or authorization endpoint, attaches
//! audience and cookie-mode headers, and normalizes transport failures.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{normalize_http_error, IdentityError, ProtocolError};
use crate::types::IdentityConfig;

/// Target endpoint for a logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Resource API (signup, token, verify, recover).
    Api,
    /// Authorization API (captcha-guarded and federated flows).
    Auth,
}

/// Request body encoding.
#[derive(Clone, Debug)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Per-call request configuration.
///
/// Built fresh for every call and merged with the process-wide defaults at
/// dispatch time; shared client state is never mutated ahead of a request.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub endpoint: Endpoint,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<RequestBody>,
    /// Audience override; falls back to the configured default.
    pub audience: Option<String>,
    /// Cookie-mode hint for calls that create or refresh a session:
    /// `Some(true)` requests a durable cookie, `Some(false)` a transient one.
    pub remember: Option<bool>,
    /// Bearer token for authorized calls, as `(token_type, token)`.
    pub bearer: Option<(String, String)>,
}

impl RequestSpec {
    /// Create a GET spec.
    pub fn get(endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Get, path)
    }

    /// Create a POST spec.
    pub fn post(endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Post, path)
    }

    fn new(endpoint: Endpoint, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            endpoint,
            method,
            path: path.into(),
            body: None,
            audience: None,
            remember: None,
            bearer: None,
        }
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Attach a form-encoded body.
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Override the audience for this call.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Attach the cookie-mode remember hint.
    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = Some(remember);
        self
    }

    /// Attach a bearer token.
    pub fn bearer(mut self, token_type: impl Into<String>, token: impl Into<String>) -> Self {
        self.bearer = Some((token_type.into(), token.into()));
        self
    }
}

/// Routes each logical call to one of the two configured endpoints.
pub struct RequestDispatcher<T: HttpTransport> {
    config: IdentityConfig,
    transport: Arc<T>,
}

impl<T: HttpTransport> RequestDispatcher<T> {
    /// Create new dispatcher.
    pub fn new(config: IdentityConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// Client configuration.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Base URL for an endpoint.
    pub fn base_url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Api => &self.config.api_url,
            Endpoint::Auth => &self.config.auth_url,
        }
    }

    /// Dispatch a request and return the raw 2xx response.
    ///
    /// Non-2xx responses are normalized into `TransportError::Http` with a
    /// readable message taken from the provider payload.
    pub async fn dispatch(&self, spec: RequestSpec) -> Result<HttpResponse, IdentityError> {
        let url = format!(
            "{}{}",
            self.base_url(spec.endpoint).trim_end_matches('/'),
            spec.path
        );

        let mut headers = HashMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());

        let body = match &spec.body {
            Some(RequestBody::Json(value)) => {
                headers.insert("content-type".to_string(), "application/json".to_string());
                Some(serde_json::to_string(value).map_err(|e| {
                    IdentityError::Protocol(ProtocolError::InvalidJson {
                        message: e.to_string(),
                    })
                })?)
            }
            Some(RequestBody::Form(fields)) => {
                headers.insert(
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                );
                Some(encode_form(fields))
            }
            None => None,
        };

        if let Some(audience) = spec.audience.as_ref().or(self.config.audience.as_ref()) {
            headers.insert("x-jwt-aud".to_string(), audience.clone());
        }

        // The cookie hint must ride on the request that creates or refreshes
        // the session, so it is attached here rather than after the fact.
        if self.config.cookie_mode {
            if let Some(remember) = spec.remember {
                let value = if remember { "1" } else { "session" };
                headers.insert("x-use-cookie".to_string(), value.to_string());
            }
        }

        if let Some((token_type, token)) = &spec.bearer {
            headers.insert(
                "authorization".to_string(),
                format!("{} {}", token_type, token),
            );
        }

        debug!(method = spec.method.as_str(), url = %url, "dispatching request");

        let request = HttpRequest {
            method: spec.method,
            url,
            headers,
            body,
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(normalize_http_error(response.status, &response.body).into());
        }

        Ok(response)
    }

    /// Dispatch a request and deserialize the JSON response body.
    pub async fn dispatch_json<R: DeserializeOwned>(
        &self,
        spec: RequestSpec,
    ) -> Result<R, IdentityError> {
        let response = self.dispatch(spec).await?;
        serde_json::from_str(&response.body).map_err(|e| {
            IdentityError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }
}

fn encode_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::error::TransportError;

    fn test_config() -> IdentityConfig {
        IdentityConfig {
            api_url: "https://identity.example.com/".to_string(),
            auth_url: "https://auth.example.com".to_string(),
            audience: None,
            cookie_mode: false,
            ..Default::default()
        }
    }

    fn dispatcher_with(
        config: IdentityConfig,
    ) -> (RequestDispatcher<MockHttpTransport>, Arc<MockHttpTransport>) {
        let transport = Arc::new(MockHttpTransport::new());
        (
            RequestDispatcher::new(config, transport.clone()),
            transport,
        )
    }

    #[tokio::test]
    async fn test_routes_to_api_endpoint() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::get(Endpoint::Api, "/settings"))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://identity.example.com/settings");
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn test_routes_to_auth_endpoint() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::post(Endpoint::Auth, "/api/login"))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://auth.example.com/api/login");
    }

    #[tokio::test]
    async fn test_default_audience_header() {
        let mut config = test_config();
        config.audience = Some("internal".to_string());
        let (dispatcher, transport) = dispatcher_with(config);
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::get(Endpoint::Api, "/settings"))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.headers.get("x-jwt-aud").unwrap(), "internal");
    }

    #[tokio::test]
    async fn test_call_audience_overrides_default() {
        let mut config = test_config();
        config.audience = Some("internal".to_string());
        let (dispatcher, transport) = dispatcher_with(config);
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::get(Endpoint::Api, "/settings").audience("admin"))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.headers.get("x-jwt-aud").unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_cookie_header_matrix() {
        let mut config = test_config();
        config.cookie_mode = true;
        let (dispatcher, transport) = dispatcher_with(config);
        transport.queue_json_response(200, &serde_json::json!({}));
        transport.queue_json_response(200, &serde_json::json!({}));
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::post(Endpoint::Api, "/token").remember(true))
            .await
            .unwrap();
        dispatcher
            .dispatch(RequestSpec::post(Endpoint::Api, "/token").remember(false))
            .await
            .unwrap();
        dispatcher
            .dispatch(RequestSpec::get(Endpoint::Api, "/settings"))
            .await
            .unwrap();

        let requests = transport.get_requests();
        assert_eq!(requests[0].headers.get("x-use-cookie").unwrap(), "1");
        assert_eq!(requests[1].headers.get("x-use-cookie").unwrap(), "session");
        assert!(requests[2].headers.get("x-use-cookie").is_none());
    }

    #[tokio::test]
    async fn test_cookie_header_absent_when_mode_disabled() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::post(Endpoint::Api, "/token").remember(true))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert!(request.headers.get("x-use-cookie").is_none());
    }

    #[tokio::test]
    async fn test_form_body_encoding() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::post(Endpoint::Api, "/token").form(vec![
                ("grant_type".to_string(), "password".to_string()),
                ("username".to_string(), "a@b.com".to_string()),
            ]))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.headers.get("content-type").unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            request.body.unwrap(),
            "grant_type=password&username=a%40b.com"
        );
    }

    #[tokio::test]
    async fn test_json_body_content_type() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(
                RequestSpec::post(Endpoint::Api, "/recover")
                    .json(serde_json::json!({"email": "a@b.com"})),
            )
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.headers.get("content-type").unwrap(),
            "application/json"
        );
        assert!(request.body.unwrap().contains("a@b.com"));
    }

    #[tokio::test]
    async fn test_bearer_header() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({}));

        dispatcher
            .dispatch(RequestSpec::get(Endpoint::Api, "/user").bearer("Bearer", "AT1"))
            .await
            .unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.headers.get("authorization").unwrap(), "Bearer AT1");
    }

    #[tokio::test]
    async fn test_non_2xx_is_normalized() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(401, &serde_json::json!({"msg": "invalid credentials"}));

        let result = dispatcher
            .dispatch(RequestSpec::post(Endpoint::Api, "/token"))
            .await;

        match result {
            Err(IdentityError::Transport(TransportError::Http {
                status, message, ..
            })) => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid credentials");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_json_parses_body() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_json_response(200, &serde_json::json!({"external": {"github": true}}));

        let value: serde_json::Value = dispatcher
            .dispatch_json(RequestSpec::get(Endpoint::Api, "/settings"))
            .await
            .unwrap();
        assert_eq!(value["external"]["github"], true);
    }

    #[tokio::test]
    async fn test_dispatch_json_invalid_body() {
        let (dispatcher, transport) = dispatcher_with(test_config());
        transport.queue_response(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: "not json".to_string(),
        });

        let result: Result<serde_json::Value, _> = dispatcher
            .dispatch_json(RequestSpec::get(Endpoint::Api, "/settings"))
            .await;
        assert!(matches!(
            result,
            Err(IdentityError::Protocol(ProtocolError::InvalidJson { .. }))
        ));
    }
}
