//! Configuration Builder
//!
//! Fluent builder for identity client configuration.

use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::IdentityError;
use crate::types::{IdentityConfig, DEFAULT_TIMEOUT_SECS};

/// Identity configuration builder.
#[derive(Default)]
pub struct IdentityConfigBuilder {
    api_url: Option<String>,
    auth_url: Option<String>,
    audience: Option<String>,
    cookie_mode: bool,
    timeout: Option<Duration>,
}

impl IdentityConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the authorization API base URL. Defaults to the API URL.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Set the default audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Enable cookie-mode session handling.
    pub fn cookie_mode(mut self, enable: bool) -> Self {
        self.cookie_mode = enable;
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the identity configuration.
    pub fn build(self) -> Result<IdentityConfig, IdentityError> {
        let api_url = self.api_url.ok_or_else(|| IdentityError::Configuration {
            message: "missing required field: api_url".to_string(),
        })?;

        let parsed = Url::parse(&api_url).map_err(|e| IdentityError::Configuration {
            message: format!("invalid api_url: {}", e),
        })?;
        if parsed.scheme() == "http" {
            warn!("identity API configured over plain HTTP; tokens require HTTPS in production");
        }

        let auth_url = match self.auth_url {
            Some(url) => {
                Url::parse(&url).map_err(|e| IdentityError::Configuration {
                    message: format!("invalid auth_url: {}", e),
                })?;
                url
            }
            None => api_url.clone(),
        };

        Ok(IdentityConfig {
            api_url,
            auth_url,
            audience: self.audience,
            cookie_mode: self.cookie_mode,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

/// Create a new identity configuration builder.
pub fn identity_config() -> IdentityConfigBuilder {
    IdentityConfigBuilder::new()
}
