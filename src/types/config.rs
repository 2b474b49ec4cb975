//! Configuration Types
//!
//! Identity client configuration types.

use std::time::Duration;

/// Identity client configuration.
#[derive(Clone, Debug)]
pub struct IdentityConfig {
    /// Resource API base URL (signup, token, verify, recover).
    pub api_url: String,
    /// Authorization API base URL (captcha-guarded and federated flows).
    pub auth_url: String,
    /// Default audience attached to every request; overridable per call.
    pub audience: Option<String>,
    /// When enabled, session-creating requests carry the `X-Use-Cookie`
    /// header so the server sets a durable or transient cookie.
    pub cookie_mode: bool,
    /// HTTP timeout.
    pub timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            auth_url: String::new(),
            audience: None,
            cookie_mode: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Lifetime assumed when the provider omits `expires_in`, in seconds.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IdentityConfig::default();
        assert!(config.api_url.is_empty());
        assert!(config.audience.is_none());
        assert!(!config.cookie_mode);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
