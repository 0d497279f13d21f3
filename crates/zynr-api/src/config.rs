// Client configuration.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;
use url::Url;

use crate::transport::{TlsMode, TransportConfig};

/// Configuration for a [`ZyxelClient`](crate::ZyxelClient).
///
/// The password is held only in the base64 form the login endpoint
/// expects; the plaintext is not retained after construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub username: String,
    pub(crate) password_b64: SecretString,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Attempt bound for one status poll (aggregation pass + recovery).
    pub max_attempts: u32,
}

impl ClientConfig {
    /// Create a config for the device at `base_url` with the given
    /// credentials. The password is base64-encoded immediately.
    pub fn new(base_url: Url, username: impl Into<String>, password: &str) -> Self {
        Self {
            base_url,
            username: username.into(),
            password_b64: SecretString::from(BASE64.encode(password.as_bytes())),
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
            max_attempts: 2,
        }
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}
