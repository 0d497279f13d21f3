use thiserror::Error;

/// Top-level error type for the `zynr-api` crate.
///
/// Covers every failure mode of the device protocol: transport, the
/// hybrid-encryption channel, session lifecycle, and status aggregation.
/// The retry layer recovers `SessionInvalid` and `ServerFault` locally;
/// everything else is surfaced to the caller as a poll-cycle failure.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status other than 401/500.
    #[error("HTTP error status {status}")]
    Http { status: u16 },

    /// TLS configuration error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Session ─────────────────────────────────────────────────────
    /// The device returned 401 or the local session token is gone.
    /// Recoverable: clear the token and log in again.
    #[error("Session invalid: {message}")]
    SessionInvalid { message: String },

    /// The device returned 500. The session state on the device side is
    /// corrupted; recovery requires fresh cookies and a full re-init.
    #[error("Device server fault: {message}")]
    ServerFault { message: String },

    /// Login itself failed (credentials rejected, or no session token
    /// in the login response). Not retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Crypto channel ──────────────────────────────────────────────
    /// Envelope, key, padding, or post-decrypt JSON failure after the
    /// tolerant unpadding chain has been exhausted.
    #[error("Decryption failure: {message}")]
    Decryption { message: String },

    // ── Device ──────────────────────────────────────────────────────
    /// The device answered but reported a non-success result code on a
    /// critical call (login, reboot).
    #[error("Device rejected request: result={result}")]
    DeviceRejected { result: String },

    // ── Aggregation ─────────────────────────────────────────────────
    /// Zero sub-resources succeeded after the bounded retry loop.
    #[error("Status aggregation failed after {attempts} attempt(s)")]
    AggregationFailed { attempts: u32 },
}

impl Error {
    /// Returns `true` if this error means the session token is stale and
    /// a re-login may resolve it.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid { .. })
    }

    /// Returns `true` if this error means the device-side session state
    /// is corrupted and a cookie reset plus full re-init is required.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::ServerFault { .. })
    }

    /// Returns `true` for errors that are swallowed per sub-resource
    /// during an aggregation pass (the sub-resource is simply omitted).
    pub fn is_endpoint_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. })
    }

    pub(crate) fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption { message: message.into() }
    }

    pub(crate) fn session_invalid(message: impl Into<String>) -> Self {
        Self::SessionInvalid { message: message.into() }
    }
}
