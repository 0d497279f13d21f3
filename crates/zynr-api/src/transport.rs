// HTTP transport for the device management interface.
//
// Wraps `reqwest::Client` with the header conventions the firmware's web
// UI uses, TLS-trust relaxation for self-signed device certificates, and
// cookie-jar session affinity. The 401/500 status mapping lives here so
// every caller sees the same error taxonomy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate. NR-series devices ship self-signed
    /// certificates, so this is the default.
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
        }
    }
}

// The firmware sniffs these headers; requests without the XHR marker and
// a browser User-Agent get redirected to the login page instead of JSON.
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:142.0) Gecko/20100101 Firefox/142.0";

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-GB,en;q=0.5"),
    );
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config with a fresh cookie jar.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(default_headers())
            .cookie_provider(Arc::new(Jar::default()));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder.build().map_err(Error::Transport)
    }
}

/// Thin HTTP client bound to a device base URL.
///
/// Session affinity is cookie-based: the device sets a baseline cookie on
/// the first unauthenticated request and expects it back on every call.
/// [`Transport::reset`] discards the jar by rebuilding the inner client,
/// which is the recovery step for corrupted device-side session state.
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    config: TransportConfig,
}

impl Transport {
    pub fn new(base_url: Url, config: TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self { http, base_url, config })
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Drop all cookies by rebuilding the inner client with a fresh jar.
    pub fn reset(&mut self) -> Result<(), Error> {
        debug!("resetting transport, dropping cookie jar");
        self.http = self.config.build_client()?;
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    /// GET a path, returning the raw body text.
    pub async fn get_text(&self, path: &str) -> Result<String, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let resp = check_status(resp, path)?;
        resp.text().await.map_err(Error::Transport)
    }

    /// GET a path, parsing the body as JSON.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let resp = check_status(resp, path)?;
        resp.json().await.map_err(Error::Transport)
    }

    /// POST a form-encoded body (the firmware expects JSON text under an
    /// `application/x-www-form-urlencoded` content type), parsing the
    /// response as JSON.
    pub async fn post_form(&self, path: &str, body: String) -> Result<serde_json::Value, Error> {
        let url = self.url(path)?;
        debug!("POST {}", url);

        let origin = self.base_url.as_str().trim_end_matches('/').to_owned();
        let resp = self
            .http
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=UTF-8",
            )
            .header(reqwest::header::ORIGIN, &origin)
            .header(reqwest::header::REFERER, format!("{origin}/login"))
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let resp = check_status(resp, path)?;
        resp.json().await.map_err(Error::Transport)
    }
}

/// Map HTTP failure statuses onto the session error taxonomy.
fn check_status(resp: reqwest::Response, path: &str) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::session_invalid(format!("401 from {path}")));
    }
    if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
        return Err(Error::ServerFault {
            message: format!("500 from {path}"),
        });
    }
    if !status.is_success() {
        return Err(Error::Http { status: status.as_u16() });
    }
    Ok(resp)
}
