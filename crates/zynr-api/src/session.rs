// Session lifecycle against the device.
//
// Owns the session token, the crypto channel, and the transport. All
// token mutation funnels through here: login issues it, logout and 401
// discovery clear it, `reset_hard` additionally drops cookies and forces
// the next login through a full re-initialization.

use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::crypto::{CryptoChannel, PaddingStats};
use crate::error::Error;
use crate::transport::Transport;

/// Result code the firmware uses for success on DAL and command calls.
pub(crate) const RESULT_SUCCESS: &str = "ZCFG_SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No baseline cookie, no crypto state.
    Uninitialized,
    /// Handshake done, crypto state fresh, not logged in.
    Initialized,
    /// Session token held.
    Authenticated,
}

/// Manages the login/logout/initialize lifecycle and the session token.
pub struct SessionManager {
    transport: Transport,
    crypto: CryptoChannel,
    username: String,
    password_b64: secrecy::SecretString,
    session_key: Option<String>,
    phase: Phase,
}

impl SessionManager {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let transport = Transport::new(config.base_url.clone(), config.transport())?;
        Ok(Self {
            transport,
            crypto: CryptoChannel::new(),
            username: config.username.clone(),
            password_b64: config.password_b64.clone(),
            session_key: None,
            phase: Phase::Uninitialized,
        })
    }

    pub fn padding_stats(&self) -> PaddingStats {
        self.crypto.padding_stats()
    }

    /// Unauthenticated handshake: establish the baseline session cookie,
    /// then fetch the device's RSA public key. A failed or empty key
    /// fetch means the firmware runs unencrypted; that is not an error.
    /// Always regenerates the symmetric crypto material.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        self.transport.get_text("/GetInfoNoLogin").await?;

        let rsa_key = match self.transport.get_json("/getRSAPublickKey").await {
            Ok(value) => match value.get("RSAPublicKey").and_then(Value::as_str) {
                Some("None") | Some("") | None => None,
                Some(pem) => Some(pem.to_owned()),
            },
            Err(e) => {
                debug!("RSA key fetch failed, assuming unencrypted firmware: {e}");
                None
            }
        };

        self.crypto.reset(rsa_key.as_deref())?;
        self.phase = Phase::Initialized;
        debug!(
            encryption_required = self.crypto.encryption_required(),
            "session initialized"
        );
        Ok(())
    }

    /// Authenticate. Initializes first if needed. Failure to extract a
    /// session token from the response is a hard error.
    pub async fn login(&mut self) -> Result<(), Error> {
        if self.phase == Phase::Uninitialized {
            self.initialize().await?;
        }

        let payload = json!({
            "Input_Account": self.username,
            "Input_Passwd": self.password_b64.expose_secret(),
            "currLang": "en",
            "RememberPassword": 0,
        });
        let body = self.crypto.encode(&payload)?;

        let response = self.transport.post_form("/UserLogin", body).await?;
        let response = self.crypto.decode(response)?;

        let session_key = response
            .get("sessionkey")
            .and_then(session_key_string)
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no sessionkey".into(),
            })?;

        debug!("login successful");
        self.session_key = Some(session_key);
        self.phase = Phase::Authenticated;
        Ok(())
    }

    /// Best-effort logout. The local token is invalidated regardless of
    /// what the device answers.
    pub async fn logout(&mut self) {
        if let Some(key) = self.session_key.take() {
            let path = format!("/cgi-bin/UserLogout?sessionkey={key}");
            if let Err(e) = self.transport.get_text(&path).await {
                debug!("logout request failed (ignored): {e}");
            }
        }
        if self.phase == Phase::Authenticated {
            self.phase = Phase::Initialized;
        }
    }

    /// Forget the session token without touching cookies or crypto
    /// state. The next authenticated call will log in again.
    pub fn clear_session(&mut self) {
        self.session_key = None;
        if self.phase == Phase::Authenticated {
            self.phase = Phase::Initialized;
        }
    }

    /// Full reset: drop cookies, forget the token, and force the next
    /// login through `initialize()`. Recovery path for a 500.
    pub fn reset_hard(&mut self) -> Result<(), Error> {
        warn!("hard session reset");
        self.transport.reset()?;
        self.session_key = None;
        self.phase = Phase::Uninitialized;
        Ok(())
    }

    /// Lazily log in, returning the current session token.
    pub(crate) async fn ensure_session(&mut self) -> Result<String, Error> {
        if self.session_key.is_none() {
            self.login().await?;
        }
        self.session_key
            .clone()
            .ok_or_else(|| Error::session_invalid("no session token after login"))
    }

    /// Query one DAL sub-resource. Returns `Ok(None)` when the device
    /// reports no data for it (absent `Object`, or a non-success result),
    /// which is not an error. A 401 clears the local token before
    /// propagating.
    pub async fn get_object(&mut self, oid: &str) -> Result<Option<Value>, Error> {
        let key = self.ensure_session().await?;
        let path = format!("/cgi-bin/DAL?oid={oid}&sessionkey={key}");

        let response = match self.transport.get_json(&path).await {
            Ok(value) => value,
            Err(e) => {
                if e.is_session_invalid() {
                    self.clear_session();
                }
                return Err(e);
            }
        };
        let response = self.crypto.decode(response)?;

        let success = response
            .get("result")
            .and_then(Value::as_str)
            .is_some_and(|r| r == RESULT_SUCCESS);
        if !success {
            debug!(oid, "DAL query returned non-success result");
            return Ok(None);
        }

        let object = response
            .get("Object")
            .and_then(Value::as_array)
            .and_then(|objects| objects.first())
            .cloned();
        Ok(object)
    }

    /// Reboot the device. A non-success result code is a hard failure,
    /// distinct from a transport error.
    pub async fn reboot(&mut self) -> Result<(), Error> {
        let key = self.ensure_session().await?;
        let path = format!("/cgi-bin/Reboot?sessionkey={key}");

        let response = self.transport.post_form(&path, String::new()).await?;
        let result = response
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("<missing>");
        if result != RESULT_SUCCESS {
            return Err(Error::DeviceRejected { result: result.to_owned() });
        }
        debug!("reboot accepted");
        Ok(())
    }
}

/// The firmware has returned `sessionkey` both as a JSON string and as a
/// bare number, depending on version.
fn session_key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
