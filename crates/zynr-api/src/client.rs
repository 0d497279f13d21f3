// Public client facade.
//
// One logical session per client instance. Session, crypto, and the
// last raw aggregation live behind mutexes so that a host which fails
// to serialize polls cannot corrupt the session state; callers should
// still run at most one poll at a time.

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ClientConfig;
use crate::crypto::PaddingStats;
use crate::error::Error;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use crate::status::{self, DEVICE_INFO_OID, RawStatus, StatusRecord};

/// Client for one Zyxel NR-series device.
///
/// Negotiates a fresh session on first use; sessions are never persisted
/// across process restarts.
pub struct ZyxelClient {
    session: Mutex<SessionManager>,
    last_status: Mutex<Option<RawStatus>>,
    retry: RetryPolicy,
}

impl ZyxelClient {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        Ok(Self {
            session: Mutex::new(SessionManager::new(config)?),
            last_status: Mutex::new(None),
            retry: RetryPolicy::new(config.max_attempts),
        })
    }

    /// Authenticate now instead of lazily on the first poll.
    pub async fn login(&self) -> Result<(), Error> {
        self.session.lock().await.login().await
    }

    /// Best-effort logout; the local session token is dropped regardless.
    pub async fn logout(&self) {
        self.session.lock().await.logout().await;
    }

    /// Run one full status poll and return the flattened snapshot.
    ///
    /// Queries every status sub-resource, tolerating individual
    /// failures; re-authenticates and retries on session faults up to
    /// the configured attempt bound. The raw pre-flatten aggregation is
    /// retained for [`last_status_data`](Self::last_status_data).
    pub async fn get_status(&self) -> Result<StatusRecord, Error> {
        let mut session = self.session.lock().await;
        let mut raw = self.retry.fetch_status(&mut session).await?;

        // Device identity fields must be present and first whenever the
        // device can produce them at all.
        if !raw.contains_key("device") {
            if let Ok(Some(device)) = session.get_object(DEVICE_INFO_OID).await {
                raw.insert("device".to_owned(), device);
            } else {
                debug!("device info unavailable, snapshot proceeds without it");
            }
        }
        let ordered = status::device_first(raw);
        drop(session);

        *self.last_status.lock().await = Some(ordered.clone());
        Ok(status::flatten(&ordered))
    }

    /// The most recent raw (pre-flatten) aggregation, for diagnostics
    /// export. `None` until the first successful poll.
    pub async fn last_status_data(&self) -> Option<RawStatus> {
        self.last_status.lock().await.clone()
    }

    /// Reboot the device. Fails with [`Error::DeviceRejected`] when the
    /// device answers with a non-success result code; a timeout surfaces
    /// as [`Error::Transport`].
    pub async fn reboot(&self) -> Result<(), Error> {
        self.session.lock().await.reboot().await
    }

    /// Probe which status OIDs this device answers. Diagnostic helper;
    /// per-OID failures are ignored.
    pub async fn probe_endpoints(&self) -> Result<Vec<&'static str>, Error> {
        let mut session = self.session.lock().await;
        status::probe(&mut session).await
    }

    /// Mark the current session untrustworthy so the next poll
    /// re-authenticates. Intended for an external scheduler that timed
    /// out a poll mid-flight and cannot tell how far it got.
    pub async fn mark_session_invalid(&self) {
        self.session.lock().await.clear_session();
    }

    /// Counters for the tolerant response-unpadding fallback chain.
    pub async fn padding_stats(&self) -> PaddingStats {
        self.session.lock().await.padding_stats()
    }

    /// Release transport resources. Connections close when the client is
    /// dropped; this exists for hosts that want an explicit teardown
    /// point (pair with [`logout`](Self::logout) to end the device-side
    /// session too).
    pub fn close(self) {
        drop(self);
    }
}
