// Retry orchestration for a status poll.
//
// One poll is a bounded loop over whole aggregation passes. Session
// faults trigger re-authentication (and, for a server fault, a full
// cookie reset plus re-initialization) before the next pass; anything
// else is fatal for the cycle and surfaces immediately.

use tracing::{debug, warn};

use crate::error::Error;
use crate::session::SessionManager;
use crate::status::{self, RawStatus};

/// Bounded retry loop around the aggregation pass.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    /// Run aggregation passes until one yields data or the attempt bound
    /// is exhausted.
    ///
    /// - Session invalid: clear the stale token, log in again, and retry
    ///   the whole pass. The stale token is never reused.
    /// - Server fault: the device-side session state is corrupted; drop
    ///   cookies, re-initialize, log in, and retry.
    /// - A pass where zero sub-resources succeeded consumes an attempt
    ///   and retries as-is.
    /// - Any other error is fatal for this poll cycle.
    pub async fn fetch_status(
        &self,
        session: &mut SessionManager,
    ) -> Result<RawStatus, Error> {
        let mut attempts_left = self.max_attempts;

        while attempts_left > 0 {
            attempts_left -= 1;

            match status::run_pass(session).await {
                Ok(Some(raw)) => return Ok(raw),
                Ok(None) => {
                    debug!(attempts_left, "aggregation pass yielded no data");
                }
                Err(e) if e.is_session_invalid() => {
                    if attempts_left == 0 {
                        break;
                    }
                    warn!("session invalid during poll, re-authenticating");
                    session.clear_session();
                    session.login().await?;
                }
                Err(e) if e.is_server_fault() => {
                    if attempts_left == 0 {
                        break;
                    }
                    warn!("server fault during poll, resetting session state");
                    session.reset_hard()?;
                    session.login().await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::AggregationFailed { attempts: self.max_attempts })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}
