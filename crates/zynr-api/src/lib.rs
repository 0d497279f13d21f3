// zynr-api: Async Rust client for the Zyxel NR-series router management API.
//
// The device exposes an HTTPS management interface with a proprietary
// hybrid RSA/AES envelope, a session token that the firmware can silently
// invalidate, and a set of independent status sub-resources that one poll
// aggregates into a single flat snapshot.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod retry;
pub mod session;
pub mod status;
pub mod transport;

pub use client::ZyxelClient;
pub use config::ClientConfig;
pub use crypto::PaddingStats;
pub use error::Error;
pub use retry::RetryPolicy;
pub use status::{RawStatus, StatusRecord};
pub use transport::{TlsMode, TransportConfig};
