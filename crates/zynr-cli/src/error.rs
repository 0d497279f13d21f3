//! CLI error types with miette diagnostics.
//!
//! Maps `zynr_api::Error` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

/// Exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const DEVICE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("No device host given")]
    #[diagnostic(
        code(zynr::no_host),
        help("Pass --host https://192.168.1.1 or set ZYNR_HOST.")
    )]
    MissingHost,

    #[error("Invalid device URL: {url}")]
    #[diagnostic(code(zynr::bad_url), help("Expected something like https://192.168.1.1"))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Could not read password")]
    #[diagnostic(code(zynr::password_prompt))]
    PasswordPrompt(#[source] std::io::Error),

    #[error("Refusing to reboot without confirmation")]
    #[diagnostic(code(zynr::reboot_confirm), help("Re-run with --yes to confirm."))]
    RebootNotConfirmed,

    #[error("Authentication failed")]
    #[diagnostic(
        code(zynr::auth_failed),
        help("Check the username and password. Some firmware locks the account after repeated failures.")
    )]
    Auth(#[source] zynr_api::Error),

    #[error("Could not communicate with the device")]
    #[diagnostic(
        code(zynr::connection_failed),
        help("Check that the device is reachable and the URL scheme is https.")
    )]
    Connection(#[source] zynr_api::Error),

    #[error("The device rejected the request")]
    #[diagnostic(code(zynr::device_rejected))]
    Device(#[source] zynr_api::Error),

    #[error(transparent)]
    #[diagnostic(code(zynr::api))]
    Api(zynr_api::Error),

    #[error("Could not render output")]
    #[diagnostic(code(zynr::output))]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingHost | Self::InvalidUrl { .. } | Self::RebootNotConfirmed => {
                exit_code::USAGE
            }
            Self::Auth(_) => exit_code::AUTH,
            Self::Connection(_) => exit_code::CONNECTION,
            Self::Device(_) => exit_code::DEVICE,
            Self::PasswordPrompt(_) | Self::Api(_) | Self::Output(_) => exit_code::GENERAL,
        }
    }
}

impl From<zynr_api::Error> for CliError {
    fn from(err: zynr_api::Error) -> Self {
        match err {
            zynr_api::Error::Authentication { .. } | zynr_api::Error::SessionInvalid { .. } => {
                Self::Auth(err)
            }
            zynr_api::Error::Transport(_) | zynr_api::Error::InvalidUrl(_) => {
                Self::Connection(err)
            }
            zynr_api::Error::DeviceRejected { .. } => Self::Device(err),
            _ => Self::Api(err),
        }
    }
}
