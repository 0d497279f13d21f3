//! Command-line definition.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "zynr", version, about = "Zyxel NR-series router client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device base URL, e.g. https://192.168.1.1
    #[arg(long, env = "ZYNR_HOST", global = true)]
    pub host: Option<String>,

    /// Account name.
    #[arg(long, short = 'u', env = "ZYNR_USERNAME", default_value = "admin", global = true)]
    pub username: String,

    /// Account password. Prompted for when not given here or via env.
    #[arg(long, short = 'p', env = "ZYNR_PASSWORD", global = true)]
    pub password: Option<String>,

    /// Verify the device TLS certificate against the system store
    /// (devices ship self-signed certificates, so the default is to
    /// accept any certificate).
    #[arg(long, global = true)]
    pub tls_verify: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the device and print the flattened status snapshot.
    Status(StatusArgs),
    /// Reboot the device.
    Reboot(RebootArgs),
    /// Probe which status sub-resources this device answers.
    Probe,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print the flattened snapshot as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the raw (pre-flatten) aggregation instead.
    #[arg(long, conflicts_with = "json")]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct RebootArgs {
    /// Skip the confirmation requirement.
    #[arg(long, short = 'y')]
    pub yes: bool,
}
