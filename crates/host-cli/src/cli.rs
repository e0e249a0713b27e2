//! Command-line interface definition.

use clap::Parser;

/// Run a compute engine under an interactive lifecycle console.
#[derive(Debug, Parser)]
#[command(name = "emberhost", version, about)]
pub(crate) struct Cli {
    /// Pool endpoint (`host:port` or `stratum+tcp://host:port`).
    #[arg(long, env = "EMBERHOST_POOL")]
    pub(crate) pool: Option<String>,

    /// Username sent to the pool.
    #[arg(long, env = "EMBERHOST_USER")]
    pub(crate) user: Option<String>,

    /// Pool password.
    #[arg(long, env = "EMBERHOST_PASS")]
    pub(crate) pass: Option<String>,

    /// The pool allows anonymous authentication.
    #[arg(long)]
    pub(crate) anonymous: bool,

    /// Compute thread count; 0 auto-detects.
    #[arg(long)]
    pub(crate) threads: Option<u32>,

    /// Algorithm identifier for the compute backend.
    #[arg(long)]
    pub(crate) algorithm: Option<String>,

    /// Persist the resolved configuration for later runs.
    #[arg(long)]
    pub(crate) save_config: bool,

    /// Ignore any previously saved configuration.
    #[arg(long)]
    pub(crate) fresh: bool,
}
