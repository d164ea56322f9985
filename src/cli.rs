use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::version;

#[derive(Parser)]
#[command(author, version = version(), about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// Path to config file (default: `$XDG_CONFIG_HOME/stratum/config.kdl`).
    ///
    /// This can also be set with the `STRATUM_CONFIG` environment variable. If both are set, the
    /// command line argument takes precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Print this container's id, the active container, and the stacking offsets.
    Status,
    /// Follow the active container file and log every focus event until interrupted.
    Watch {
        /// Poll interval in milliseconds, overriding the config.
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Read a raw uevent (NUL-separated fields) from stdin and apply it as a focus event.
    Uevent,
    /// Validate the config file.
    Validate,
}
