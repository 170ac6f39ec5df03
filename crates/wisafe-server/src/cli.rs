use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wisafe_core::DEFAULT_BAUD_RATE;

/// Bridge daemon for FireAngel WiSafe2 alarms
#[derive(Parser)]
#[command(name = "wisafe2d", version)]
pub struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the bridge and run until interrupted
    Run {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "WISAFE2_CONFIG", default_value = "wisafe2.yaml")]
        config: PathBuf,

        /// Also publish entities that are disabled by default
        #[arg(long)]
        all_entities: bool,
    },

    /// List serial ports on this machine
    Ports,

    /// Write one command to the bridge and exit
    Send {
        /// Serial port of the bridge
        #[arg(short, long, env = "WISAFE2_PORT")]
        port: String,

        #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Command code (`3~`) or name (`test_all`)
        #[arg(value_name = "COMMAND")]
        command: String,
    },
}
