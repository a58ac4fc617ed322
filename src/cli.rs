use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "retrolaunch")]
#[command(about = "Installs, updates and launches standalone console emulators")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a target's emulator, install or update it if needed, then run it
    #[command(
        after_help = "Examples:\n  retrolaunch run rpcs3 \"/games/Demon's Souls/PS3_GAME/USRDIR/EBOOT.BIN\"\n  retrolaunch run xenia_canary /games/halo3.iso\n  retrolaunch -v run pcsx2"
    )]
    Run {
        /// Target name (e.g. 'rpcs3', 'xenia_canary', 'pcsx2')
        target: String,
        /// Content to hand to the emulator
        content: Option<String>,
    },

    /// Install or update a target without launching it
    Update {
        /// Target name, or 'all'
        target: String,
    },

    /// Show every configured target and its installed build
    List,

    /// Manage retrolaunch's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Print the config file location
    Path,
    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
