use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "getgit")]
#[command(about = "A package manager for tools distributed as Git repositories")]
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
    /// Install a tool from the configured sources
    #[command(
        after_help = "Examples:\n  getgit install k9s\n  getgit install nvm --edge\n  getgit install k9s --release --skip-build"
    )]
    Install {
        /// Tool name as listed in a source file
        tool: String,
        /// Follow the latest commit on the default branch
        #[arg(short, long, conflicts_with = "release")]
        edge: bool,
        /// Follow the latest tag
        #[arg(short, long)]
        release: bool,
        /// Do not run the build command
        #[arg(short, long)]
        skip_build: bool,
    },

    /// Upgrade one installed tool, or all of them
    Upgrade {
        /// Tool to upgrade (omit to upgrade every installed tool)
        tool: Option<String>,
        /// Switch to the edge train
        #[arg(short, long, conflicts_with = "release")]
        edge: bool,
        /// Switch to the release train
        #[arg(short, long)]
        release: bool,
        /// Do not run the build command
        #[arg(short, long)]
        skip_build: bool,
    },

    /// Remove an installed tool and its shell entries
    Uninstall {
        /// Tool to remove
        tool: String,
    },

    /// Show available or installed tools
    Info {
        /// Tool to show details for
        tool: Option<String>,
        /// Only list installed tools
        #[arg(short, long)]
        installed: bool,
        /// Fetch and show whether updates are available
        #[arg(long)]
        check: bool,
    },

    /// Refresh source files from their origin and rebuild the tool index
    Update {
        /// Apply changes without asking for approval
        #[arg(short, long)]
        force: bool,
        /// Show changes without applying them
        #[arg(short, long)]
        dry_run: bool,
        /// Only rebuild the tool index
        #[arg(short, long)]
        index_only: bool,
    },

    /// Manage getgit's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print a shell completion script
    #[command(
        after_help = "Examples:\n  source <(getgit completion bash)\n  getgit completion zsh > \"${fpath[1]}/_getgit\"\n  getgit completion fish > ~/.config/fish/completions/getgit.fish"
    )]
    Completion {
        /// Shell to generate the script for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration setting
    Get {
        /// Key to get (if omitted, shows all settings)
        key: Option<String>,
    },
    /// Set a configuration setting
    Set {
        /// Key and value (e.g., 'root=/opt/tools' or 'root /opt/tools')
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },
    /// Reset a configuration setting to its default
    Unset {
        /// Key to unset (e.g., 'root')
        key: String,
    },
    /// Show full configuration
    Show {
        /// Output format (json, yaml, plain)
        #[arg(long, default_value = "json")]
        format: String,
    },
}
