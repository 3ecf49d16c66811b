//! CLI argument parsing for texel.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "texel",
    about = "Edit localization files in repositories and local directories",
    version,
    after_help = "Logs are written to: ~/.local/share/texel/logs/texel.log"
)]
pub struct Cli {
    /// Work on a local directory instead of a remote repository
    #[arg(short = 'd', long, global = true, conflicts_with = "token")]
    pub dir: Option<PathBuf>,

    /// Bitbucket access token
    #[arg(short, long, global = true, env = "TEXEL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to a YAML config file (default: ~/.config/texel/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List child projects, or root projects without a parent
    Projects {
        /// Parent project id
        parent: Option<String>,
    },

    /// Show a project
    Project {
        /// Project id
        id: String,
    },

    /// List texels of a project
    List {
        /// Project id
        id: String,

        /// Include pending changes
        #[arg(short, long)]
        pending: bool,
    },

    /// Stage a value
    Set {
        /// Project id
        id: String,
        domain: String,
        key: String,
        locale: String,
        value: String,
    },

    /// Stage a deletion
    Delete {
        /// Project id
        id: String,
        domain: String,
        key: String,
        locale: String,
    },

    /// Show pending changes of a project
    Pending {
        /// Project id
        id: String,
    },

    /// Write pending changes to the project
    Commit {
        /// Project id
        id: String,
    },

    /// Drop pending changes of a project
    Discard {
        /// Project id
        id: String,
    },

    /// Print the file path of a domain in a locale
    Path { domain: String, locale: String },

    /// Print the domain of a file path
    Domain { path: String },
}
