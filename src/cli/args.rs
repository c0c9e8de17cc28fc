//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueHint};

use crate::domain::{NodeId, Role};

/// Taxonomy hierarchy engine: browse and edit a role-gated classification tree
#[derive(Parser, Debug)]
#[command(name = "taxonomy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Caller role (default: from config, else "user")
    #[arg(short, long, global = true, env = "TAXONOMY_ROLE")]
    pub role: Option<Role>,

    /// Node store document
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub store: Option<PathBuf>,

    /// Config file (default: ~/.config/taxonomy/taxonomy.toml)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the whole taxonomy
    Tree,

    /// Show one node
    Show {
        /// Node id
        id: NodeId,
    },

    /// Print the root-to-node path
    Path {
        /// Node id
        id: NodeId,
    },

    /// Find nodes by name (case-insensitive substring)
    Search {
        /// Text to look for
        query: String,
    },

    /// Create a node
    Create {
        /// Node name
        name: String,
        /// Parent node id (default: new root)
        #[arg(short, long)]
        parent: Option<NodeId>,
    },

    /// Rename a node
    Rename {
        /// Node id
        id: NodeId,
        /// New name
        name: String,
    },

    /// Delete a node and its whole subtree
    Delete {
        /// Node id
        id: NodeId,
    },

    /// Move a node under a new parent, or make it a root
    #[command(group(ArgGroup::new("target").required(true).args(["parent", "root"])))]
    Move {
        /// Node id
        id: NodeId,
        /// New parent node id
        #[arg(short, long)]
        parent: Option<NodeId>,
        /// Make the node a root
        #[arg(long)]
        root: bool,
    },

    /// Print the effective permission table
    Policy,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show status
    Info,

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Show config file locations
    Path,

    /// Write a template config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
