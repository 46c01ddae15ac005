//! Clap derive structures for the `keepsync` CLI.
//!
//! Kept free of crate-internal imports so `build.rs` can include it for
//! man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// keepsync -- read, write and watch a persisted value
#[derive(Debug, Parser)]
#[command(
    name = "keepsync",
    version,
    about = "Read, write and watch a value kept in sync with a JSON file",
    long_about = "Hosts a synchronizer over a JSON value file.\n\n\
        The value is loaded once, every change is published to watchers in order,\n\
        and writes back to the file are coalesced so at most one is in flight.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Named store from the config file
    #[arg(long, short = 's', env = "KEEPSYNC_STORE", global = true)]
    pub store: Option<String>,

    /// Use this JSON file directly instead of a named store
    #[arg(long, short = 'f', global = true, conflicts_with = "store")]
    pub file: Option<PathBuf>,

    /// Output format [default: from config, else json]
    #[arg(long, short = 'o', env = "KEEPSYNC_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the stored value (null if nothing is stored)
    Get,

    /// Replace the stored value and wait until it is written
    Set(SetArgs),

    /// Print the value and every change to it until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage the keepsync config file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Value Commands ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// New value as a JSON document
    pub value: String,

    /// Store VALUE as a plain string instead of parsing it as JSON
    #[arg(long)]
    pub string: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after printing this many values (at least 1)
    #[arg(long, short = 'n', value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Read newline-delimited JSON values from stdin and set each one;
    /// exit once the last has been printed and written
    #[arg(long)]
    pub stdin: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration
    Show,

    /// Add or replace a named store
    Add {
        /// Store name (letters, digits, '-' and '_')
        name: String,

        /// JSON file holding the value
        path: PathBuf,

        /// Save timeout in milliseconds for this store (0 disables it)
        #[arg(long)]
        save_timeout_ms: Option<u64>,

        /// Make this the default store
        #[arg(long)]
        default: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
