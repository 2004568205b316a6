//! Clap derive structures for the `opnsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// opnsync -- declarative configuration sync for OPNsense appliances
#[derive(Debug, Parser)]
#[command(
    name = "opnsync",
    version,
    about = "Reconcile declared OPNsense resources against your appliances",
    long_about = "Reads a manifest of desired resources (HAProxy, trust store, Zabbix),\n\
        compares it with what each appliance reports over its REST API, and\n\
        applies the difference, reloading each affected service once.",
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
    /// Device inventory file (defaults to the platform config dir)
    #[arg(long, env = "OPNSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OPNSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show configured devices
    #[command(alias = "dev")]
    Devices,

    /// Show the supported resource kinds
    Kinds,

    /// List objects of one kind as the devices report them
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show what a manifest would change, without changing anything
    Plan(ManifestArgs),

    /// Apply a manifest and reload affected services
    Apply(ManifestArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Resource kind (see `opnsync kinds`)
    pub kind: String,

    /// Only this device (repeatable; default: every configured device)
    #[arg(long, short = 'd')]
    pub device: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Manifest of desired resources (.yaml, .yml or .toml)
    #[arg(long, short = 'm', env = "OPNSYNC_MANIFEST")]
    pub manifest: PathBuf,

    /// Fail when a relation names an object the device does not have
    #[arg(long)]
    pub strict_relations: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }
}
