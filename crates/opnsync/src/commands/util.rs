//! Shared helpers for command handlers.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use opnsync_config::{Config, Manifest};
use opnsync_core::{DiscoveryWarning, KindBatch, RelationMode, RunContext};

use crate::cli::{GlobalOpts, ManifestArgs};
use crate::error::CliError;
use crate::output::{Tone, paint, should_color};

/// Load the device inventory, failing when it names no device.
pub fn load_inventory(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = opnsync_config::load_config(global.config.as_deref())?;
    if config.devices.is_empty() {
        let path = global
            .config
            .clone()
            .unwrap_or_else(opnsync_config::config_path);
        return Err(CliError::NoDevices {
            path: path.display().to_string(),
        });
    }
    Ok(config)
}

/// Run context over `devices`, with the relation mode from flags or config.
pub fn run_context(
    config: &Config,
    devices: &[String],
    strict_relations: bool,
) -> Result<RunContext, CliError> {
    let registry = opnsync_config::build_registry_for(config, devices)?;
    let mode = if strict_relations || config.defaults.strict_relations {
        RelationMode::Strict
    } else {
        RelationMode::PassThrough
    };
    Ok(RunContext::new(Arc::new(registry)).with_relation_mode(mode))
}

/// Load inventory and manifest, and build the run for a plan or apply.
pub fn prepare_run(
    args: &ManifestArgs,
    global: &GlobalOpts,
) -> Result<(RunContext, Vec<KindBatch>), CliError> {
    let config = load_inventory(global)?;
    let manifest = Manifest::load(&args.manifest)?;

    let inventory: Vec<String> = config.devices.keys().cloned().collect();
    let batches = manifest.to_batches(&inventory)?;

    let mut managed: Vec<String> = batches
        .iter()
        .flat_map(|b| b.desired.iter().map(|r| r.device.clone()))
        .collect();
    managed.sort();
    managed.dedup();

    let ctx = run_context(&config, &managed, args.strict_relations)?;
    Ok((ctx, batches))
}

/// Report devices that could not be enumerated on stderr.
pub fn print_warnings(warnings: &[DiscoveryWarning], global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    let color = should_color(&global.color);
    for w in warnings {
        eprintln!(
            "{} {} on '{}' could not be read: {}",
            paint("warning:", Tone::Change, color),
            w.kind,
            w.device,
            w.message
        );
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.to_owned(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(io::Error::other(e)))?;
    Ok(confirmed)
}
