//! `opnsync list <kind>`: objects as the devices report them.
//!
//! Output is what the reconciler compares against: selection maps
//! collapsed and relation fields shown by name.

use serde_json::Value;
use tabled::Tabled;

use opnsync_core::{AttrMap, CoreError, Reconciler, RemoteObject, catalogue};
use opnsync_core::diff::wire_string;

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

use super::util;

const SUMMARY_WIDTH: usize = 72;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    identifier: String,
    #[tabled(rename = "Attributes")]
    attrs: String,
}

impl From<&RemoteObject> for ObjectRow {
    fn from(o: &RemoteObject) -> Self {
        Self {
            device: o.device.clone(),
            name: o.name.clone(),
            identifier: o.identifier.clone(),
            attrs: summarize(&o.attrs),
        }
    }
}

/// `key=value` pairs of scalar attributes, cut to fit a table cell.
fn summarize(attrs: &AttrMap) -> String {
    let mut summary = attrs
        .iter()
        .filter(|(_, v)| !matches!(v, Value::Object(_)))
        .map(|(k, v)| format!("{k}={}", wire_string(v)))
        .collect::<Vec<_>>()
        .join(" ");

    if summary.chars().count() > SUMMARY_WIDTH {
        summary = summary.chars().take(SUMMARY_WIDTH - 1).collect();
        summary.push('…');
    }
    summary
}

pub async fn handle(args: ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let kind = catalogue::lookup(&args.kind).ok_or_else(|| CoreError::UnknownKind {
        name: args.kind.clone(),
    })?;

    let config = util::load_inventory(global)?;
    let devices = if args.device.is_empty() {
        config.devices.keys().cloned().collect()
    } else {
        args.device
    };
    let ctx = util::run_context(&config, &devices, false)?;

    tracing::debug!(kind = kind.name, devices = devices.len(), "listing");
    let discovery = Reconciler::new(kind, &ctx).discover(&devices).await;
    util::print_warnings(&discovery.warnings, global);

    let out = output::render_list(
        &global.output,
        &discovery.objects,
        |o| ObjectRow::from(o),
        |o| format!("{}@{}", o.name, o.device),
    )?;
    output::print_output(&out, global.quiet);

    if discovery.warnings.is_empty() {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed: discovery.warnings.len(),
            total: devices.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_skips_nested_maps_and_truncates() {
        let attrs = json!({
            "enabled": true,
            "settings": { "main": {} },
            "description": "x".repeat(100)
        });
        let summary = summarize(attrs.as_object().unwrap_or(&AttrMap::new()));
        assert!(summary.starts_with("enabled=1 description="));
        assert!(!summary.contains("settings"));
        assert_eq!(summary.chars().count(), SUMMARY_WIDTH);
    }
}
