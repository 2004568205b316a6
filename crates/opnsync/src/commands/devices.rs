//! `opnsync devices`: the configured inventory.

use serde::Serialize;
use tabled::Tabled;

use opnsync_config::{Config, DeviceProfile};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

/// What the inventory says about one device. Secrets are never shown.
#[derive(Debug, Serialize)]
struct DeviceInfo {
    name: String,
    url: String,
    tls: String,
    timeout: u64,
    credentials: String,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "TLS")]
    tls: String,
    #[tabled(rename = "Timeout")]
    timeout: String,
    #[tabled(rename = "Credentials")]
    credentials: String,
}

impl From<&DeviceInfo> for DeviceRow {
    fn from(d: &DeviceInfo) -> Self {
        Self {
            name: d.name.clone(),
            url: d.url.clone(),
            tls: d.tls.clone(),
            timeout: format!("{}s", d.timeout),
            credentials: d.credentials.clone(),
        }
    }
}

fn describe(name: &str, profile: &DeviceProfile, config: &Config) -> DeviceInfo {
    let tls = if profile.insecure.unwrap_or(config.defaults.insecure) {
        "insecure".to_owned()
    } else if let Some(ref ca) = profile.ca_cert {
        format!("ca {}", ca.display())
    } else {
        "system".to_owned()
    };

    let credentials = match (&profile.api_key_env, &profile.api_key) {
        (Some(var), _) => format!("env {var}"),
        (None, Some(_)) => "config file".to_owned(),
        (None, None) => "keyring".to_owned(),
    };

    DeviceInfo {
        name: name.to_owned(),
        url: profile.url.clone(),
        tls,
        timeout: profile.timeout.unwrap_or(config.defaults.timeout),
        credentials,
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let config = util::load_inventory(global)?;
    let devices: Vec<DeviceInfo> = config
        .devices
        .iter()
        .map(|(name, profile)| describe(name, profile, &config))
        .collect();

    let out = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
