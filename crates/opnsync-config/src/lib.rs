//! Device inventory and manifests for opnsync.
//!
//! TOML inventory (figment: defaults, file, `OPNSYNC_` env), credential
//! resolution (env var, keyring, plaintext) and translation into an
//! `opnsync_core::DeviceRegistry`. The [`manifest`] module loads the
//! declared resources a run reconciles.

pub mod manifest;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use opnsync_api::{ApiCredentials, TlsMode, TransportConfig};
use opnsync_core::{DeviceConfig, DeviceRegistry};

pub use manifest::{Manifest, ResourceEntry};

/// Keyring service every secret is stored under.
pub const KEYRING_SERVICE: &str = "opnsync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown device '{name}'")]
    UnknownDevice { name: String },

    #[error("no {what} configured for device '{device}'")]
    NoCredentials { device: String, what: &'static str },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("cannot parse manifest {path}: {reason}")]
    ManifestParse { path: String, reason: String },

    #[error("resource #{index} ({title}): {reason}")]
    InvalidResource {
        index: usize,
        title: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level device inventory.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Devices by name.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fail writes whose relation names match nothing on the device.
    #[serde(default)]
    pub strict_relations: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            strict_relations: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// One appliance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Base URL (e.g., "https://192.0.2.1").
    pub url: String,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,

    /// API secret (plaintext, prefer keyring or env var).
    pub api_secret: Option<String>,

    /// Environment variable holding the API secret.
    pub api_secret_env: Option<String>,

    /// PEM bundle to trust instead of the system roots.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,

    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "opnsync", "opnsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("opnsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the inventory from `path` (or the canonical path) plus environment.
///
/// A missing file yields an empty inventory. Environment overrides use
/// `__` as the key separator, e.g. `OPNSYNC_DEVICES__FW01__URL`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("OPNSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the key/secret pair for `device`.
///
/// Each half is looked up independently: named env var, then the system
/// keyring (`<device>/api-key`, `<device>/api-secret`), then plaintext.
pub fn resolve_credentials(
    device: &str,
    profile: &DeviceProfile,
) -> Result<ApiCredentials, ConfigError> {
    let key = resolve_secret(
        device,
        "api-key",
        profile.api_key_env.as_deref(),
        profile.api_key.as_deref(),
    )?;
    let secret = resolve_secret(
        device,
        "api-secret",
        profile.api_secret_env.as_deref(),
        profile.api_secret.as_deref(),
    )?;
    Ok(ApiCredentials { key, secret })
}

fn resolve_secret(
    device: &str,
    what: &'static str,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{device}/{what}")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(val) = plaintext {
        return Ok(SecretString::from(val.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        device: device.into(),
        what,
    })
}

// ── Registry construction ───────────────────────────────────────────

/// Connection settings for one device, credentials resolved.
pub fn device_config(
    name: &str,
    profile: &DeviceProfile,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: format!("devices.{name}.url"),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(DeviceConfig {
        url,
        credentials: Some(resolve_credentials(name, profile)?),
        transport: TransportConfig { tls, timeout },
    })
}

/// Build the registry for every configured device.
pub fn build_registry(config: &Config) -> Result<DeviceRegistry, ConfigError> {
    let names: Vec<String> = config.devices.keys().cloned().collect();
    build_registry_for(config, &names)
}

/// Build the registry for `names` only, resolving just their credentials.
pub fn build_registry_for(config: &Config, names: &[String]) -> Result<DeviceRegistry, ConfigError> {
    let mut registry = DeviceRegistry::new();
    for name in names {
        let profile = config
            .devices
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDevice { name: name.clone() })?;
        registry.insert(name.clone(), device_config(name, profile, &config.defaults)?);
    }
    Ok(registry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_is_empty_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.defaults.timeout, 30);
    }

    #[test]
    fn devices_and_defaults_are_parsed() {
        let (_dir, path) = write_config(
            r#"
            [defaults]
            insecure = true
            timeout = 10

            [devices.fw01]
            url = "https://192.0.2.1"
            api_key = "k"
            api_secret = "s"

            [devices.fw02]
            url = "https://192.0.2.2"
            ca_cert = "/etc/opnsync/fw02.pem"
            insecure = false
            "#,
        );

        let cfg = load_config(Some(&path)).unwrap();
        assert!(cfg.defaults.insecure);
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(
            cfg.devices.keys().collect::<Vec<_>>(),
            vec!["fw01", "fw02"]
        );
        assert_eq!(
            cfg.devices["fw02"].ca_cert.as_deref(),
            Some(Path::new("/etc/opnsync/fw02.pem"))
        );
    }

    #[test]
    fn plaintext_credentials_are_last_resort() {
        let profile = DeviceProfile {
            url: "https://192.0.2.1".into(),
            api_key: Some("key".into()),
            api_key_env: Some("OPNSYNC_TEST_UNSET_KEY_VAR".into()),
            api_secret: Some("secret".into()),
            ..DeviceProfile::default()
        };
        let creds = resolve_credentials("opnsync-test-device", &profile).unwrap();
        assert_eq!(creds.key.expose_secret(), "key");
        assert_eq!(creds.secret.expose_secret(), "secret");
    }

    #[test]
    fn missing_secret_is_reported() {
        let profile = DeviceProfile {
            url: "https://192.0.2.1".into(),
            api_key: Some("key".into()),
            ..DeviceProfile::default()
        };
        let err = resolve_credentials("opnsync-test-device", &profile).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { what: "api-secret", .. }));
    }

    #[test]
    fn tls_mode_follows_profile_then_defaults() {
        let defaults = Defaults {
            insecure: true,
            ..Defaults::default()
        };
        let mut profile = DeviceProfile {
            url: "https://192.0.2.1".into(),
            api_key: Some("k".into()),
            api_secret: Some("s".into()),
            timeout: Some(5),
            ..DeviceProfile::default()
        };

        let cfg = device_config("fw01", &profile, &defaults).unwrap();
        assert!(matches!(cfg.transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(cfg.transport.timeout, Duration::from_secs(5));

        profile.insecure = Some(false);
        profile.ca_cert = Some(PathBuf::from("/tmp/ca.pem"));
        let cfg = device_config("fw01", &profile, &defaults).unwrap();
        assert!(matches!(cfg.transport.tls, TlsMode::CustomCa(_)));
    }

    #[test]
    fn invalid_url_names_the_device() {
        let profile = DeviceProfile {
            url: "not a url".into(),
            ..DeviceProfile::default()
        };
        let err = device_config("fw01", &profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "devices.fw01.url"));
    }

    #[test]
    fn registry_contains_every_device() {
        let (_dir, path) = write_config(
            r#"
            [devices.fw01]
            url = "https://192.0.2.1"
            api_key = "k"
            api_secret = "s"
            "#,
        );
        let registry = build_registry(&load_config(Some(&path)).unwrap()).unwrap();
        assert_eq!(registry.device_names(), vec!["fw01"]);
    }

    #[test]
    fn subset_registry_skips_other_devices_credentials() {
        let (_dir, path) = write_config(
            r#"
            [devices.fw01]
            url = "https://192.0.2.1"
            api_key = "k"
            api_secret = "s"

            [devices.fw02]
            url = "https://192.0.2.2"
            "#,
        );
        let cfg = load_config(Some(&path)).unwrap();

        let registry = build_registry_for(&cfg, &["fw01".into()]).unwrap();
        assert_eq!(registry.device_names(), vec!["fw01"]);

        let err = build_registry_for(&cfg, &["fw09".into()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDevice { ref name } if name == "fw09"));
    }
}
