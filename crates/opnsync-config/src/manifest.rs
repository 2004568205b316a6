// ── Manifest ──
//
// Declared resources, in YAML or TOML. Each entry names its object
// either as `title: name@device` or with separate `name`/`device`
// fields. Singleton settings kinds are named after their device.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use opnsync_core::catalogue;
use opnsync_core::{AttrMap, DesiredResource, Ensure, KindBatch, KindDescriptor};

use crate::ConfigError;

/// A manifest file as written.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Kinds whose undeclared remote objects are deleted.
    #[serde(default)]
    pub purge: Vec<String>,

    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// One declared resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    pub kind: String,

    /// `name@device`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default)]
    pub ensure: Ensure,

    #[serde(default)]
    pub attrs: AttrMap,
}

impl ResourceEntry {
    /// How the entry is referred to in errors.
    fn label(&self) -> String {
        match (&self.title, &self.name, &self.device) {
            (Some(title), _, _) => title.clone(),
            (None, Some(name), Some(device)) => format!("{name}@{device}"),
            (None, Some(name), None) => name.clone(),
            (None, None, Some(device)) => format!("@{device}"),
            (None, None, None) => self.kind.clone(),
        }
    }

    /// Split into `(name, device)`.
    fn identity(&self, kind: &KindDescriptor) -> Result<(String, String), String> {
        let (name, device) = match (&self.title, &self.name, &self.device) {
            (Some(_), Some(_), _) => {
                return Err("set either `title` or `name`, not both".into());
            }
            (Some(title), None, device) => match title.rsplit_once('@') {
                Some((name, on)) => {
                    if device.as_deref().is_some_and(|d| d != on) {
                        return Err(format!("title names device '{on}' but `device` differs"));
                    }
                    (Some(name.to_owned()), Some(on.to_owned()))
                }
                None => (Some(title.clone()), device.clone()),
            },
            (None, name, device) => (name.clone(), device.clone()),
        };

        let device = device
            .filter(|d| !d.is_empty())
            .ok_or_else(|| String::from("missing device"))?;

        let name = if kind.is_settings() {
            match name {
                Some(n) if n != device => {
                    return Err(format!(
                        "{} is per-device settings; name must be omitted or '{device}'",
                        kind.name
                    ));
                }
                _ => device.clone(),
            }
        } else {
            name.filter(|n| !n.is_empty())
                .ok_or_else(|| String::from("missing name"))?
        };

        Ok((name, device))
    }
}

impl Manifest {
    /// Read a manifest, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let parse_error = |reason: String| ConfigError::ManifestParse {
            path: path.display().to_string(),
            reason,
        };

        let manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            Some("toml") => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            _ => {
                return Err(parse_error(
                    "unknown extension (expected .yaml, .yml or .toml)".into(),
                ));
            }
        };
        debug!(path = %path.display(), "manifest loaded");
        Ok(manifest)
    }

    /// Validate every entry against the catalogue and `devices`.
    ///
    /// Checks: known kind, non-empty name and device, device present in
    /// the inventory, no duplicate `(kind, device, name)`, and no
    /// `ensure: absent` on settings kinds.
    pub fn resolve(&self, devices: &[String]) -> Result<Vec<DesiredResource>, ConfigError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.resources.len());

        for (index, entry) in self.resources.iter().enumerate() {
            let invalid = |reason: String| ConfigError::InvalidResource {
                index: index + 1,
                title: entry.label(),
                reason,
            };

            let kind = catalogue::lookup(&entry.kind)
                .ok_or_else(|| invalid(format!("unknown kind '{}'", entry.kind)))?;
            let (name, device) = entry.identity(kind).map_err(&invalid)?;

            if !devices.iter().any(|d| *d == device) {
                return Err(invalid(format!("device '{device}' is not in the inventory")));
            }
            if kind.is_settings() && entry.ensure == Ensure::Absent {
                return Err(invalid(format!("{} cannot be absent", kind.name)));
            }
            if !seen.insert((kind.name, device.clone(), name.clone())) {
                return Err(invalid("declared more than once".into()));
            }

            resolved.push(DesiredResource {
                kind: kind.name.to_owned(),
                device,
                name,
                ensure: entry.ensure,
                attrs: entry.attrs.clone(),
            });
        }

        Ok(resolved)
    }

    /// Purged kinds, validated.
    fn purge_kinds(&self) -> Result<BTreeSet<&'static str>, ConfigError> {
        self.purge
            .iter()
            .map(|name| {
                let kind = catalogue::lookup(name).ok_or_else(|| ConfigError::Validation {
                    field: "purge".into(),
                    reason: format!("unknown kind '{name}'"),
                })?;
                if kind.is_settings() {
                    return Err(ConfigError::Validation {
                        field: "purge".into(),
                        reason: format!("{} is per-device settings and cannot be purged", kind.name),
                    });
                }
                Ok(kind.name)
            })
            .collect()
    }

    /// Group resolved resources into one batch per kind, in catalogue order.
    ///
    /// Purged kinds get a batch even when nothing of that kind is declared.
    pub fn to_batches(&self, devices: &[String]) -> Result<Vec<KindBatch>, ConfigError> {
        let resources = self.resolve(devices)?;
        let purge = self.purge_kinds()?;

        let batches = catalogue::KINDS
            .iter()
            .copied()
            .filter_map(|kind| {
                let desired: Vec<DesiredResource> = resources
                    .iter()
                    .filter(|r| r.kind == kind.name)
                    .cloned()
                    .collect();
                let purged = purge.contains(kind.name);
                (!desired.is_empty() || purged).then_some(KindBatch {
                    kind,
                    desired,
                    purge: purged,
                })
            })
            .collect();
        Ok(batches)
    }
}
