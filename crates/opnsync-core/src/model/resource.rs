// ── Resource identity types ──
//
// What the engine reconciles: objects discovered on a device and the
// resources a manifest declares. Both are matched by `(device, name)`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute map as carried on the wire and in manifests.
pub type AttrMap = Map<String, Value>;

/// Whether a declared resource should exist on its device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// An object discovered on a device.
///
/// `identifier` is opaque and device-assigned (`uuid`, `refid` or `caref`
/// depending on kind). It is stable across reads and reused for
/// update/delete. Singleton settings kinds use an empty identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteObject {
    pub kind: &'static str,
    pub device: String,
    pub identifier: String,
    pub name: String,
    pub attrs: AttrMap,
}

impl RemoteObject {
    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey {
            device: &self.device,
            name: &self.name,
        }
    }
}

/// A resource declared by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    pub kind: String,
    pub device: String,
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub attrs: AttrMap,
}

impl DesiredResource {
    pub fn new(
        kind: impl Into<String>,
        device: impl Into<String>,
        name: impl Into<String>,
        attrs: AttrMap,
    ) -> Self {
        Self {
            kind: kind.into(),
            device: device.into(),
            name: name.into(),
            ensure: Ensure::Present,
            attrs,
        }
    }

    pub fn absent(
        kind: impl Into<String>,
        device: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            ensure: Ensure::Absent,
            ..Self::new(kind, device, name, AttrMap::new())
        }
    }

    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey {
            device: &self.device,
            name: &self.name,
        }
    }
}

/// Borrowed match key shared by desired and remote resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey<'a> {
    pub device: &'a str,
    pub name: &'a str,
}

impl fmt::Display for ResourceKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.device)
    }
}
