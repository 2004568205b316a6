// ── Reconciliation driver ──
//
// Per kind: discover remote objects on every device, match them against
// declared resources by `(device, name)`, plan creates/updates/deletes,
// and apply them one at a time while feeding the reconfigure coordinator.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use opnsync_api::DeviceClient;

use crate::diff::{FieldChange, diff, to_wire};
use crate::directory::Directory;
use crate::error::CoreError;
use crate::model::{
    AttrMap, DesiredResource, Ensure, IdentifierSource, KindDescriptor, RemoteObject, ResourceKey,
    Shape,
};
use crate::reconfigure::ReconfigureCoordinator;
use crate::relation::RelationResolver;
use crate::run::RunContext;
use crate::selection::normalize;

// ── Discovery ────────────────────────────────────────────────────────

/// A device that could not be enumerated. Its objects are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryWarning {
    pub kind: &'static str,
    pub device: String,
    pub message: String,
}

/// Everything found for one kind across the run's devices.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub kind: &'static str,
    pub objects: Vec<RemoteObject>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl Discovery {
    pub fn find(&self, device: &str, name: &str) -> Option<&RemoteObject> {
        self.objects
            .iter()
            .find(|o| o.device == device && o.name == name)
    }

    /// Devices whose enumeration failed.
    pub fn failed_devices(&self) -> HashSet<&str> {
        self.warnings.iter().map(|w| w.device.as_str()).collect()
    }
}

// ── Plan ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// One planned mutation.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub kind: &'static str,
    pub action: Action,
    pub device: String,
    pub name: String,
    /// Empty for creates.
    pub identifier: String,
    /// Declared attributes (empty for deletes).
    pub attrs: AttrMap,
    pub fields: Vec<FieldChange>,
}

impl Change {
    pub fn key(&self) -> ResourceKey<'_> {
        ResourceKey {
            device: &self.device,
            name: &self.name,
        }
    }
}

/// Planned changes for one kind.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub kind: &'static str,
    pub changes: Vec<Change>,
    /// Declared resources left alone because their device failed discovery.
    pub skipped: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Generic driver for one kind within a run.
pub struct Reconciler<'a> {
    kind: &'static KindDescriptor,
    ctx: &'a RunContext,
}

impl<'a> Reconciler<'a> {
    pub fn new(kind: &'static KindDescriptor, ctx: &'a RunContext) -> Self {
        Self { kind, ctx }
    }

    pub fn kind(&self) -> &'static KindDescriptor {
        self.kind
    }

    /// Enumerate every device in parallel.
    ///
    /// Objects come back normalised with relation fields translated to
    /// names. A failing device yields a warning and no objects.
    pub async fn discover(&self, devices: &[String]) -> Discovery {
        let results = join_all(devices.iter().map(|d| self.discover_device(d))).await;

        let mut discovery = Discovery {
            kind: self.kind.name,
            objects: Vec::new(),
            warnings: Vec::new(),
        };
        for (device, result) in devices.iter().zip(results) {
            match result {
                Ok(objects) => discovery.objects.extend(objects),
                Err(e) => {
                    warn!(kind = self.kind.name, device = %device, error = %e, "discovery failed");
                    discovery.warnings.push(DiscoveryWarning {
                        kind: self.kind.name,
                        device: device.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        discovery
    }

    async fn discover_device(&self, device: &str) -> Result<Vec<RemoteObject>, CoreError> {
        let client = self.ctx.registry().client_for(device)?;
        let raw = Directory::new(self.kind, device, &client).list().await?;

        let mut resolver =
            RelationResolver::new(device, &client).with_mode(self.ctx.relation_mode());
        let mut objects = Vec::with_capacity(raw.len());
        for mut obj in raw {
            let normalized = normalize(&obj.attrs);
            obj.attrs = resolver
                .translate_to_names(self.kind.relations, &normalized)
                .await?;
            objects.push(obj);
        }
        Ok(objects)
    }

    /// Match declared resources of this kind against `discovery`.
    ///
    /// With `purge`, remote objects no declared resource names are deleted.
    pub fn plan(&self, desired: &[DesiredResource], discovery: &Discovery, purge: bool) -> Plan {
        let failed = discovery.failed_devices();
        let mut claimed: HashSet<ResourceKey<'_>> = HashSet::new();
        let mut plan = Plan {
            kind: self.kind.name,
            changes: Vec::new(),
            skipped: Vec::new(),
        };

        for res in desired.iter().filter(|r| r.kind == self.kind.name) {
            claimed.insert(res.key());
            if failed.contains(res.device.as_str()) {
                warn!(kind = self.kind.name, resource = %res.key(), "device not discovered, skipping");
                plan.skipped.push(res.key().to_string());
                continue;
            }

            let remote = discovery.find(&res.device, &res.name);
            let change = match (res.ensure, remote) {
                (Ensure::Present, None) => {
                    Some(self.change(Action::Create, res, "", diff(&res.attrs, &AttrMap::new())))
                }
                (Ensure::Present, Some(obj)) => {
                    let fields = diff(&res.attrs, &obj.attrs);
                    (!fields.is_empty())
                        .then(|| self.change(Action::Update, res, &obj.identifier, fields))
                }
                (Ensure::Absent, Some(obj)) => Some(self.deletion(obj)),
                (Ensure::Absent, None) => None,
            };
            plan.changes.extend(change);
        }

        if purge && self.kind.shape == Shape::Collection {
            for obj in &discovery.objects {
                if !claimed.contains(&obj.key()) {
                    debug!(kind = self.kind.name, resource = %obj.key(), "purging unmanaged object");
                    plan.changes.push(self.deletion(obj));
                }
            }
        }

        plan
    }

    fn change(
        &self,
        action: Action,
        res: &DesiredResource,
        identifier: &str,
        fields: Vec<FieldChange>,
    ) -> Change {
        Change {
            kind: self.kind.name,
            action,
            device: res.device.clone(),
            name: res.name.clone(),
            identifier: identifier.to_owned(),
            attrs: res.attrs.clone(),
            fields,
        }
    }

    fn deletion(&self, obj: &RemoteObject) -> Change {
        Change {
            kind: self.kind.name,
            action: Action::Delete,
            device: obj.device.clone(),
            name: obj.name.clone(),
            identifier: obj.identifier.clone(),
            attrs: AttrMap::new(),
            fields: Vec::new(),
        }
    }

    /// Apply one change and record the outcome with the coordinator.
    ///
    /// Success marks the device dirty; a failure that may have touched
    /// the device marks it errored. The error is returned either way.
    pub async fn apply_change(&self, change: &Change) -> Result<(), CoreError> {
        let client = self.ctx.registry().client_for(&change.device)?;
        let result = self.mutate(&client, change).await;

        if let Some(coordinator) = self.coordinator() {
            match &result {
                Ok(()) => coordinator.mark(&change.device),
                Err(e) if e.marks_error() => coordinator.mark_error(&change.device),
                Err(_) => {}
            }
        }
        result
    }

    async fn mutate(&self, client: &DeviceClient, change: &Change) -> Result<(), CoreError> {
        let directory = Directory::new(self.kind, &change.device, client);
        match change.action {
            Action::Create => {
                let payload = self.payload(client, change).await?;
                directory.create(&change.name, &payload).await.map(drop)
            }
            Action::Update => {
                let payload = self.payload(client, change).await?;
                directory
                    .update(&change.name, &change.identifier, &payload)
                    .await
            }
            Action::Delete => directory.delete(&change.name, &change.identifier).await,
        }
    }

    /// Wire-form attributes with relations resolved and the identity field set.
    async fn payload(&self, client: &DeviceClient, change: &Change) -> Result<AttrMap, CoreError> {
        let mut attrs = to_wire(&change.attrs);

        if !self.kind.relations.is_empty() {
            attrs = RelationResolver::new(&change.device, client)
                .with_mode(self.ctx.relation_mode())
                .translate_to_uuids(self.kind.relations, &attrs)
                .await?;
        }

        if self.kind.shape == Shape::Collection
            && matches!(self.kind.identifier, IdentifierSource::Direct)
        {
            attrs.insert(
                self.kind.name_field.to_owned(),
                Value::String(change.name.clone()),
            );
        }
        Ok(attrs)
    }

    fn coordinator(&self) -> Option<Arc<ReconfigureCoordinator>> {
        self.kind.reload.map(|endpoint| self.ctx.coordinator(endpoint))
    }
}
