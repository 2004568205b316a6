// ── Run context ──
//
// Owns everything scoped to one reconciliation run: the device registry
// handle, the relation mode and one reconfigure coordinator per reload
// domain. `plan()` and `apply()` drive a whole manifest; `finish()` is the
// single barrier that issues reloads after every mutation has been applied.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalogue;
use crate::driver::{Action, Change, DiscoveryWarning, Plan, Reconciler};
use crate::device::DeviceRegistry;
use crate::model::{DesiredResource, KindDescriptor, ReloadEndpoint};
use crate::reconfigure::{ReconfigureCoordinator, ReloadOutcome};
use crate::relation::RelationMode;

/// Whether planned changes are sent to the devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Apply,
}

/// Declared resources of one kind.
#[derive(Debug, Clone)]
pub struct KindBatch {
    pub kind: &'static KindDescriptor,
    pub desired: Vec<DesiredResource>,
    /// Delete remote objects of this kind that nothing declares.
    pub purge: bool,
}

/// A change that could not be applied.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeFailure {
    pub kind: &'static str,
    pub action: Action,
    pub device: String,
    pub name: String,
    pub error: String,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub discovered: usize,
    pub plans: Vec<Plan>,
    pub warnings: Vec<DiscoveryWarning>,
    pub applied: usize,
    pub failures: Vec<ChangeFailure>,
    pub reloads: Vec<ReloadOutcome>,
}

impl RunReport {
    pub fn change_count(&self) -> usize {
        self.plans.iter().map(|p| p.changes.len()).sum()
    }

    /// No failed change and no failed reload.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.reloads.iter().all(ReloadOutcome::is_success)
    }
}

/// Run-scoped state shared by every reconciler.
pub struct RunContext {
    registry: Arc<DeviceRegistry>,
    relation_mode: RelationMode,
    coordinators: DashMap<&'static str, Arc<ReconfigureCoordinator>>,
}

impl RunContext {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            relation_mode: RelationMode::default(),
            coordinators: DashMap::new(),
        }
    }

    pub fn with_relation_mode(mut self, mode: RelationMode) -> Self {
        self.relation_mode = mode;
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn relation_mode(&self) -> RelationMode {
        self.relation_mode
    }

    /// Coordinator for a reload domain, created on first use.
    pub fn coordinator(&self, endpoint: &'static ReloadEndpoint) -> Arc<ReconfigureCoordinator> {
        let entry = self
            .coordinators
            .entry(endpoint.domain)
            .or_insert_with(|| Arc::new(ReconfigureCoordinator::new(endpoint)));
        Arc::clone(entry.value())
    }

    /// Start a run: forget every dirty/errored flag from the previous one.
    pub fn begin(&self) {
        for entry in &self.coordinators {
            entry.value().reset();
        }
    }

    /// Reload every dirty device of every domain, once.
    ///
    /// Call only after all mutations of the run have completed. Calling it
    /// again finds nothing dirty and does nothing.
    pub async fn finish(&self) -> Vec<ReloadOutcome> {
        let mut coordinators: Vec<Arc<ReconfigureCoordinator>> = self
            .coordinators
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        coordinators.sort_by_key(|c| c.endpoint().domain);

        let mut outcomes = Vec::new();
        for coordinator in coordinators {
            outcomes.extend(coordinator.run(&self.registry).await);
        }
        outcomes
    }

    /// Reconcile a whole manifest: [`plan`](Self::plan), then in
    /// [`Apply`](RunMode::Apply) mode [`apply`](Self::apply).
    pub async fn reconcile(&self, batches: &[KindBatch], mode: RunMode) -> RunReport {
        let mut report = self.plan(batches).await;
        if mode == RunMode::Apply {
            self.apply(&mut report).await;
        }
        report
    }

    /// Start a run and plan every batch without touching the devices.
    ///
    /// Kinds are discovered and planned in dependency order, on every
    /// device any batch declares a resource on.
    pub async fn plan(&self, batches: &[KindBatch]) -> RunReport {
        self.begin();

        let mut ordered: Vec<&KindBatch> = batches.iter().collect();
        ordered.sort_by_key(|b| catalogue::order_of(b.kind));
        let devices = managed_devices(batches);

        let mut report = RunReport {
            mode: RunMode::DryRun,
            discovered: 0,
            plans: Vec::with_capacity(ordered.len()),
            warnings: Vec::new(),
            applied: 0,
            failures: Vec::new(),
            reloads: Vec::new(),
        };

        for batch in &ordered {
            let reconciler = Reconciler::new(batch.kind, self);
            let discovery = reconciler.discover(&devices).await;
            report.discovered += discovery.objects.len();
            report
                .plans
                .push(reconciler.plan(&batch.desired, &discovery, batch.purge));
            report.warnings.extend(discovery.warnings);
        }

        debug!(
            kinds = report.plans.len(),
            changes = report.change_count(),
            "plan ready"
        );
        report
    }

    /// Apply a planned report, then reload every dirty device once.
    ///
    /// Creates and updates run in dependency order, deletes in reverse.
    /// Individual failures are collected into the report, never fatal.
    pub async fn apply(&self, report: &mut RunReport) {
        report.mode = RunMode::Apply;

        let writes = report.plans.iter().flat_map(|p| {
            p.changes.iter().filter(|c| c.action != Action::Delete)
        });
        let deletes = report.plans.iter().rev().flat_map(|p| {
            p.changes.iter().filter(|c| c.action == Action::Delete)
        });
        let changes: Vec<&Change> = writes.chain(deletes).collect();

        let mut applied = 0;
        let mut failures = Vec::new();
        for change in changes {
            let Some(kind) = catalogue::lookup(change.kind) else {
                continue;
            };
            match Reconciler::new(kind, self).apply_change(change).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(
                        kind = change.kind,
                        action = %change.action,
                        resource = %change.key(),
                        error = %e,
                        "change failed"
                    );
                    failures.push(ChangeFailure {
                        kind: change.kind,
                        action: change.action,
                        device: change.device.clone(),
                        name: change.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.applied = applied;
        report.failures = failures;

        report.reloads = self.finish().await;
        info!(
            applied = report.applied,
            failed = report.failures.len(),
            reloads = report.reloads.len(),
            "run complete"
        );
    }
}

/// Every device any batch declares a resource on, sorted.
fn managed_devices(batches: &[KindBatch]) -> Vec<String> {
    batches
        .iter()
        .flat_map(|b| b.desired.iter().map(|r| r.device.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{HAPROXY_ACL, HAPROXY_RELOAD};
    use crate::model::AttrMap;

    #[test]
    fn managed_devices_are_unique_and_sorted() {
        let batches = vec![KindBatch {
            kind: &HAPROXY_ACL,
            desired: vec![
                DesiredResource::new("haproxy_acl", "fw02", "a", AttrMap::new()),
                DesiredResource::new("haproxy_acl", "fw01", "b", AttrMap::new()),
                DesiredResource::new("haproxy_acl", "fw02", "c", AttrMap::new()),
            ],
            purge: false,
        }];
        assert_eq!(managed_devices(&batches), vec!["fw01", "fw02"]);
    }

    #[test]
    fn coordinator_is_shared_per_domain() {
        let ctx = RunContext::new(Arc::new(DeviceRegistry::new()));
        let a = ctx.coordinator(&HAPROXY_RELOAD);
        let b = ctx.coordinator(&HAPROXY_RELOAD);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn begin_resets_previous_run() {
        let ctx = RunContext::new(Arc::new(DeviceRegistry::new()));
        ctx.coordinator(&HAPROXY_RELOAD).mark_error("fw01");
        ctx.begin();
        assert_eq!(
            ctx.coordinator(&HAPROXY_RELOAD).state("fw01"),
            crate::reconfigure::ReconfigureState::Clean
        );
    }
}
