// ── Reconfigure coordinator ──
//
// Saving an object only writes configuration; the service picks it up
// on reload. Mutations mark their device, and one `run()` per run issues
// a single reload per dirty device. A device with any failed mutation
// is never reloaded in that run.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::device::DeviceRegistry;
use crate::error::CoreError;
use crate::model::ReloadEndpoint;

/// Per-device state within one run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconfigureState {
    #[default]
    Clean,
    Dirty,
    /// Terminal for the run.
    Errored,
}

/// Result of one reload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub domain: &'static str,
    pub device: String,
    /// `None` on success, the failure message otherwise.
    pub error: Option<String>,
}

impl ReloadOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Reload bookkeeping for one reconfigure domain.
pub struct ReconfigureCoordinator {
    endpoint: &'static ReloadEndpoint,
    states: DashMap<String, ReconfigureState>,
}

impl ReconfigureCoordinator {
    pub fn new(endpoint: &'static ReloadEndpoint) -> Self {
        Self {
            endpoint,
            states: DashMap::new(),
        }
    }

    pub fn endpoint(&self) -> &'static ReloadEndpoint {
        self.endpoint
    }

    /// Current state of `device` (clean if never marked).
    pub fn state(&self, device: &str) -> ReconfigureState {
        self.states.get(device).map(|s| *s).unwrap_or_default()
    }

    /// Record that `device` needs a reload. No effect on errored devices.
    pub fn mark(&self, device: &str) {
        let mut state = self.states.entry(device.to_owned()).or_default();
        if *state == ReconfigureState::Clean {
            debug!(domain = self.endpoint.domain, device, "marked for reload");
            *state = ReconfigureState::Dirty;
        }
    }

    /// Record that a mutation on `device` failed. Sticky for the run.
    pub fn mark_error(&self, device: &str) {
        let previous = self
            .states
            .insert(device.to_owned(), ReconfigureState::Errored);
        if previous != Some(ReconfigureState::Errored) {
            warn!(
                domain = self.endpoint.domain,
                device, "mutation failed, reload suppressed for this run"
            );
        }
    }

    /// Forget all state. Called at the start of every run.
    pub fn reset(&self) {
        self.states.clear();
    }

    /// Reload every dirty device once.
    ///
    /// Successful devices become clean; failed ones become errored, so a
    /// repeated `run()` in the same run does nothing. Failures are returned
    /// per device and never stop the remaining reloads.
    pub async fn run(&self, registry: &DeviceRegistry) -> Vec<ReloadOutcome> {
        let mut dirty: Vec<String> = self
            .states
            .iter()
            .filter(|entry| *entry.value() == ReconfigureState::Dirty)
            .map(|entry| entry.key().clone())
            .collect();
        dirty.sort();

        let mut outcomes = Vec::with_capacity(dirty.len());
        for device in dirty {
            let result = self.reload(registry, &device).await;
            let next = match &result {
                Ok(()) => {
                    info!(domain = self.endpoint.domain, device = %device, "reloaded");
                    ReconfigureState::Clean
                }
                Err(e) => {
                    warn!(domain = self.endpoint.domain, device = %device, error = %e, "reload failed");
                    ReconfigureState::Errored
                }
            };
            self.states.insert(device.clone(), next);
            outcomes.push(ReloadOutcome {
                domain: self.endpoint.domain,
                device,
                error: result.err().map(|e| e.to_string()),
            });
        }
        outcomes
    }

    async fn reload(&self, registry: &DeviceRegistry, device: &str) -> Result<(), CoreError> {
        let client = registry.client_for(device)?;
        let body = client
            .post(self.endpoint.path, &json!({}))
            .await
            .map_err(|e| CoreError::transport(device, e))?;

        let accepted = body
            .get(self.endpoint.status_field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(self.endpoint.expected));

        if accepted {
            Ok(())
        } else {
            Err(CoreError::Mutation {
                kind: format!("{} reload", self.endpoint.domain),
                name: self.endpoint.path.to_owned(),
                device: device.to_owned(),
                identifier: String::new(),
                response: Value::Object(body).to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::HAPROXY_RELOAD;

    #[test]
    fn mark_is_idempotent() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        c.mark("fw01");
        c.mark("fw01");
        assert_eq!(c.state("fw01"), ReconfigureState::Dirty);
    }

    #[test]
    fn error_overrides_dirty() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        c.mark("fw01");
        c.mark_error("fw01");
        assert_eq!(c.state("fw01"), ReconfigureState::Errored);
    }

    #[test]
    fn error_is_sticky() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        c.mark_error("fw01");
        c.mark("fw01");
        assert_eq!(c.state("fw01"), ReconfigureState::Errored);
    }

    #[test]
    fn unmarked_device_is_clean() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        assert_eq!(c.state("fw02"), ReconfigureState::Clean);
    }

    #[test]
    fn reset_clears_everything() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        c.mark("fw01");
        c.mark_error("fw02");
        c.reset();
        assert_eq!(c.state("fw01"), ReconfigureState::Clean);
        assert_eq!(c.state("fw02"), ReconfigureState::Clean);
    }

    #[tokio::test]
    async fn run_without_dirty_devices_does_nothing() {
        let c = ReconfigureCoordinator::new(&HAPROXY_RELOAD);
        c.mark_error("fw01");
        // Empty registry: any reload attempt would fail with UnknownDevice.
        let outcomes = c.run(&DeviceRegistry::new()).await;
        assert!(outcomes.is_empty());
    }
}
