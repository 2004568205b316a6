// ── Device registry ──
//
// Turns a device name into an authenticated client. Clients are built
// lazily on first use and cached for the lifetime of the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use url::Url;

use opnsync_api::{ApiCredentials, DeviceClient, TransportConfig};

use crate::error::CoreError;

/// Connection settings for one appliance.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub url: Url,
    /// `None` sends unauthenticated requests (mock servers, tests).
    pub credentials: Option<ApiCredentials>,
    pub transport: TransportConfig,
}

impl DeviceConfig {
    pub fn new(url: Url, credentials: Option<ApiCredentials>) -> Self {
        Self {
            url,
            credentials,
            transport: TransportConfig::default(),
        }
    }

    fn connect(&self) -> Result<DeviceClient, opnsync_api::Error> {
        match &self.credentials {
            Some(creds) => DeviceClient::new(self.url.clone(), creds.clone(), &self.transport),
            None => Ok(DeviceClient::with_client(
                self.transport.build_client()?,
                self.url.clone(),
                None,
            )),
        }
    }
}

/// Every configured device, by name.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceConfig>,
    clients: DashMap<String, Arc<DeviceClient>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a device.
    pub fn insert(&mut self, name: impl Into<String>, config: DeviceConfig) {
        let name = name.into();
        self.clients.remove(&name);
        self.devices.insert(name, config);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_device(mut self, name: impl Into<String>, config: DeviceConfig) -> Self {
        self.insert(name, config);
        self
    }

    /// Configured device names, sorted.
    pub fn device_names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn config(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.get(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Authenticated client for `name`, built on first request.
    pub fn client_for(&self, name: &str) -> Result<Arc<DeviceClient>, CoreError> {
        if let Some(client) = self.clients.get(name) {
            return Ok(Arc::clone(client.value()));
        }

        let config = self
            .devices
            .get(name)
            .ok_or_else(|| CoreError::UnknownDevice { name: name.into() })?;

        let client = self
            .clients
            .entry(name.to_owned())
            .or_try_insert_with(|| {
                debug!(device = name, url = %config.url, "building device client");
                config.connect().map(Arc::new)
            })
            .map_err(|e| CoreError::transport(name, e))?;

        Ok(Arc::clone(client.value()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new()
            .with_device(
                "fw02",
                DeviceConfig::new(Url::parse("https://192.0.2.2").unwrap(), None),
            )
            .with_device(
                "fw01",
                DeviceConfig::new(
                    Url::parse("https://192.0.2.1").unwrap(),
                    Some(ApiCredentials::new("k", "s")),
                ),
            )
    }

    #[test]
    fn names_are_sorted() {
        assert_eq!(registry().device_names(), vec!["fw01", "fw02"]);
    }

    #[test]
    fn client_is_built_once_and_cached() {
        let reg = registry();
        let a = reg.client_for("fw01").unwrap();
        let b = reg.client_for("fw01").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.base_url().as_str(), "https://192.0.2.1/");
    }

    #[test]
    fn unknown_device_is_an_error() {
        let err = registry().client_for("fw99").err().unwrap();
        assert!(matches!(err, CoreError::UnknownDevice { ref name } if name == "fw99"));
    }
}
