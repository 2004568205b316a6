// ── Remote object directory ──
//
// Uniform list/fetch/create/update/delete over every kind. All the
// per-kind differences (paths, payload key, status field, identifier
// source, settings vs. collection) come from the `KindDescriptor`.

use serde_json::{Value, json};
use tracing::{debug, info};

use opnsync_api::{DeviceClient, JsonObject};

use crate::diff::wire_string;
use crate::error::CoreError;
use crate::model::{
    AttrMap, IdentifierSource, KindDescriptor, RefLookup, RemoteObject, STATUS_DELETED,
    STATUS_SAVED, Shape,
};

/// One kind on one device.
pub struct Directory<'a> {
    kind: &'static KindDescriptor,
    device: &'a str,
    client: &'a DeviceClient,
}

impl<'a> Directory<'a> {
    pub fn new(kind: &'static KindDescriptor, device: &'a str, client: &'a DeviceClient) -> Self {
        Self {
            kind,
            device,
            client,
        }
    }

    pub fn kind(&self) -> &'static KindDescriptor {
        self.kind
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Enumerate the kind's objects with their raw attributes.
    ///
    /// Rows without a name are skipped. Kinds with `detail_fetch` replace
    /// each row with the detail endpoint's attributes.
    pub async fn list(&self) -> Result<Vec<RemoteObject>, CoreError> {
        if self.kind.shape == Shape::Settings {
            return self.list_settings().await;
        }

        let rows = self.rows(self.kind.list_path).await?;
        let mut objects = Vec::with_capacity(rows.len());

        for row in rows {
            let name = row
                .get(self.kind.name_field)
                .map(wire_string)
                .unwrap_or_default();
            if name.is_empty() {
                debug!(kind = self.kind.name, device = self.device, "skipping unnamed row");
                continue;
            }
            let identifier = row
                .get(self.kind.id_field)
                .map(wire_string)
                .unwrap_or_default();

            let attrs = if self.kind.detail_fetch {
                self.fetch(&identifier).await?
            } else {
                row
            };

            objects.push(RemoteObject {
                kind: self.kind.name,
                device: self.device.to_owned(),
                identifier,
                name,
                attrs,
            });
        }

        debug!(
            kind = self.kind.name,
            device = self.device,
            count = objects.len(),
            "listed objects"
        );
        Ok(objects)
    }

    /// Detail attributes of one object (unwrapped from the payload key).
    pub async fn fetch(&self, identifier: &str) -> Result<AttrMap, CoreError> {
        let base = self.kind.fetch_path.ok_or_else(|| self.unsupported("fetch"))?;
        let path = format!("{base}/{identifier}");
        let mut body = self.get(&path).await?;

        match body.remove(self.kind.payload_key) {
            Some(Value::Object(attrs)) => Ok(attrs),
            Some(_) => Err(self.malformed(&path, "payload is not an object")),
            None => Ok(body),
        }
    }

    async fn list_settings(&self) -> Result<Vec<RemoteObject>, CoreError> {
        let mut body = self.get(self.kind.list_path).await?;
        let Some(Value::Object(attrs)) = body.remove(self.kind.payload_key) else {
            return Err(self.malformed(
                self.kind.list_path,
                &format!("missing '{}' object", self.kind.payload_key),
            ));
        };

        Ok(vec![RemoteObject {
            kind: self.kind.name,
            device: self.device.to_owned(),
            identifier: String::new(),
            name: self.device.to_owned(),
            attrs,
        }])
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create an object and return its identifier.
    ///
    /// Settings kinds always exist, so "create" writes them in place.
    pub async fn create(&self, name: &str, attrs: &AttrMap) -> Result<String, CoreError> {
        match (self.kind.shape, self.kind.identifier) {
            (Shape::Settings, _) => {
                self.update(name, "", attrs).await?;
                Ok(String::new())
            }
            (Shape::Collection, IdentifierSource::Lookup(lookup)) => {
                let identifier = self.resolve_identifier(&lookup, name).await?;
                self.update(name, &identifier, attrs).await?;
                Ok(identifier)
            }
            (Shape::Collection, IdentifierSource::Direct) => {
                let path = self.kind.add_path.ok_or_else(|| self.unsupported("create"))?;
                let body = self.post(path, &self.payload(attrs)).await?;
                self.check_status(&body, STATUS_SAVED, name, "")?;

                let identifier = body
                    .get(self.kind.id_field)
                    .map(wire_string)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        self.malformed(
                            path,
                            &format!("saved response carries no {}", self.kind.id_field),
                        )
                    })?;
                info!(
                    kind = self.kind.name,
                    device = self.device,
                    resource = name,
                    identifier = %identifier,
                    "created"
                );
                Ok(identifier)
            }
        }
    }

    /// Overwrite an object's attributes.
    pub async fn update(
        &self,
        name: &str,
        identifier: &str,
        attrs: &AttrMap,
    ) -> Result<(), CoreError> {
        let path = self.object_path(self.kind.set_path, identifier);
        let body = self.post(&path, &self.payload(attrs)).await?;
        self.check_status(&body, STATUS_SAVED, name, identifier)?;

        info!(
            kind = self.kind.name,
            device = self.device,
            resource = name,
            identifier,
            "saved"
        );
        Ok(())
    }

    /// Delete an object.
    pub async fn delete(&self, name: &str, identifier: &str) -> Result<(), CoreError> {
        let base = match self.kind.shape {
            Shape::Settings => None,
            Shape::Collection => self.kind.del_path,
        }
        .ok_or_else(|| self.unsupported("delete"))?;

        let path = self.object_path(base, identifier);
        let body = self.post(&path, &json!({})).await?;
        self.check_status(&body, STATUS_DELETED, name, identifier)?;

        info!(
            kind = self.kind.name,
            device = self.device,
            resource = name,
            identifier,
            "deleted"
        );
        Ok(())
    }

    /// Find the identifier of a lookup-keyed object by searching the
    /// sibling kind for `name`.
    pub async fn resolve_identifier(
        &self,
        lookup: &RefLookup,
        name: &str,
    ) -> Result<String, CoreError> {
        let rows = self.rows(lookup.via.list_path).await?;

        rows.iter()
            .find(|row| {
                row.get(lookup.match_field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| v == name)
            })
            .and_then(|row| row.get(lookup.ref_field))
            .map(wire_string)
            .filter(|reference| !reference.is_empty())
            .ok_or_else(|| CoreError::Lookup {
                kind: lookup.via.name.to_owned(),
                device: self.device.to_owned(),
                field: lookup.ref_field.to_owned(),
                value: name.to_owned(),
            })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn payload(&self, attrs: &AttrMap) -> Value {
        let mut payload = JsonObject::new();
        payload.insert(self.kind.payload_key.to_owned(), Value::Object(attrs.clone()));
        Value::Object(payload)
    }

    fn object_path(&self, base: &str, identifier: &str) -> String {
        if self.kind.shape == Shape::Settings || identifier.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{identifier}")
        }
    }

    /// Compare the kind's status field against `expected`, ignoring case
    /// and surrounding whitespace.
    fn check_status(
        &self,
        body: &JsonObject,
        expected: &str,
        name: &str,
        identifier: &str,
    ) -> Result<(), CoreError> {
        let accepted = body
            .get(self.kind.status_field)
            .and_then(Value::as_str)
            .is_some_and(|status| status.trim().eq_ignore_ascii_case(expected));

        if accepted {
            return Ok(());
        }

        Err(CoreError::Mutation {
            kind: self.kind.name.to_owned(),
            name: name.to_owned(),
            device: self.device.to_owned(),
            identifier: identifier.to_owned(),
            response: Value::Object(body.clone()).to_string(),
        })
    }

    async fn rows(&self, path: &str) -> Result<Vec<JsonObject>, CoreError> {
        let mut body = self.get(path).await?;
        match body.remove("rows") {
            Some(Value::Array(rows)) => Ok(rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            _ => Err(self.malformed(path, "missing 'rows' array")),
        }
    }

    async fn get(&self, path: &str) -> Result<JsonObject, CoreError> {
        self.client
            .get(path)
            .await
            .map_err(|e| CoreError::transport(self.device, e))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<JsonObject, CoreError> {
        self.client
            .post(path, body)
            .await
            .map_err(|e| CoreError::transport(self.device, e))
    }

    fn malformed(&self, path: &str, message: &str) -> CoreError {
        CoreError::MalformedResponse {
            device: self.device.to_owned(),
            path: path.to_owned(),
            message: message.to_owned(),
        }
    }

    fn unsupported(&self, operation: &str) -> CoreError {
        CoreError::Unsupported {
            kind: self.kind.name.to_owned(),
            operation: operation.to_owned(),
        }
    }
}
