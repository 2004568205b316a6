// ── Relation resolver ──
//
// Manifests reference other objects by name; the appliance stores
// opaque identifiers. Reads are rewritten id -> name, writes name -> id.
// Each target kind is listed at most once per resolver, so callers
// create one resolver per batch of translations that may share a cache.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use opnsync_api::DeviceClient;

use crate::diff::wire_string;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::model::{AttrMap, Cardinality, KindDescriptor, RelationField};

/// What to do with a name that matches no remote object on write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RelationMode {
    /// Send it unchanged and let the appliance reject it.
    #[default]
    PassThrough,
    /// Fail with a lookup error before anything is sent.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToNames,
    ToIdentifiers,
}

/// `(reference, name)` pairs of one target kind, in listing order.
#[derive(Debug, Default)]
struct RefIndex {
    entries: Vec<(String, String)>,
}

impl RefIndex {
    fn name_of(&self, reference: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(r, _)| r == reference)
            .map(|(_, n)| n.as_str())
    }

    fn reference_of(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, n)| n == name)
            .map(|(r, _)| r.as_str())
    }
}

/// Translates relation fields for one device.
pub struct RelationResolver<'a> {
    device: &'a str,
    client: &'a DeviceClient,
    mode: RelationMode,
    indexes: HashMap<&'static str, RefIndex>,
}

impl<'a> RelationResolver<'a> {
    pub fn new(device: &'a str, client: &'a DeviceClient) -> Self {
        Self {
            device,
            client,
            mode: RelationMode::default(),
            indexes: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: RelationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Rewrite stored identifiers to the referenced objects' names.
    ///
    /// Identifiers that match nothing are kept as they are.
    pub async fn translate_to_names(
        &mut self,
        relations: &[RelationField],
        attrs: &AttrMap,
    ) -> Result<AttrMap, CoreError> {
        self.translate(relations, attrs, Direction::ToNames).await
    }

    /// Rewrite declared names to device identifiers before a write.
    ///
    /// Unknown names pass through unless the resolver is
    /// [`Strict`](RelationMode::Strict).
    pub async fn translate_to_uuids(
        &mut self,
        relations: &[RelationField],
        attrs: &AttrMap,
    ) -> Result<AttrMap, CoreError> {
        self.translate(relations, attrs, Direction::ToIdentifiers)
            .await
    }

    async fn translate(
        &mut self,
        relations: &[RelationField],
        attrs: &AttrMap,
        direction: Direction,
    ) -> Result<AttrMap, CoreError> {
        let present: Vec<&RelationField> = relations
            .iter()
            .filter(|rel| matches!(attrs.get(rel.field), Some(Value::String(_))))
            .collect();

        for rel in &present {
            self.load(rel.target).await?;
        }

        let mut out = attrs.clone();
        for rel in present {
            let (Some(Value::String(raw)), Some(index)) =
                (attrs.get(rel.field), self.indexes.get(rel.target.name))
            else {
                continue;
            };

            let translated = match rel.cardinality {
                Cardinality::Single => self.translate_one(index, rel, raw, direction)?,
                Cardinality::Multiple => raw
                    .split(',')
                    .map(|part| self.translate_one(index, rel, part.trim(), direction))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(","),
            };
            out.insert(rel.field.to_owned(), Value::String(translated));
        }

        Ok(out)
    }

    fn translate_one(
        &self,
        index: &RefIndex,
        rel: &RelationField,
        value: &str,
        direction: Direction,
    ) -> Result<String, CoreError> {
        if value.is_empty() {
            return Ok(String::new());
        }

        let resolved = match direction {
            Direction::ToNames => index.name_of(value),
            Direction::ToIdentifiers => index.reference_of(value),
        };

        match resolved {
            Some(v) => Ok(v.to_owned()),
            None if direction == Direction::ToIdentifiers && self.mode == RelationMode::Strict => {
                Err(CoreError::Lookup {
                    kind: rel.target.name.to_owned(),
                    device: self.device.to_owned(),
                    field: rel.field.to_owned(),
                    value: value.to_owned(),
                })
            }
            None => {
                if direction == Direction::ToIdentifiers {
                    warn!(
                        device = self.device,
                        field = rel.field,
                        target = rel.target.name,
                        value,
                        "relation name not found, sending unchanged"
                    );
                }
                Ok(value.to_owned())
            }
        }
    }

    /// List `target` once and remember its references.
    async fn load(&mut self, target: &'static KindDescriptor) -> Result<(), CoreError> {
        if self.indexes.contains_key(target.name) {
            return Ok(());
        }

        let objects = Directory::new(target, self.device, self.client)
            .list()
            .await?;
        let entries = objects
            .into_iter()
            .map(|obj| {
                let reference = obj
                    .attrs
                    .get(target.ref_field)
                    .map(wire_string)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(obj.identifier);
                (reference, obj.name)
            })
            .collect::<Vec<_>>();

        debug!(
            device = self.device,
            target = target.name,
            count = entries.len(),
            "relation index loaded"
        );
        self.indexes.insert(target.name, RefIndex { entries });
        Ok(())
    }
}
