// ── Kind descriptors ──
//
// One static descriptor per remote object kind. The generic Directory,
// Relation Resolver and Reconciler read everything kind-specific from
// here: endpoint paths, payload key, status field and relation table.

use std::fmt;

use serde::Serialize;

/// Status verb a successful create/update must answer with.
pub const STATUS_SAVED: &str = "saved";
/// Status verb a successful delete must answer with.
pub const STATUS_DELETED: &str = "deleted";

/// How many references a relation field holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Cardinality {
    /// One identifier.
    Single,
    /// Comma-joined list of identifiers.
    Multiple,
}

/// An attribute that points at objects of another kind.
#[derive(Clone, Copy)]
pub struct RelationField {
    pub field: &'static str,
    pub target: &'static KindDescriptor,
    pub cardinality: Cardinality,
}

impl fmt::Debug for RelationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationField")
            .field("field", &self.field)
            .field("target", &self.target.name)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// Whether a kind is a list of named objects or one settings object per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Shape {
    Collection,
    /// Exactly one object per device, named after the device. Can be
    /// updated but never created or deleted.
    Settings,
}

/// Where the identifier for create/update/delete comes from.
#[derive(Debug, Clone, Copy)]
pub enum IdentifierSource {
    /// The add endpoint assigns it and list rows carry it in `id_field`.
    Direct,
    /// The object is keyed by a reference on a sibling kind, found by
    /// searching that kind's list for the resource name.
    Lookup(RefLookup),
}

/// Two-step identifier resolution through a sibling list endpoint.
#[derive(Clone, Copy)]
pub struct RefLookup {
    pub via: &'static KindDescriptor,
    /// Field of the sibling rows compared against the resource name.
    pub match_field: &'static str,
    /// Field of the matching row holding the identifier.
    pub ref_field: &'static str,
}

impl fmt::Debug for RefLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefLookup")
            .field("via", &self.via.name)
            .field("match_field", &self.match_field)
            .field("ref_field", &self.ref_field)
            .finish()
    }
}

/// Device-side "apply configuration" call. Kinds sharing an endpoint
/// share a reconfigure domain and therefore a single reload per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReloadEndpoint {
    pub domain: &'static str,
    pub path: &'static str,
    pub status_field: &'static str,
    pub expected: &'static str,
}

/// Static description of one remote object kind.
#[derive(Debug)]
pub struct KindDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub shape: Shape,

    /// Enumeration endpoint (`{"rows": [...]}`), or the settings getter.
    pub list_path: &'static str,
    /// Detail endpoint, called per row when `detail_fetch` is set.
    pub fetch_path: Option<&'static str>,
    pub detail_fetch: bool,
    pub add_path: Option<&'static str>,
    pub set_path: &'static str,
    pub del_path: Option<&'static str>,

    /// Key the attribute map is wrapped under in mutation payloads.
    pub payload_key: &'static str,
    /// Field of mutation responses carrying the status verb.
    pub status_field: &'static str,
    /// Field of list rows carrying the identifier.
    pub id_field: &'static str,
    /// Field other kinds store when they reference this one.
    pub ref_field: &'static str,
    /// Human identity field, matched against resource names.
    pub name_field: &'static str,

    pub identifier: IdentifierSource,
    pub relations: &'static [RelationField],
    pub reload: Option<&'static ReloadEndpoint>,
}

impl KindDescriptor {
    pub fn is_settings(&self) -> bool {
        self.shape == Shape::Settings
    }

    /// Relation descriptor for `field`, if it is one.
    pub fn relation(&self, field: &str) -> Option<&RelationField> {
        self.relations.iter().find(|r| r.field == field)
    }
}

impl fmt::Display for KindDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for KindDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for KindDescriptor {}
