//! Reconciliation engine between declared resources and OPNsense devices.
//!
//! This crate owns everything between the HTTP client in `opnsync-api`
//! and the manifest/CLI layers:
//!
//! - **[`Directory`]**: uniform list/fetch/create/update/delete over every
//!   object kind, driven by a static [`KindDescriptor`] (payload key, status
//!   field, identifier source, settings vs. collection).
//!
//! - **[`RelationResolver`]**: translates relation fields between the
//!   human names used in manifests and the opaque identifiers the device
//!   stores, including comma-joined multi-references.
//!
//! - **[`selection::normalize`]**: collapses `{key: {value, selected}}`
//!   selection maps to the comma-joined form accepted on write.
//!
//! - **[`ReconfigureCoordinator`]**: per reload domain, tracks which
//!   devices are dirty or errored and reloads each dirty device exactly once.
//!
//! - **[`Reconciler`]** / **[`RunContext`]**: discover, diff, mutate and
//!   coordinate one kind, or a whole manifest, within an explicit run scope.

pub mod catalogue;
pub mod device;
pub mod diff;
pub mod directory;
pub mod driver;
pub mod error;
pub mod model;
pub mod reconfigure;
pub mod relation;
pub mod run;
pub mod selection;

// ── Primary re-exports ──────────────────────────────────────────────
pub use device::{DeviceConfig, DeviceRegistry};
pub use diff::FieldChange;
pub use directory::Directory;
pub use driver::{Action, Change, Discovery, DiscoveryWarning, Plan, Reconciler};
pub use error::CoreError;
pub use reconfigure::{ReconfigureCoordinator, ReconfigureState, ReloadOutcome};
pub use relation::{RelationMode, RelationResolver};
pub use run::{ChangeFailure, KindBatch, RunContext, RunMode, RunReport};

pub use model::{
    AttrMap, Cardinality, DesiredResource, Ensure, KindDescriptor, RelationField, ReloadEndpoint,
    RemoteObject, ResourceKey, Shape,
};
