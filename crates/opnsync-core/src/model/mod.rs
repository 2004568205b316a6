// ── Domain model ──

pub mod kind;
pub mod resource;

pub use kind::{
    Cardinality, IdentifierSource, KindDescriptor, RefLookup, RelationField, ReloadEndpoint,
    STATUS_DELETED, STATUS_SAVED, Shape,
};
pub use resource::{AttrMap, DesiredResource, Ensure, RemoteObject, ResourceKey};
