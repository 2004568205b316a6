// opnsync-api: Async Rust client for the OPNsense management API

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiCredentials, DeviceClient, JsonObject};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
