// ── Core error types ──
//
// Errors surfaced by the reconciliation engine. Transport failures are
// wrapped with the device they came from; everything else names the
// kind and resource it concerns so a run report can point at it.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    /// Connectivity or authentication failure talking to a device.
    #[error("device '{device}': {source}")]
    Transport {
        device: String,
        #[source]
        source: opnsync_api::Error,
    },

    /// The device answered, but not in the shape the endpoint promises.
    #[error("device '{device}': unexpected response from {path}: {message}")]
    MalformedResponse {
        device: String,
        path: String,
        message: String,
    },

    // ── Mutation ─────────────────────────────────────────────────────
    /// The device accepted the call but did not report success.
    #[error("{kind} '{name}' on '{device}' (id '{identifier}') was rejected: {response}")]
    Mutation {
        kind: String,
        name: String,
        device: String,
        identifier: String,
        /// Raw response body, serialised.
        response: String,
    },

    // ── Lookup ───────────────────────────────────────────────────────
    /// A required cross-reference could not be resolved; nothing was sent.
    #[error("cannot resolve {kind} '{value}' on '{device}' (needed for {field})")]
    Lookup {
        kind: String,
        device: String,
        field: String,
        value: String,
    },

    // ── Inventory / catalogue ────────────────────────────────────────
    #[error("unknown device '{name}'")]
    UnknownDevice { name: String },

    #[error("unknown resource kind '{name}'")]
    UnknownKind { name: String },

    #[error("{kind} does not support {operation}")]
    Unsupported { kind: String, operation: String },
}

impl CoreError {
    /// Wrap an API error with its device.
    pub fn transport(device: &str, source: opnsync_api::Error) -> Self {
        Self::Transport {
            device: device.to_owned(),
            source,
        }
    }

    /// Whether this failure may have left the device half-configured, so
    /// its reload must be suppressed for the rest of the run.
    ///
    /// Lookup and inventory errors happen before anything is sent.
    pub fn marks_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::MalformedResponse { .. } | Self::Mutation { .. }
        )
    }

    /// Whether the underlying cause is refused credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_auth_failure())
    }

    /// Device this error concerns, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::Transport { device, .. }
            | Self::MalformedResponse { device, .. }
            | Self::Mutation { device, .. }
            | Self::Lookup { device, .. } => Some(device),
            Self::UnknownDevice { name } => Some(name),
            Self::UnknownKind { .. } | Self::Unsupported { .. } => None,
        }
    }
}
