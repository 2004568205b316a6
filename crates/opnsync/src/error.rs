//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use opnsync_config::ConfigError;
use opnsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PARTIAL: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach device '{device}'")]
    #[diagnostic(
        code(opnsync::connection_failed),
        help(
            "Check that the appliance is up and its API is reachable.\n\
             Try: opnsync list trust_ca --device {device} -vv"
        )
    )]
    ConnectionFailed {
        device: String,
        #[source]
        source: opnsync_api::Error,
    },

    #[error("TLS setup failed for device '{device}': {message}")]
    #[diagnostic(
        code(opnsync::tls_error),
        help(
            "Point ca_cert at the appliance's CA bundle, or set insecure = true\n\
             for self-signed appliances."
        )
    )]
    TlsError { device: String, message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed for device '{device}'")]
    #[diagnostic(
        code(opnsync::auth_failed),
        help(
            "Verify the API key and secret (System > Access > Users on the appliance)\n\
             and that the user has the privileges the resource kind needs."
        )
    )]
    AuthFailed { device: String },

    #[error("No {what} configured for device '{device}'")]
    #[diagnostic(
        code(opnsync::no_credentials),
        help(
            "Set api_key_env / api_secret_env in the device entry, store the value\n\
             in the system keyring under service 'opnsync', entry '{device}/{what}',\n\
             or put it in the config file as api_key / api_secret."
        )
    )]
    NoCredentials { device: String, what: String },

    // ── Inventory / catalogue ────────────────────────────────────────

    #[error("Unknown device '{name}'")]
    #[diagnostic(
        code(opnsync::unknown_device),
        help("Run: opnsync devices to see configured devices")
    )]
    UnknownDevice { name: String },

    #[error("Unknown resource kind '{name}'")]
    #[diagnostic(
        code(opnsync::unknown_kind),
        help("Run: opnsync kinds to see supported kinds")
    )]
    UnknownKind { name: String },

    #[error("No devices configured")]
    #[diagnostic(
        code(opnsync::no_devices),
        help(
            "Add a [devices.<name>] table to the inventory.\n\
             Expected at: {path}"
        )
    )]
    NoDevices { path: String },

    #[error("Cannot resolve {kind} '{identifier}' on '{device}'")]
    #[diagnostic(
        code(opnsync::not_found),
        help("Run: opnsync list {kind} --device {device}")
    )]
    NotFound {
        kind: String,
        identifier: String,
        device: String,
    },

    // ── Device responses ─────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(opnsync::api_error))]
    Api { message: String },

    #[error("{kind} does not support {operation}")]
    #[diagnostic(code(opnsync::unsupported))]
    Unsupported { kind: String, operation: String },

    // ── Run outcome ──────────────────────────────────────────────────

    #[error("{failed} of {total} operations failed")]
    #[diagnostic(
        code(opnsync::partial_failure),
        help("Devices with a failed change were not reloaded. Fix the errors above and re-run.")
    )]
    PartialFailure { failed: usize, total: usize },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(opnsync::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid manifest: {message}")]
    #[diagnostic(
        code(opnsync::manifest),
        help("Each resource needs a known kind and a name@device title (or name + device).")
    )]
    Manifest { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration could not be loaded: {message}")]
    #[diagnostic(code(opnsync::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(opnsync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::UnknownDevice { .. } | Self::UnknownKind { .. } | Self::NotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::PartialFailure { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::Manifest { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport { device, source } => match source {
                opnsync_api::Error::Authentication { .. } => CliError::AuthFailed { device },
                opnsync_api::Error::Tls(message) => CliError::TlsError { device, message },
                source => CliError::ConnectionFailed { device, source },
            },

            CoreError::Lookup {
                kind,
                device,
                value,
                ..
            } => CliError::NotFound {
                kind,
                identifier: value,
                device,
            },

            CoreError::UnknownDevice { name } => CliError::UnknownDevice { name },

            CoreError::UnknownKind { name } => CliError::UnknownKind { name },

            CoreError::Unsupported { kind, operation } => {
                CliError::Unsupported { kind, operation }
            }

            err @ (CoreError::MalformedResponse { .. } | CoreError::Mutation { .. }) => {
                CliError::Api {
                    message: err.to_string(),
                }
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },

            ConfigError::NoCredentials { device, what } => CliError::NoCredentials {
                device,
                what: what.into(),
            },

            ConfigError::UnknownDevice { name } => CliError::UnknownDevice { name },

            ConfigError::Io(e) => CliError::Io(e),

            err @ (ConfigError::ManifestParse { .. } | ConfigError::InvalidResource { .. }) => {
                CliError::Manifest {
                    message: err.to_string(),
                }
            }

            ConfigError::Figment(e) => CliError::Config {
                message: e.to_string(),
            },
        }
    }
}
