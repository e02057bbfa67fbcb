//! Common error types for the Strata volume manager.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`StrataError`].
pub type StrataResult<T> = Result<T, StrataError>;

/// Errors raised by volume lifecycle operations.
///
/// Precondition variants are always raised before any side effect. The
/// backend, service and provision variants may leave partial state behind.
#[derive(Error, Diagnostic, Debug)]
pub enum StrataError {
    /// The path is already backed by a volume.
    #[error("Path is already a volume: {}", path.display())]
    #[diagnostic(
        code(strata::volume::exists),
        help("Use `strata volume attach` to re-attach an existing volume")
    )]
    AlreadyVolume {
        /// The offending path.
        path: PathBuf,
    },

    /// The path is not backed by a volume.
    #[error("Path is no volume: {}", path.display())]
    #[diagnostic(
        code(strata::volume::not_found),
        help("Run `strata volume list` to see all managed volumes")
    )]
    NotVolume {
        /// The offending path.
        path: PathBuf,
    },

    /// The path is not absolute.
    #[error("An absolute path is required: {}", path.display())]
    #[diagnostic(code(strata::path::relative))]
    RelativePath {
        /// The offending path.
        path: PathBuf,
    },

    /// The path is not a directory on the live filesystem.
    #[error("Is no dir: {}", path.display())]
    #[diagnostic(code(strata::path::not_a_directory))]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// The path cannot be represented in a target namespace.
    #[error("Invalid volume path {}: {reason}", path.display())]
    #[diagnostic(
        code(strata::path::invalid),
        help(
            "Path components may contain ASCII letters, digits, '_', '.' and '-', \
             must not start with '.' or '-' and must not end with '-'"
        )
    )]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// An identifier was not produced by the name codec.
    #[error("Invalid {namespace} identifier: {identifier}")]
    #[diagnostic(code(strata::codec::invalid_identifier))]
    InvalidIdentifier {
        /// The namespace the identifier was decoded in.
        namespace: String,
        /// The identifier that failed to decode.
        identifier: String,
    },

    /// Invalid volume size format.
    #[error("Invalid volume size: {value}")]
    #[diagnostic(
        code(strata::size::invalid),
        help("Use formats like '4096' (MiB), '512m', '10g', '2Gi' or '500M'")
    )]
    InvalidSize {
        /// The invalid value.
        value: String,
    },

    /// The storage backend rejected an operation.
    #[error("Storage backend failed to {operation}: {message}")]
    #[diagnostic(code(strata::backend))]
    Backend {
        /// The backend operation that failed.
        operation: String,
        /// Backend diagnostic output.
        message: String,
    },

    /// The init system rejected an operation.
    #[error("Service manager failed to {operation} {unit}: {message}")]
    #[diagnostic(code(strata::service))]
    Service {
        /// The service operation that failed.
        operation: String,
        /// The unit the operation targeted (empty for reloads).
        unit: String,
        /// Service manager diagnostic output.
        message: String,
    },

    /// Formatting or populating a new volume failed.
    #[error("Failed to provision {}: {message}", device.display())]
    #[diagnostic(code(strata::provision))]
    Provision {
        /// The device being provisioned.
        device: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An external command could not be executed at all.
    #[error("Failed to execute {program}: {source}")]
    #[diagnostic(
        code(strata::command),
        help("Make sure the program is installed and in PATH")
    )]
    Command {
        /// The program that failed to spawn.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the volume lock.
    #[error("Another volume operation is in progress (lock: {})", path.display())]
    #[diagnostic(
        code(strata::locked),
        help("Wait for the running operation to finish and try again")
    )]
    Locked {
        /// The lock file.
        path: PathBuf,
    },

    /// No handler is connected to a hook event.
    #[error("Unknown hook event: {event}")]
    #[diagnostic(code(strata::hook::unknown_event))]
    UnknownEvent {
        /// The event name.
        event: String,
    },

    /// A hook event carried the wrong parameters.
    #[error("Invalid parameters for hook event {event}: {message}")]
    #[diagnostic(code(strata::hook::invalid_params))]
    InvalidEventParams {
        /// The event name.
        event: String,
        /// What was wrong with the parameters.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(strata::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(strata::serialization))]
    Serialization(String),

    /// Permission denied.
    #[error("Permission denied: {operation}")]
    #[diagnostic(
        code(strata::permission_denied),
        help("Try running with elevated privileges (sudo)")
    )]
    PermissionDenied {
        /// The operation that was denied.
        operation: String,
    },

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(code(strata::unsupported), help("Volume management requires Linux"))]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(strata::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl StrataError {
    /// Whether this error was raised before any side effect took place.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyVolume { .. }
                | Self::NotVolume { .. }
                | Self::RelativePath { .. }
                | Self::NotADirectory { .. }
                | Self::InvalidPath { .. }
        )
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Config {
            message: err.to_string(),
        }
    }
}
