//! Error types for gcp-base-hook
//!
//! Every failure is fatal to the current operation and surfaces to the caller
//! as a typed `HookError`. Nothing is retried or partially recovered.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while resolving credentials or authorizing requests.
#[derive(Error, Debug)]
pub enum HookError {
    /// A legacy `.p12` key file was supplied where a JSON key is required.
    #[error("Legacy P12 key files are not supported, use a JSON key file")]
    UnsupportedKeyFormat,

    /// The key file path has neither a `.json` nor a `.p12` extension.
    #[error("Unrecognised extension for key file: {0}")]
    UnrecognizedKeyFileExtension(String),

    /// Key material failed to parse as JSON.
    #[error("Invalid key JSON: {0}")]
    InvalidKeyJson(String),

    /// Key material parsed as JSON but is not a usable service account key.
    #[error("Malformed service account key: {0}")]
    MalformedServiceAccount(String),

    /// The key file could not be read from disk.
    #[error("Failed to read key file {path}: {source}")]
    KeyFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No project id was passed and the connection defines none.
    #[error(
        "The project id must be passed either as the project_id parameter or as the project extra \
         of the connection. Both are not set"
    )]
    MissingProjectId,

    /// A project-scoped operation was invoked with positional arguments.
    #[error("Use keyword arguments when invoking an operation that falls back to the default project id")]
    PositionalArgumentRejected,

    /// An argument had an unexpected shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection registry has no connection with this id.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Stored connection configuration could not be interpreted.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Ambient discovery found neither a key file nor a metadata server.
    #[error("Could not automatically determine credentials: {0}")]
    AmbientCredentialsUnavailable(String),

    /// The credentials cannot act on behalf of another identity.
    #[error("Credentials of kind {0} do not support subject impersonation")]
    ImpersonationUnsupported(&'static str),

    /// A header name or value could not be built.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Signing the JWT assertion failed.
    #[error("Failed to sign JWT assertion: {0}")]
    TokenSigning(String),

    /// The token endpoint answered with a non-success status.
    #[error("Token endpoint returned status {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// A response body could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Writing or exporting a transient credential file failed.
    #[error("Credential file error: {0}")]
    CredentialFile(#[source] std::io::Error),

    /// Telemetry initialization error
    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),
}

/// Result type for gcp-base-hook operations
pub type Result<T> = std::result::Result<T, HookError>;

impl From<reqwest::Error> for HookError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
