// Error types shared by the collectors, the configuration store and the
// HTTP client.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing path, manifest or artifact file. Raised before any upload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Credentials unset or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The server does not know this artifact type short name.
    #[error("unknown artifact type: {0}")]
    UnknownArtifactType(String),

    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    /// Interactive selection out of range or not a number.
    #[error("invalid choice: {0}")]
    InvalidChoice(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

