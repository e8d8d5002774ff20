//! Error types for the mdrop library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`MdropError`]: **Fatal**. The controller cannot be set up or driven at
//!   all (bad configuration, HTTP client construction failed, event loop gone).
//!   Returned as `Err(MdropError)` from constructors and handle methods.
//!
//! * [`ConversionFailure`]: **Per submission**. The conversion request for one
//!   file did not yield an artifact. Never propagated out of the controller;
//!   its `Display` text becomes the single danger notice for that submission.
//!
//! * [`ActionError`]: **Per action**. A download or clipboard copy failed.
//!   Surfaced as a notice without changing the workflow phase.

use std::path::PathBuf;
use thiserror::Error;

/// Notice text used when a failure carries no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred";

/// Notice text for a well-formed reply without a success flag or content.
pub const EMPTY_RESPONSE_MESSAGE: &str = "Conversion failed: empty response";

/// All fatal errors returned by the mdrop library.
#[derive(Debug, Error)]
pub enum MdropError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reqwest client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The controller event loop has shut down; no further events are accepted.
    #[error("Upload controller is no longer running")]
    ControllerClosed,
}

/// Why a single submission ended in the `Failed` phase.
///
/// Variants follow the classification precedence: a non-2xx status wins over
/// everything, then an explicit `error` field, then a missing success flag or
/// empty content. Transport exceptions (connection refused, unreadable file,
/// malformed JSON) are the catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionFailure {
    /// Non-2xx HTTP status. `message` is the body's `error` field when one
    /// could be parsed, else `"Server error: <status>"`.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// 2xx reply whose body carried an explicit `error` field.
    #[error("{0}")]
    Service(String),

    /// 2xx reply missing the success flag or the markdown payload.
    #[error("Conversion failed: empty response")]
    EmptyResponse,

    /// The exchange itself failed before a reply could be interpreted.
    #[error("{0}")]
    Transport(String),
}

impl ConversionFailure {
    /// Build a [`ConversionFailure::Transport`] from any error, substituting
    /// the generic message when the error renders as an empty string.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            ConversionFailure::Transport(GENERIC_FAILURE_MESSAGE.to_string())
        } else {
            ConversionFailure::Transport(message)
        }
    }

    /// Build the generic status message used when the body is unusable.
    pub fn generic_status(status: u16) -> Self {
        ConversionFailure::Status {
            status,
            message: format!("Server error: {status}"),
        }
    }
}

/// A failed artifact action (download or copy).
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action was requested but no successful conversion is bound.
    #[error("No converted document is available")]
    NoArtifact,

    /// The clipboard mechanism in use raised an error.
    #[error("{0}")]
    Clipboard(String),

    /// Writing the downloaded artifact failed.
    #[error("Failed to write '{path}': {source}")]
    Download {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
