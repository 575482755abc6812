//! Error types for the ocrview library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrViewError`]: **Fatal**: the library cannot do anything useful
//!   (invalid configuration, HTTP client could not be built, rendered output
//!   could not be written). Returned from constructors and the one-shot
//!   `recognize*` helpers.
//!
//! * [`UploadError`]: **Non-fatal**: a single submission failed. It is
//!   stored in [`crate::state::UploadState::error`] so the interface stays
//!   usable; the user simply submits again. Nothing is retried automatically.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocrview library.
#[derive(Debug, Error)]
pub enum OcrViewError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Submission errors ─────────────────────────────────────────────────
    /// A one-shot submission failed; see [`UploadError`] for the category.
    #[error(transparent)]
    Upload(#[from] UploadError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the rendered output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single submission.
///
/// Every variant carries a user-facing message through `Display`; the
/// interface shows it verbatim in its error banner.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadError {
    /// The file is missing, empty, too large, or not an image. Raised before
    /// any request is sent.
    #[error("{reason}")]
    Validation { reason: String },

    /// The request never produced a response (connection refused, reset, DNS).
    #[error("Network error: {detail}")]
    Transport { detail: String },

    /// No response arrived within the configured request timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-2xx status.
    #[error("HTTP error! status: {status}{}", detail_suffix(.detail))]
    Protocol { status: u16, detail: Option<String> },

    /// The service answered 2xx but reported an error in the body.
    #[error("{message}")]
    Logical { message: String },

    /// The body was not JSON or did not have the expected shape.
    #[error("Error processing image: {detail}")]
    MalformedResponse { detail: String },

    /// Rejected because another submission is in flight
    /// ([`crate::config::OverlapPolicy::RejectWhileBusy`]).
    #[error("A submission is already in progress")]
    Busy,

    /// Cancelled because a newer submission started
    /// ([`crate::config::OverlapPolicy::CancelPrevious`]).
    #[error("Superseded by a newer submission")]
    Superseded,
}

/// Coarse classification of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Protocol,
    Logical,
    MalformedResponse,
    /// `Busy` and `Superseded`: outcomes of the overlap policy, never shown
    /// in the error banner.
    Concurrency,
}

impl UploadError {
    /// Message shown when a dropped or picked file is not an image.
    pub const NOT_AN_IMAGE: &'static str = "Please upload an image file";

    /// Convenience constructor for [`UploadError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        UploadError::Validation {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Validation { .. } => ErrorKind::Validation,
            UploadError::Transport { .. } | UploadError::Timeout { .. } => ErrorKind::Transport,
            UploadError::Protocol { .. } => ErrorKind::Protocol,
            UploadError::Logical { .. } => ErrorKind::Logical,
            UploadError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            UploadError::Busy | UploadError::Superseded => ErrorKind::Concurrency,
        }
    }

    /// Whether this outcome belongs in the visible error state.
    pub fn is_reportable(&self) -> bool {
        self.kind() != ErrorKind::Concurrency
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}
