//! Error types for the pdf-toolkit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ToolkitError`] is **run-level**: the run cannot complete (bad input,
//!   missing parameter, backend refusal, archive failure). The orchestrator
//!   converts it into a single `Error` state with [`ToolkitError::user_message`].
//!
//! * [`RenderFailure`] is **page-level**: one page could not be rasterised.
//!   Thumbnail and preview generation skip such pages; full export wraps it
//!   in [`ToolkitError::Render`] and aborts.
//!
//! [`ToolkitError::Cancelled`] is not a failure: the orchestrator routes it to
//! `Idle`, never to `Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown whenever the backend reports it is overloaded or contended.
pub const SERVER_BUSY_MESSAGE: &str =
    "The server is busy right now. Please wait a moment and try again.";

/// Message shown when the backend fails without an explanatory body.
pub const GENERIC_SERVER_MESSAGE: &str = "Server processing failed.";

/// All run-level errors returned by the pdf-toolkit library.
#[derive(Debug, Error)]
pub enum ToolkitError {
    // ── Validation ────────────────────────────────────────────────────────
    /// Missing or malformed input file or parameter. Raised before any
    /// rasterisation or network work begins.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    // ── Processing errors ─────────────────────────────────────────────────
    /// A page could not be rasterised during a full export.
    #[error(transparent)]
    Render(#[from] RenderFailure),

    /// The remote conversion backend could not be reached or refused the job.
    #[error(transparent)]
    Network(#[from] NetworkFailure),

    /// Archive serialisation failed.
    #[error("Failed to build archive: {0}")]
    Packaging(String),

    /// The user cancelled the run. Not a failure.
    #[error("Run cancelled")]
    Cancelled,

    /// A run was started while another one is still processing.
    #[error("A run is already in progress")]
    RunInProgress,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the downloaded artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install pdfium system-wide.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolkitError {
    /// `true` for the user-initiated cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ToolkitError::Cancelled)
    }

    /// The single human-readable line shown in the `Error` state.
    ///
    /// Never exposes status codes, stack traces or transport internals.
    pub fn user_message(&self) -> String {
        match self {
            ToolkitError::Validation(msg) => msg.clone(),
            ToolkitError::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            }
            ToolkitError::PermissionDenied { path } => {
                format!("Cannot read {}", path.display())
            }
            ToolkitError::NotAPdf { name, .. } => format!("'{name}' is not a PDF file."),
            ToolkitError::CorruptPdf { name, .. } => {
                format!("'{name}' is damaged and cannot be opened.")
            }
            ToolkitError::PasswordRequired { name } => {
                format!("'{name}' is password protected.")
            }
            ToolkitError::WrongPassword { name } => format!("Wrong password for '{name}'."),
            ToolkitError::Render(f) => format!("Could not render page {}.", f.page + 1),
            ToolkitError::Network(n) => n.user_message(),
            ToolkitError::Packaging(_) => "Could not build the download archive.".to_string(),
            ToolkitError::Cancelled => "Cancelled.".to_string(),
            ToolkitError::RunInProgress => "A task is already running.".to_string(),
            ToolkitError::OutputWriteFailed { path, .. } => {
                format!("Could not save {}", path.display())
            }
            ToolkitError::InvalidConfig(msg) => msg.clone(),
            ToolkitError::PdfiumBindingFailed(_) => {
                "The PDF rendering engine is not available.".to_string()
            }
            ToolkitError::Internal(_) => "An unexpected error occurred.".to_string(),
        }
    }
}

/// A page that could not be rasterised.
///
/// Non-fatal for thumbnails and previews, fatal for full export.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("Page {}: rasterisation failed: {detail}", .page + 1)]
pub struct RenderFailure {
    /// 0-based page index.
    pub page: usize,
    pub detail: String,
}

/// Transport-level failures and non-2xx responses from the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkFailure {
    /// HTTP 429.
    #[error("Backend rate limit reached (HTTP 429)")]
    RateLimited,

    /// A known lock-contention message from the backend.
    #[error("Backend reported contention: {detail}")]
    ServerBusy { detail: String },

    /// Any other non-2xx response. `message` is the response body, or a
    /// generic message when the body was empty.
    #[error("Backend returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// A 2xx response whose body could not be interpreted.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

impl NetworkFailure {
    pub fn user_message(&self) -> String {
        match self {
            NetworkFailure::RateLimited | NetworkFailure::ServerBusy { .. } => {
                SERVER_BUSY_MESSAGE.to_string()
            }
            NetworkFailure::Rejected { message, .. } => message.clone(),
            NetworkFailure::Transport { .. } => {
                "Could not reach the processing server. Check your connection.".to_string()
            }
            NetworkFailure::MalformedResponse(_) => {
                "The processing server returned an unreadable result.".to_string()
            }
        }
    }
}
