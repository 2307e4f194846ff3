//! Processing state published by the orchestrator.
//!
//! A state is never mutated in place: each transition builds a new
//! [`ProcessingState`] and publishes it. Blob URLs referenced by the previous
//! state are revoked by the orchestrator when they are no longer referenced.

use crate::blobs::BlobUrl;
use crate::progress::COMPLETE_PROGRESS;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

/// Category of a completed run's output, used for UI handling and for the
/// download file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// A single PDF.
    Document,
    /// A zip whose entries are all images.
    ImageArchive,
    /// A Word document (`.docx`).
    WordDocument,
    /// A zip with mixed or unknown entries.
    UnclassifiedArchive,
}

impl ResultKind {
    pub fn extension(self) -> &'static str {
        match self {
            ResultKind::Document => "pdf",
            ResultKind::WordDocument => "docx",
            ResultKind::ImageArchive | ResultKind::UnclassifiedArchive => "zip",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ResultKind::Document => "application/pdf",
            ResultKind::WordDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ResultKind::ImageArchive | ResultKind::UnclassifiedArchive => "application/zip",
        }
    }
}

/// The primary downloadable result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: BlobUrl,
    pub file_name: String,
    pub size: u64,
}

/// Snapshot of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessingState {
    pub status: Status,
    /// 0–100.
    pub progress: u8,
    pub message: Option<String>,
    pub download: Option<Artifact>,
    pub preview: Option<BlobUrl>,
    pub gallery: Vec<BlobUrl>,
    pub result_kind: Option<ResultKind>,
    /// Total input size, reported for document results.
    pub original_size: Option<u64>,
    /// Result size, reported for document results.
    pub result_size: Option<u64>,
}

impl ProcessingState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Status::Processing,
            progress: progress.min(COMPLETE_PROGRESS),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            progress: 0,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == Status::Processing
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Success | Status::Error)
    }

    /// Every blob URL this state references.
    pub fn blob_urls(&self) -> Vec<&BlobUrl> {
        self.download
            .as_ref()
            .map(|a| &a.url)
            .into_iter()
            .chain(self.preview.iter())
            .chain(self.gallery.iter())
            .collect()
    }
}
