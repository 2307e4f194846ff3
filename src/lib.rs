//! # pdf-toolkit
//!
//! Core of a PDF conversion toolkit: page rasterisation, page reordering,
//! archive packaging, result classification and a run orchestrator that
//! drives local and remote tools through one observable state machine.
//!
//! ## Why this crate?
//!
//! A PDF tool front end is mostly plumbing: render pages for thumbnails,
//! post files to a conversion service, figure out what came back, offer a
//! download and free everything when the user moves on. This crate owns that
//! plumbing so a UI (or the bundled CLI) only renders [`ProcessingState`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! files + ToolParameters
//!  │
//!  ├─ 1. Validate  arity, input kinds, parameter ranges, page order
//!  ├─ 2. Execute   local rasterisation (pdfium, spawn_blocking)
//!  │               or multipart POST to the conversion backend
//!  ├─ 3. Classify  page list / word / archive / document
//!  ├─ 4. Deliver   blob URLs for download, preview and gallery
//!  └─ 5. Publish   ProcessingState on a watch channel + callback
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_toolkit::{InputFile, Orchestrator, ToolId, ToolParameters, ToolkitConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(ToolkitConfig::default())?;
//!     let file = InputFile::from_path(Path::new("document.pdf"))?;
//!     let state = orchestrator
//!         .run(ToolId::PdfToImages, vec![file], ToolParameters::new())
//!         .await?;
//!     if let Some(download) = &state.download {
//!         let blob = orchestrator.blobs().get(&download.url).unwrap();
//!         std::fs::write(&download.file_name, &blob.bytes[..])?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature      | Default | Description |
//! |--------------|---------|-------------|
//! | `cli`        | on      | Enables the `pdf-toolkit` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `test-utils` | off     | Exposes [`testing`]: fake render engine, scripted backend, recording callback |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-toolkit = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod blobs;
pub mod cancel;
pub mod config;
pub mod error;
pub mod gallery;
pub mod orchestrator;
pub mod params;
pub mod pipeline;
pub mod progress;
pub mod sequence;
pub mod state;
pub mod tools;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use blobs::{Blob, BlobStore, BlobUrl};
pub use cancel::CancelToken;
pub use config::{ToolkitConfig, ToolkitConfigBuilder};
pub use error::{NetworkFailure, RenderFailure, ToolkitError};
pub use gallery::{ExtractedImage, ExtractedImageSet};
pub use orchestrator::{download_name, Orchestrator};
pub use params::{ParamValue, ToolParameters};
pub use pipeline::archive::{package_archive, unpack_archive, ArchiveEntry};
pub use pipeline::encode::ImageKind;
pub use pipeline::engine::{PdfiumEngine, RenderEngine};
pub use pipeline::input::{InputFile, InputKind};
pub use pipeline::remote::{HttpBackend, RemoteBackend, RemoteRequest, RemoteResponse};
pub use pipeline::render::{DocumentHandle, PageRender, Rasterizer, RenderQuality};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use sequence::{PageSequence, PageSequenceManager, SequenceState};
pub use state::{Artifact, ProcessingState, ResultKind, Status};
pub use tools::{ToolDescriptor, ToolId};
