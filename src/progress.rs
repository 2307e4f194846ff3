//! Progress reporting for processing runs.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ToolkitConfigBuilder::progress_callback`] to observe a run
//! as it happens. The orchestrator also publishes every state on a watch
//! channel; the callback is the push-style alternative for terminal progress
//! bars and log sinks.
//!
//! # Progress weighting
//!
//! Bulk rasterisation reserves the first 10 % for setup and the last 10 % for
//! packaging. After page `i` of `T` the run reports
//! `10 + floor(i / T * 80)`; see [`raster_progress`].
//!
//! # Example
//!
//! ```rust
//! use pdf_toolkit::{ProcessingState, RunProgressCallback, ToolkitConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counting(AtomicUsize);
//!
//! impl RunProgressCallback for Counting {
//!     fn on_state_change(&self, _state: &ProcessingState) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ToolkitConfig::builder()
//!     .progress_callback(Arc::new(Counting(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::state::ProcessingState;
use crate::tools::ToolId;
use std::sync::Arc;

/// Progress reported once inputs are validated and setup begins.
pub const SETUP_PROGRESS: u8 = 5;
/// Progress reserved before the first page is rasterised.
pub const RASTER_BASE: u8 = 10;
/// Share of the bar covered by per-page rasterisation.
pub const RASTER_SPAN: u8 = 80;
/// Progress once the upload to the backend has started.
pub const UPLOAD_PROGRESS: u8 = 20;
/// Progress once the backend has answered and the result is being prepared.
pub const FINALIZE_PROGRESS: u8 = 70;
/// Terminal progress of a successful run.
pub const COMPLETE_PROGRESS: u8 = 100;

/// Progress after `done` of `total` pages were rasterised.
///
/// Integer arithmetic, so the value is the floor of the fractional share.
/// Monotonic in `done` and never exceeds 90.
pub fn raster_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return RASTER_BASE + RASTER_SPAN;
    }
    let done = done.min(total);
    RASTER_BASE + ((done * RASTER_SPAN as usize) / total) as u8
}

/// Called by the orchestrator as a run advances.
///
/// Implementations must be `Send + Sync`; all methods default to no-ops so
/// callers only override what they care about.
pub trait RunProgressCallback: Send + Sync {
    /// Called once, after validation succeeded and before any work starts.
    fn on_run_start(&self, tool: ToolId, file_count: usize) {
        let _ = (tool, file_count);
    }

    /// Called on every published state, including the terminal one.
    fn on_state_change(&self, state: &ProcessingState) {
        let _ = state;
    }

    /// Called after each page of a bulk export was rendered and encoded.
    ///
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: pages in the document
    /// * `encoded_len`: size of the encoded bitmap in bytes
    fn on_page_rendered(&self, page_num: usize, total_pages: usize, encoded_len: usize) {
        let _ = (page_num, total_pages, encoded_len);
    }

    /// Called once with the terminal state (`Success`, `Error` or `Idle`
    /// after cancellation).
    fn on_run_complete(&self, state: &ProcessingState) {
        let _ = state;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ToolkitConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
