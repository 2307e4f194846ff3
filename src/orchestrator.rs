//! Processing orchestrator: drives one run from validation to result.
//!
//! ```text
//!          run()                 ok
//!  Idle ──────────▶ Processing ──────▶ Success ─┐
//!   ▲                   │   │    err            │ reset()
//!   │      cancel()     │   └──────▶ Error ─────┤
//!   └───────────────────┘                       │
//!   ▲                                           │
//!   └───────────────────────────────────────────┘
//! ```
//!
//! Every transition publishes a fresh [`ProcessingState`] on a watch channel
//! and to the configured progress callback. Blob URLs referenced only by the
//! superseded state are revoked at publication time, so a reset leaves the
//! blob store empty.
//!
//! One run at a time: a second `run` while one is processing is rejected with
//! [`ToolkitError::RunInProgress`]. Every other failure ends the run in a
//! single `Error` state and is returned as `Ok(state)`; cancellation ends it
//! in `Idle`. Once `cancel` or `reset` has been called, the run publishes
//! nothing but its final `Idle`.
//!
//! Progress callbacks are invoked while a state is being published and must
//! not call [`Orchestrator::reset`].

use crate::blobs::{BlobStore, BlobUrl};
use crate::cancel::CancelToken;
use crate::config::ToolkitConfig;
use crate::error::ToolkitError;
use crate::gallery::ExtractedImageSet;
use crate::params::{ResolvedParams, ToolParameters};
use crate::pipeline::archive::{package_archive, ArchiveEntry};
use crate::pipeline::classify::{Classified, Classifier, PreviewImage};
use crate::pipeline::encode::ImageKind;
use crate::pipeline::engine::{PdfiumEngine, RenderEngine};
use crate::pipeline::input::InputFile;
use crate::pipeline::remote::{check_status, HttpBackend, RemoteBackend, RemoteRequest};
use crate::pipeline::render::{Rasterizer, RenderQuality};
use crate::progress::{
    raster_progress, COMPLETE_PROGRESS, FINALIZE_PROGRESS, SETUP_PROGRESS, UPLOAD_PROGRESS,
};
use crate::state::{Artifact, ProcessingState, ResultKind, Status};
use crate::tools::{Execution, Route, ToolDescriptor, ToolId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

const MSG_SETUP: &str = "Initializing secure environment...";
const MSG_UPLOAD: &str = "Uploading to processing server...";
const MSG_UPLOAD_HIFI: &str = "Initiating high-fidelity engine...";
const MSG_FINALIZE: &str = "Processing complete. Finalizing download...";
const MSG_DONE: &str = "Done & Ready!";

/// Pages handed to the engine per call during a bulk export. Cancellation is
/// checked between batches.
const EXPORT_BATCH_PAGES: usize = 4;

#[derive(Default)]
struct RunSlot {
    /// Token of the run in progress; `None` when idle.
    cancel: Option<CancelToken>,
    extracted: Option<ExtractedImageSet>,
}

/// Runs tools and publishes their state.
pub struct Orchestrator {
    config: ToolkitConfig,
    rasterizer: Rasterizer,
    classifier: Classifier,
    backend: Arc<dyn RemoteBackend>,
    blobs: BlobStore,
    state: watch::Sender<ProcessingState>,
    slot: Mutex<RunSlot>,
    /// Serialises publication so the channel and the callback see states in
    /// the same order.
    publish_gate: Mutex<()>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("status", &self.state.borrow().status)
            .field("live_blobs", &self.blobs.live_count())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Production orchestrator: pdfium rendering and the HTTP backend.
    pub fn new(config: ToolkitConfig) -> Result<Self, ToolkitError> {
        let engine = Arc::new(PdfiumEngine::new(config.pdfium_lib_path.clone()));
        let backend = Arc::new(HttpBackend::new(config.request_timeout_secs)?);
        Ok(Self::with_components(config, engine, backend))
    }

    /// Orchestrator over explicit engine and backend implementations.
    pub fn with_components(
        config: ToolkitConfig,
        engine: Arc<dyn RenderEngine>,
        backend: Arc<dyn RemoteBackend>,
    ) -> Self {
        let rasterizer = Rasterizer::new(engine, &config);
        let classifier = Classifier::new(rasterizer.clone(), &config);
        let (state, _) = watch::channel(ProcessingState::idle());
        Self {
            config,
            rasterizer,
            classifier,
            backend,
            blobs: BlobStore::new(),
            state,
            slot: Mutex::new(RunSlot::default()),
            publish_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Current state.
    pub fn state(&self) -> ProcessingState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.state.subscribe()
    }

    /// The published states as a stream (latest value first).
    pub fn state_stream(&self) -> WatchStream<ProcessingState> {
        WatchStream::new(self.subscribe())
    }

    /// Snapshot of the images extracted from the last archive result.
    pub fn extracted_images(&self) -> Option<ExtractedImageSet> {
        self.lock_slot().extracted.clone()
    }

    /// Mutate the extracted image selection in place.
    pub fn update_extracted_images<R>(
        &self,
        f: impl FnOnce(&mut ExtractedImageSet) -> R,
    ) -> Option<R> {
        self.lock_slot().extracted.as_mut().map(f)
    }

    /// Signal the run in progress, if any, to stop. The run ends in `Idle`.
    pub fn cancel(&self) {
        if let Some(token) = &self.lock_slot().cancel {
            info!("Cancellation requested");
            token.cancel();
        }
    }

    /// Return to `Idle` and release every blob. Cancels a run in progress.
    pub fn reset(&self) {
        let extracted = {
            let mut slot = self.lock_slot();
            if let Some(token) = &slot.cancel {
                token.cancel();
            }
            slot.extracted.take()
        };
        if let Some(set) = extracted {
            set.release(&self.blobs);
        }
        self.publish(ProcessingState::idle());
        debug!("Reset; {} blobs still live", self.blobs.live_count());
    }

    /// Run `tool` over `files` with `params`, returning the terminal state.
    ///
    /// `Err` only when another run is already processing.
    pub async fn run(
        &self,
        tool: ToolId,
        files: Vec<InputFile>,
        params: ToolParameters,
    ) -> Result<ProcessingState, ToolkitError> {
        let token = {
            let mut slot = self.lock_slot();
            if slot.cancel.is_some() {
                return Err(ToolkitError::RunInProgress);
            }
            let token = CancelToken::new();
            slot.cancel = Some(token.clone());
            token
        };

        // A new run supersedes the previous result.
        if let Some(set) = self.lock_slot().extracted.take() {
            set.release(&self.blobs);
        }

        let start = Instant::now();
        let descriptor = tool.descriptor();
        info!("Starting {} with {} file(s)", tool, files.len());

        let outcome = self.process(descriptor, &files, &params, &token).await;

        let terminal = {
            let _gate = self.lock_publish();
            let terminal = match outcome {
                Ok(state) if token.is_cancelled() => {
                    self.blobs.revoke_all(state.blob_urls());
                    if let Some(set) = self.lock_slot().extracted.take() {
                        set.release(&self.blobs);
                    }
                    ProcessingState::idle()
                }
                Ok(state) => state,
                Err(e) if e.is_cancellation() || token.is_cancelled() => {
                    info!("{} cancelled", tool);
                    ProcessingState::idle()
                }
                Err(e) => {
                    warn!("{} failed: {}", tool, e);
                    ProcessingState::error(e.user_message())
                }
            };
            self.replace_state(terminal.clone());
            self.notify(&terminal);
            self.lock_slot().cancel = None;
            terminal
        };

        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_complete(&terminal);
        }
        info!(
            "{} finished as {:?} in {}ms",
            tool,
            terminal.status,
            start.elapsed().as_millis()
        );
        Ok(terminal)
    }

    async fn process(
        &self,
        descriptor: &ToolDescriptor,
        files: &[InputFile],
        params: &ToolParameters,
        token: &CancelToken,
    ) -> Result<ProcessingState, ToolkitError> {
        let resolved = self.validate(descriptor, files, params).await?;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_start(descriptor.id, files.len());
        }
        self.publish_progress(
            token,
            ProcessingState::processing(SETUP_PROGRESS, MSG_SETUP),
        )?;

        match descriptor.execution {
            Execution::Rasterize => {
                self.rasterize_all(descriptor, &files[0], &resolved, token)
                    .await
            }
            Execution::Remote(route) => {
                self.run_remote(descriptor, route, files, resolved, token)
                    .await
            }
        }
    }

    // ── Validation ───────────────────────────────────────────────────────

    async fn validate(
        &self,
        descriptor: &ToolDescriptor,
        files: &[InputFile],
        params: &ToolParameters,
    ) -> Result<ResolvedParams, ToolkitError> {
        descriptor.validate_inputs(files)?;
        let resolved = descriptor.resolve_params(params)?;

        if let Some(order) = &resolved.page_order {
            let doc = self
                .rasterizer
                .open(&files[0], resolved.value("password"))
                .await?;
            if order.len() != doc.page_count() {
                return Err(ToolkitError::Validation(format!(
                    "Page order lists {} pages but '{}' has {}.",
                    order.len(),
                    doc.name(),
                    doc.page_count()
                )));
            }
        }
        Ok(resolved)
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Render every page at export scale and zip them. The gallery gets its
    /// own renders at preview scale.
    async fn rasterize_all(
        &self,
        descriptor: &ToolDescriptor,
        file: &InputFile,
        resolved: &ResolvedParams,
        token: &CancelToken,
    ) -> Result<ProcessingState, ToolkitError> {
        let kind = resolved
            .value("format")
            .and_then(ImageKind::from_name)
            .unwrap_or_default();
        let doc = self.rasterizer.open(file, resolved.value("password")).await?;
        let total = doc.page_count();

        let mut entries = Vec::with_capacity(total);
        let mut next = 0;
        while next < total {
            if token.is_cancelled() {
                return Err(ToolkitError::Cancelled);
            }
            let batch = next..total.min(next + EXPORT_BATCH_PAGES);
            next = batch.end;
            let renders = self
                .rasterizer
                .render_batch(&doc, batch, RenderQuality::Export, kind)
                .await?;
            for render in renders {
                let page_num = render.page + 1;
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_page_rendered(page_num, total, render.bytes.len());
                }
                entries.push(ArchiveEntry::new(
                    format!("Page_{}.{}", page_num, kind.extension()),
                    render.bytes,
                ));
                self.publish_progress(
                    token,
                    ProcessingState::processing(
                        raster_progress(page_num, total),
                        format!("Rasterizing page {} of {}...", page_num, total),
                    ),
                )?;
            }
        }

        let archive = package_archive(&entries)?;
        let previews = self
            .rasterizer
            .preview(&doc, self.config.gallery_cap)
            .await
            .into_iter()
            .map(|r| PreviewImage {
                bytes: r.bytes,
                mime_type: r.kind.mime_type(),
            })
            .collect();
        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled);
        }
        info!("Rasterized {} pages of {}", total, doc.name());

        Ok(self.deliver(
            descriptor.id,
            Classified {
                kind: ResultKind::ImageArchive,
                artifact: archive,
                previews,
                extracted: Vec::new(),
            },
            format!("{} Rendered {} pages.", MSG_DONE, total),
            None,
        ))
    }

    /// Post to the backend and classify the answer.
    async fn run_remote(
        &self,
        descriptor: &ToolDescriptor,
        route: Route,
        files: &[InputFile],
        resolved: ResolvedParams,
        token: &CancelToken,
    ) -> Result<ProcessingState, ToolkitError> {
        let endpoint = route.resolve(&resolved)?;
        let original_size: u64 = files.iter().map(InputFile::size).sum();

        let upload_message = if descriptor.high_fidelity {
            MSG_UPLOAD_HIFI
        } else {
            MSG_UPLOAD
        };
        self.publish_progress(
            token,
            ProcessingState::processing(UPLOAD_PROGRESS, upload_message),
        )?;

        let mut request = RemoteRequest::new(self.config.endpoint_url(endpoint.path));
        for file in files {
            request = request.file(endpoint.file_field, file.clone());
        }
        for (wire, file) in resolved.attachments {
            request = request.file(wire, file);
        }
        for (wire, value) in resolved.fields {
            request = request.field(wire, value);
        }

        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled);
        }
        // Dropping the send future aborts the request.
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ToolkitError::Cancelled),
            response = self.backend.send(request) => response?,
        };
        let response = check_status(response)?;
        self.publish_progress(
            token,
            ProcessingState::processing(FINALIZE_PROGRESS, MSG_FINALIZE),
        )?;
        let classified = self
            .classifier
            .classify(response, descriptor.response)
            .await?;
        debug!("Classified result as {:?}", classified.kind);

        Ok(self.deliver(
            descriptor.id,
            classified,
            MSG_DONE.to_string(),
            Some(original_size),
        ))
    }

    /// Register the result's blobs and build the `Success` state.
    fn deliver(
        &self,
        tool: ToolId,
        result: Classified,
        message: String,
        original_size: Option<u64>,
    ) -> ProcessingState {
        let Classified {
            kind,
            artifact,
            previews,
            extracted,
        } = result;

        let size = artifact.len() as u64;
        let url = self.blobs.create(artifact, kind.mime_type());
        let gallery: Vec<BlobUrl> = previews
            .into_iter()
            .take(self.config.gallery_cap)
            .map(|p| self.blobs.create(p.bytes, p.mime_type))
            .collect();

        if !extracted.is_empty() {
            let set = ExtractedImageSet::from_entries(&self.blobs, extracted);
            self.lock_slot().extracted = Some(set);
        }

        let original_size = original_size.filter(|_| kind == ResultKind::Document);
        ProcessingState {
            status: Status::Success,
            progress: COMPLETE_PROGRESS,
            message: Some(message),
            download: Some(Artifact {
                url,
                file_name: download_name(tool, kind),
                size,
            }),
            preview: gallery.first().cloned(),
            gallery,
            result_kind: Some(kind),
            original_size,
            result_size: original_size.map(|_| size),
        }
    }

    // ── Publication ──────────────────────────────────────────────────────

    fn publish(&self, next: ProcessingState) {
        let _gate = self.lock_publish();
        self.replace_state(next.clone());
        self.notify(&next);
    }

    /// Publish a `Processing` update unless `token` has been cancelled.
    ///
    /// `reset` flips the token before it publishes `Idle`, and both go
    /// through the publish lock, so nothing from a cancelled run lands
    /// after that `Idle`.
    fn publish_progress(
        &self,
        token: &CancelToken,
        next: ProcessingState,
    ) -> Result<(), ToolkitError> {
        let _gate = self.lock_publish();
        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled);
        }
        self.replace_state(next.clone());
        self.notify(&next);
        Ok(())
    }

    /// Send `next` on the watch channel and revoke the blob URLs only the
    /// superseded state referenced.
    fn replace_state(&self, next: ProcessingState) {
        let keep: HashSet<BlobUrl> = next.blob_urls().into_iter().cloned().collect();
        let previous = self.state.send_replace(next);
        self.blobs.revoke_all(
            previous
                .blob_urls()
                .into_iter()
                .filter(|url| !keep.contains(*url)),
        );
    }

    fn notify(&self, state: &ProcessingState) {
        if let Some(cb) = &self.config.progress_callback {
            cb.on_state_change(state);
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Taken before the slot lock when both are needed.
    fn lock_publish(&self) -> MutexGuard<'_, ()> {
        self.publish_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `<tool-slug>.<ext>`.
pub fn download_name(tool: ToolId, kind: ResultKind) -> String {
    format!("{}.{}", tool.slug(), kind.extension())
}
