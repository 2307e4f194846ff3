//! Page rasterization.
//!
//! ## Why spawn_blocking?
//!
//! pdfium uses thread-local state and is not safe to call from async
//! contexts. Every engine call is moved onto the blocking pool so the Tokio
//! workers keep serving the rest of the run (cancellation, state updates).
//!
//! Each engine call opens the document from the shared bytes, so no engine
//! state outlives a call and the document itself is never mutated. Bulk
//! exports go through [`Rasterizer::render_batch`] so one open serves
//! several pages.

use crate::config::ToolkitConfig;
use crate::error::{RenderFailure, ToolkitError};
use crate::pipeline::encode::{encode_bitmap, ImageKind};
use crate::pipeline::engine::{EngineError, RenderEngine};
use crate::pipeline::input::{ensure_pdf, InputFile};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An opened document: validated bytes plus page count.
///
/// Immutable for the lifetime of a run; clones share the bytes.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    bytes: Arc<[u8]>,
    password: Option<String>,
    page_count: usize,
}

impl DocumentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Size of the document in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// One rasterized, encoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRender {
    /// 0-based source page index.
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

/// Scale presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderQuality {
    Thumbnail,
    Preview,
    Export,
}

/// Drives a [`RenderEngine`] from async code.
#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn RenderEngine>,
    thumbnail_scale: f32,
    preview_scale: f32,
    export_scale: f32,
    jpeg_quality: u8,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("thumbnail_scale", &self.thumbnail_scale)
            .field("preview_scale", &self.preview_scale)
            .field("export_scale", &self.export_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn RenderEngine>, config: &ToolkitConfig) -> Self {
        Self {
            engine,
            thumbnail_scale: config.thumbnail_scale,
            preview_scale: config.preview_scale,
            export_scale: config.export_scale,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn scale_for(&self, quality: RenderQuality) -> f32 {
        match quality {
            RenderQuality::Thumbnail => self.thumbnail_scale,
            RenderQuality::Preview => self.preview_scale,
            RenderQuality::Export => self.export_scale,
        }
    }

    /// Validate the PDF magic and ask the engine for the page count.
    pub async fn open(
        &self,
        file: &InputFile,
        password: Option<&str>,
    ) -> Result<DocumentHandle, ToolkitError> {
        self.open_bytes(&file.name, file.bytes.clone(), password)
            .await
    }

    /// Like [`open`](Self::open) for raw bytes (backend results, page payloads).
    pub async fn open_bytes(
        &self,
        name: &str,
        bytes: Arc<[u8]>,
        password: Option<&str>,
    ) -> Result<DocumentHandle, ToolkitError> {
        ensure_pdf(name, &bytes)?;

        let engine = Arc::clone(&self.engine);
        let task_bytes = Arc::clone(&bytes);
        let pwd = password.map(str::to_string);
        let count = tokio::task::spawn_blocking(move || {
            engine.page_count(&task_bytes, pwd.as_deref())
        })
        .await
        .map_err(|e| ToolkitError::Internal(format!("Open task panicked: {}", e)))?;

        let page_count = count.map_err(|e| match e {
            EngineError::PasswordRequired => ToolkitError::PasswordRequired {
                name: name.to_string(),
            },
            EngineError::WrongPassword => ToolkitError::WrongPassword {
                name: name.to_string(),
            },
            EngineError::Binding(detail) => ToolkitError::PdfiumBindingFailed(detail),
            other => ToolkitError::CorruptPdf {
                name: name.to_string(),
                detail: other.to_string(),
            },
        })?;

        info!("Opened {}: {} pages", name, page_count);
        Ok(DocumentHandle {
            name: name.to_string(),
            bytes,
            password: password.map(str::to_string),
            page_count,
        })
    }

    /// Render one page at `scale` and encode it as `kind`.
    pub async fn render_page(
        &self,
        doc: &DocumentHandle,
        page: usize,
        scale: f32,
        kind: ImageKind,
    ) -> Result<PageRender, RenderFailure> {
        let mut renders = self.render_range(doc, page..page + 1, scale, kind).await?;
        renders.pop().ok_or_else(|| RenderFailure {
            page,
            detail: "engine returned no bitmap".into(),
        })
    }

    /// Render `pages` at a preset quality with a single engine call.
    pub async fn render_batch(
        &self,
        doc: &DocumentHandle,
        pages: Range<usize>,
        quality: RenderQuality,
        kind: ImageKind,
    ) -> Result<Vec<PageRender>, RenderFailure> {
        self.render_range(doc, pages, self.scale_for(quality), kind)
            .await
    }

    async fn render_range(
        &self,
        doc: &DocumentHandle,
        pages: Range<usize>,
        scale: f32,
        kind: ImageKind,
    ) -> Result<Vec<PageRender>, RenderFailure> {
        let first = pages.start;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RenderFailure {
                page: first,
                detail: format!("invalid scale {scale}"),
            });
        }
        if pages.end > doc.page_count {
            return Err(RenderFailure {
                page: first.max(doc.page_count),
                detail: format!(
                    "page index out of range (document has {} pages)",
                    doc.page_count
                ),
            });
        }

        let engine = Arc::clone(&self.engine);
        let bytes = Arc::clone(&doc.bytes);
        let password = doc.password.clone();
        let quality = self.jpeg_quality;

        let renders = tokio::task::spawn_blocking(move || -> Result<_, RenderFailure> {
            let images = engine
                .render_pages(&bytes, password.as_deref(), pages.clone(), scale)
                .map_err(|(page, e)| RenderFailure {
                    page,
                    detail: e.to_string(),
                })?;
            pages
                .zip(images)
                .map(|(page, image)| {
                    let fail = |detail: String| RenderFailure { page, detail };
                    let encoded = encode_bitmap(&image, kind, quality)
                        .map_err(|e| fail(e.to_string()))?;
                    Ok(PageRender {
                        page,
                        width: image.width(),
                        height: image.height(),
                        kind,
                        bytes: encoded,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| RenderFailure {
            page: first,
            detail: format!("render task panicked: {e}"),
        })??;

        for render in &renders {
            debug!(
                "Page {} rendered at {}x → {}x{} ({} bytes)",
                render.page + 1,
                scale,
                render.width,
                render.height,
                render.bytes.len()
            );
        }
        Ok(renders)
    }

    /// Render one page at a preset quality.
    pub async fn render_quality(
        &self,
        doc: &DocumentHandle,
        page: usize,
        quality: RenderQuality,
        kind: ImageKind,
    ) -> Result<PageRender, RenderFailure> {
        self.render_page(doc, page, self.scale_for(quality), kind)
            .await
    }

    /// PNG previews of the first `max_pages` pages. Pages that fail to render
    /// are skipped.
    pub async fn preview(&self, doc: &DocumentHandle, max_pages: usize) -> Vec<PageRender> {
        let n = doc.page_count.min(max_pages);
        let mut out = Vec::with_capacity(n);
        for page in 0..n {
            match self
                .render_quality(doc, page, RenderQuality::Preview, ImageKind::Png)
                .await
            {
                Ok(r) => out.push(r),
                Err(e) => warn!("Preview of {} skipped: {}", doc.name, e),
            }
        }
        out
    }

    /// One thumbnail per page; `None` where rendering failed.
    pub async fn thumbnails(&self, doc: &DocumentHandle) -> Vec<Option<PageRender>> {
        let mut out = Vec::with_capacity(doc.page_count);
        for page in 0..doc.page_count {
            let thumb = self
                .render_quality(doc, page, RenderQuality::Thumbnail, ImageKind::Jpeg)
                .await;
            if let Err(e) = &thumb {
                warn!("Thumbnail of {} skipped: {}", doc.name, e);
            }
            out.push(thumb.ok());
        }
        out
    }
}
