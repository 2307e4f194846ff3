//! Rendering engine seam.
//!
//! [`RenderEngine`] is the only place that touches a PDF library. The
//! production engine is [`PdfiumEngine`]; tests swap in a fake that needs no
//! native library. Engine calls are blocking and are always driven from
//! `spawn_blocking` by [`crate::pipeline::render::Rasterizer`].

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Failure reported by an engine. The rasterizer attaches document names and
/// page numbers before surfacing it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("document is password-protected")]
    PasswordRequired,

    #[error("wrong password")]
    WrongPassword,

    #[error("document could not be opened: {0}")]
    Corrupt(String),

    #[error("page {page} out of range (document has {page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("{0}")]
    Render(String),

    #[error("failed to load the PDF engine: {0}")]
    Binding(String),
}

/// A blocking PDF renderer.
///
/// Every call receives the complete document bytes and opens the document
/// afresh; implementations hold no per-document state.
pub trait RenderEngine: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize, EngineError>;

    /// Render page `page` (0-based) at `scale`.
    ///
    /// The bitmap's dimensions must equal [`pixel_size`] of the page's
    /// intrinsic size in points.
    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page: usize,
        scale: f32,
    ) -> Result<DynamicImage, EngineError>;

    /// Render every page in `pages` at `scale`.
    ///
    /// Stops at the first failure and reports it with the failing page.
    /// The default renders page by page; engines with a costly open should
    /// open the document once for the whole batch.
    fn render_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        pages: Range<usize>,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, (usize, EngineError)> {
        pages
            .map(|page| {
                self.render_page(bytes, password, page, scale)
                    .map_err(|e| (page, e))
            })
            .collect()
    }
}

/// Pixel dimensions of a `width × height` point page rendered at `scale`.
///
/// Rounded to the nearest pixel, never below 1.
pub fn pixel_size(width_pts: f32, height_pts: f32, scale: f32) -> (u32, u32) {
    let px = |v: f32| ((v * scale).round() as i64).clamp(1, u32::MAX as i64) as u32;
    (px(width_pts), px(height_pts))
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`RenderEngine`] backed by pdfium.
///
/// The library is bound per call: from the configured path, then
/// `PDFIUM_LIB_PATH`, then the system library search path. A directory path
/// is joined with the platform's library file name.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let path = self
            .lib_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match path {
            Some(p) => {
                let p = if p.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&p)
                } else {
                    p
                };
                debug!("Binding pdfium from {}", p.display());
                Pdfium::bind_to_library(&p)
                    .map_err(|e| EngineError::Binding(format!("{}: {}", p.display(), e)))?
            }
            None => Pdfium::bind_to_system_library()
                .map_err(|e| EngineError::Binding(e.to_string()))?,
        };
        Ok(Pdfium::new(bindings))
    }

    /// Check that the library can be bound, without opening a document.
    pub fn probe(&self) -> Result<(), EngineError> {
        self.bind().map(|_| ())
    }
}

fn open_error(e: PdfiumError, password: Option<&str>) -> EngineError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            EngineError::WrongPassword
        } else {
            EngineError::PasswordRequired
        }
    } else {
        EngineError::Corrupt(detail)
    }
}

impl RenderEngine for PdfiumEngine {
    fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| open_error(e, password))?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page: usize,
        scale: f32,
    ) -> Result<DynamicImage, EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| open_error(e, password))?;
        render_loaded(&document, page, scale)
    }

    fn render_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        pages: Range<usize>,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, (usize, EngineError)> {
        let first = pages.start;
        let pdfium = self.bind().map_err(|e| (first, e))?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| (first, open_error(e, password)))?;
        pages
            .map(|page| render_loaded(&document, page, scale).map_err(|e| (page, e)))
            .collect()
    }
}

fn render_loaded(
    document: &PdfDocument<'_>,
    page: usize,
    scale: f32,
) -> Result<DynamicImage, EngineError> {
    let pages = document.pages();
    let page_count = pages.len() as usize;
    if page >= page_count {
        return Err(EngineError::PageOutOfRange { page, page_count });
    }

    let pdf_page = pages
        .get(page as u16)
        .map_err(|e| EngineError::Render(format!("{:?}", e)))?;
    let (width, height) = pixel_size(pdf_page.width().value, pdf_page.height().value, scale);

    let render_config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_target_height(height as i32);
    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| EngineError::Render(format!("{:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_size_rounds() {
        // US Letter at 2x.
        assert_eq!(pixel_size(612.0, 792.0, 2.0), (1224, 1584));
        // A4 thumbnail: 595.28 * 0.4 = 238.1, 841.89 * 0.4 = 336.76
        assert_eq!(pixel_size(595.28, 841.89, 0.4), (238, 337));
    }

    #[test]
    fn pixel_size_is_at_least_one() {
        assert_eq!(pixel_size(1.0, 1.0, 0.01), (1, 1));
        assert_eq!(pixel_size(0.0, 10.0, 1.0), (1, 10));
    }

    #[test]
    fn open_error_distinguishes_password_cases() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert_eq!(open_error(e, None), EngineError::PasswordRequired);
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert_eq!(open_error(e, Some("x")), EngineError::WrongPassword);
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        assert!(matches!(open_error(e, None), EngineError::Corrupt(_)));
    }
}
