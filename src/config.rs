//! Configuration for the toolkit.
//!
//! Every knob lives in [`ToolkitConfig`], built via [`ToolkitConfigBuilder`].
//! The defaults reproduce the behaviour of the hosted service: 0.4× thumbnails,
//! 1.0× previews, 2.0× exports, JPEG quality 90, three preview pages and a
//! gallery of at most ten images.

use crate::error::ToolkitError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Base URL of the hosted conversion backend.
pub const DEFAULT_API_BASE_URL: &str =
    "https://possysstemapi.runasp.net/api/ImagetoPdfConversion";

/// Upper bound for any render scale. A 2× render of an A0 page is already
/// 6 700 × 9 500 px.
pub const MAX_SCALE: f32 = 8.0;

/// Configuration for an [`crate::Orchestrator`] and its pipeline stages.
///
/// # Example
/// ```rust
/// use pdf_toolkit::ToolkitConfig;
///
/// let config = ToolkitConfig::builder()
///     .export_scale(1.5)
///     .gallery_cap(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.gallery_cap, 4);
/// ```
#[derive(Clone)]
pub struct ToolkitConfig {
    /// Base URL that tool endpoints are appended to.
    pub api_base_url: String,

    /// Scale used for page thumbnails (reorder grids). Default: 0.4.
    pub thumbnail_scale: f32,

    /// Scale used for single-page result previews. Default: 1.0.
    pub preview_scale: f32,

    /// Scale used when exporting pages as images. Default: 2.0.
    pub export_scale: f32,

    /// JPEG quality (1–100) for lossy exports. Default: 90.
    pub jpeg_quality: u8,

    /// Maximum number of pages rendered for a multi-page preview. Default: 3.
    pub preview_page_cap: usize,

    /// Maximum number of images kept in a result gallery. Default: 10.
    pub gallery_cap: usize,

    /// Optional client-side timeout for backend requests. Default: none, the
    /// backend's own limits apply.
    pub request_timeout_secs: Option<u64>,

    /// Explicit path to the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, then to the system library search path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives every state transition of a run.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            thumbnail_scale: 0.4,
            preview_scale: 1.0,
            export_scale: 2.0,
            jpeg_quality: 90,
            preview_page_cap: 3,
            gallery_cap: 10,
            request_timeout_secs: None,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ToolkitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolkitConfig")
            .field("api_base_url", &self.api_base_url)
            .field("thumbnail_scale", &self.thumbnail_scale)
            .field("preview_scale", &self.preview_scale)
            .field("export_scale", &self.export_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("preview_page_cap", &self.preview_page_cap)
            .field("gallery_cap", &self.gallery_cap)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl ToolkitConfig {
    /// Create a new builder for `ToolkitConfig`.
    pub fn builder() -> ToolkitConfigBuilder {
        ToolkitConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of a backend endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), endpoint)
    }
}

/// Builder for [`ToolkitConfig`].
#[derive(Debug)]
pub struct ToolkitConfigBuilder {
    config: ToolkitConfig,
}

impl ToolkitConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn thumbnail_scale(mut self, scale: f32) -> Self {
        self.config.thumbnail_scale = scale;
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale;
        self
    }

    pub fn export_scale(mut self, scale: f32) -> Self {
        self.config.export_scale = scale;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn preview_page_cap(mut self, n: usize) -> Self {
        self.config.preview_page_cap = n.max(1);
        self
    }

    pub fn gallery_cap(mut self, n: usize) -> Self {
        self.config.gallery_cap = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ToolkitConfig, ToolkitError> {
        let c = &self.config;
        for (name, scale) in [
            ("thumbnail_scale", c.thumbnail_scale),
            ("preview_scale", c.preview_scale),
            ("export_scale", c.export_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
                return Err(ToolkitError::InvalidConfig(format!(
                    "{name} must be in (0, {MAX_SCALE}], got {scale}"
                )));
            }
        }
        let url = c.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolkitError::InvalidConfig(format!(
                "api_base_url must be an HTTP/HTTPS URL, got '{url}'"
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(ToolkitError::InvalidConfig(
                "request_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
