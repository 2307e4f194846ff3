//! Input files: read user-supplied files into memory and classify them.
//!
//! Every tool works on in-memory bytes. pdfium can open a document straight
//! from a byte slice, so nothing is staged on disk; the bytes are shared
//! (`Arc<[u8]>`) between the orchestrator, the rasterizer and the multipart
//! request without copying.

use crate::error::ToolkitError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// One user-supplied file.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    /// File name without directories, used in multipart bodies and messages.
    pub name: String,
    /// Declared or inferred MIME type.
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl InputFile {
    /// Build an input from bytes, inferring the MIME type from the name when
    /// `mime_type` is `None`.
    pub fn new(
        name: impl Into<String>,
        mime_type: Option<&str>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let name = name.into();
        let mime_type = match mime_type {
            Some(m) if !m.trim().is_empty() => m.trim().to_ascii_lowercase(),
            _ => mime_from_name(&name).to_string(),
        };
        Self {
            name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    ///
    /// Missing files and unreadable files are reported separately so the CLI
    /// can tell the user which one it is.
    pub fn from_path(path: &Path) -> Result<Self, ToolkitError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ToolkitError::PermissionDenied {
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {
                return Err(ToolkitError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        debug!("Read input {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(name, None, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `true` when the bytes start with `%PDF`.
    pub fn has_pdf_magic(&self) -> bool {
        self.bytes.starts_with(PDF_MAGIC)
    }

    /// Lower-cased extension of [`name`](Self::name), if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Reject bytes that do not start with the PDF magic before handing them to
/// the engine, so callers get a meaningful error rather than an engine crash.
pub fn ensure_pdf(name: &str, bytes: &[u8]) -> Result<(), ToolkitError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ToolkitError::NotAPdf {
        name: name.to_string(),
        magic,
    })
}

/// Category of input a tool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
    Word,
    Spreadsheet,
}

impl InputKind {
    pub fn matches(self, file: &InputFile) -> bool {
        let mime = file.mime_type.as_str();
        let ext = file.extension();
        let ext = ext.as_deref().unwrap_or("");
        match self {
            InputKind::Pdf => mime == "application/pdf" || ext == "pdf",
            InputKind::Image => {
                mime.starts_with("image/")
                    || matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp")
            }
            InputKind::Word => {
                mime.contains("wordprocessingml")
                    || mime == "application/msword"
                    || matches!(ext, "doc" | "docx")
            }
            InputKind::Spreadsheet => {
                mime.contains("spreadsheetml")
                    || mime == "application/vnd.ms-excel"
                    || mime == "text/csv"
                    || matches!(ext, "xls" | "xlsx" | "csv")
            }
        }
    }

    /// Phrase used in validation messages.
    pub fn describe(self) -> &'static str {
        match self {
            InputKind::Pdf => "a PDF file",
            InputKind::Image => "an image",
            InputKind::Word => "a Word document",
            InputKind::Spreadsheet => "a spreadsheet",
        }
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// MIME type for a file name, `application/octet-stream` when unknown.
pub fn mime_from_name(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("csv") => "text/csv",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
