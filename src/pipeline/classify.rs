//! Result classification.
//!
//! The backend is not uniformly typed across tools, so classification is
//! ordered and permissive:
//!
//! 1. JSON `{ "pages": [base64, …] }` → decode, sniff and zip every entry.
//! 2. Word content type → [`ResultKind::WordDocument`], no preview.
//! 3. Zip / octet-stream → [`ResultKind::UnclassifiedArchive`], image
//!    entries (if any) become the preview gallery.
//! 4. Anything else → [`ResultKind::Document`], page previews when the bytes
//!    render.
//!
//! Only rule 1 can fail (undecodable page payload). Preview generation never
//! fails a run.

use crate::config::ToolkitConfig;
use crate::error::{NetworkFailure, ToolkitError};
use crate::pipeline::archive::{extract_images, package_archive, ArchiveEntry};
use crate::pipeline::encode::{decode_base64, sniff, ImageKind, Sniffed};
use crate::pipeline::remote::RemoteResponse;
use crate::pipeline::render::Rasterizer;
use crate::state::ResultKind;
use crate::tools::ResponseShape;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of a page-list response.
#[derive(Debug, Deserialize)]
struct PagePayload {
    pages: Vec<String>,
}

/// A preview image ready to be registered as a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ResultKind,
    /// Bytes offered for download.
    pub artifact: Vec<u8>,
    /// Preview images in display order; the first one is the main preview.
    pub previews: Vec<PreviewImage>,
    /// Image entries unpacked from an archive result.
    pub extracted: Vec<ArchiveEntry>,
}

impl Classified {
    fn bare(kind: ResultKind, artifact: Vec<u8>) -> Self {
        Self {
            kind,
            artifact,
            previews: Vec::new(),
            extracted: Vec::new(),
        }
    }
}

/// Classifies backend responses and builds their previews.
#[derive(Debug, Clone)]
pub struct Classifier {
    rasterizer: Rasterizer,
    preview_page_cap: usize,
    gallery_cap: usize,
}

impl Classifier {
    pub fn new(rasterizer: Rasterizer, config: &ToolkitConfig) -> Self {
        Self {
            rasterizer,
            preview_page_cap: config.preview_page_cap,
            gallery_cap: config.gallery_cap,
        }
    }

    pub async fn classify(
        &self,
        response: RemoteResponse,
        shape: ResponseShape,
    ) -> Result<Classified, ToolkitError> {
        let content_type = response
            .content_type
            .as_deref()
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response.body;

        // ── Rule 1: page list ──
        if shape == ResponseShape::PageList || looks_like_json(&content_type, &body) {
            match serde_json::from_slice::<PagePayload>(&body) {
                Ok(payload) => return self.page_list(payload).await,
                Err(e) if shape == ResponseShape::PageList => {
                    return Err(NetworkFailure::MalformedResponse(format!(
                        "expected a page list: {e}"
                    ))
                    .into());
                }
                Err(e) => debug!("JSON body without a page list, falling through: {}", e),
            }
        }

        // ── Rule 2: word document ──
        if content_type.contains("wordprocessingml") || content_type.contains("msword") {
            return Ok(Classified::bare(ResultKind::WordDocument, body));
        }

        // ── Rule 3: archive ──
        if content_type.contains("zip") || content_type.contains("octet-stream") {
            let mut out = Classified::bare(ResultKind::UnclassifiedArchive, Vec::new());
            match extract_images(&body) {
                Ok(images) => {
                    out.previews = images
                        .iter()
                        .take(self.gallery_cap)
                        .map(|e| PreviewImage {
                            bytes: e.bytes.clone(),
                            mime_type: sniff(&e.bytes).mime_type(),
                        })
                        .collect();
                    out.extracted = images;
                }
                Err(e) => warn!("Archive preview unavailable: {}", e),
            }
            out.artifact = body;
            return Ok(out);
        }

        // ── Rule 4: document ──
        let previews = self.document_previews(&body, self.preview_page_cap).await;
        let mut out = Classified::bare(ResultKind::Document, body);
        out.previews = previews;
        Ok(out)
    }

    async fn page_list(&self, payload: PagePayload) -> Result<Classified, ToolkitError> {
        let mut entries = Vec::with_capacity(payload.pages.len());
        let mut all_images = !payload.pages.is_empty();
        for (i, page) in payload.pages.iter().enumerate() {
            let bytes = decode_base64(page).map_err(|e| {
                NetworkFailure::MalformedResponse(format!(
                    "page {} is not valid base64: {e}",
                    i + 1
                ))
            })?;
            let kind = sniff(&bytes);
            all_images &= kind.is_image();
            entries.push(ArchiveEntry::new(
                format!("Page_{}.{}", i + 1, kind.extension()),
                bytes,
            ));
        }
        debug!("Page list with {} entries", entries.len());

        let mut previews = Vec::new();
        for entry in entries.iter().take(self.gallery_cap) {
            match sniff(&entry.bytes) {
                Sniffed::Image(_) => previews.push(PreviewImage {
                    bytes: entry.bytes.clone(),
                    mime_type: sniff(&entry.bytes).mime_type(),
                }),
                Sniffed::Pdf => previews.extend(self.document_previews(&entry.bytes, 1).await),
                Sniffed::Unknown => {}
            }
        }

        let artifact = package_archive(&entries)?;
        let kind = if all_images {
            ResultKind::ImageArchive
        } else {
            ResultKind::UnclassifiedArchive
        };
        Ok(Classified {
            kind,
            artifact,
            previews,
            extracted: Vec::new(),
        })
    }

    /// PNG previews of the first `max_pages` pages; empty when the bytes do
    /// not open or render.
    async fn document_previews(&self, bytes: &[u8], max_pages: usize) -> Vec<PreviewImage> {
        let doc = match self
            .rasterizer
            .open_bytes("result.pdf", Arc::from(bytes), None)
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Result preview unavailable: {}", e);
                return Vec::new();
            }
        };
        self.rasterizer
            .preview(&doc, max_pages)
            .await
            .into_iter()
            .map(|r| PreviewImage {
                bytes: r.bytes,
                mime_type: ImageKind::Png.mime_type(),
            })
            .collect()
    }
}

fn looks_like_json(content_type: &str, body: &[u8]) -> bool {
    content_type.contains("json")
        || body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::archive::unpack_archive;
    use crate::pipeline::encode::encode_bitmap;
    use crate::testing::{fake_pdf, FakeEngine};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, Rgb, RgbImage};

    fn classifier() -> Classifier {
        let config = ToolkitConfig::default();
        Classifier::new(
            Rasterizer::new(Arc::new(FakeEngine::default()), &config),
            &config,
        )
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])));
        encode_bitmap(&img, ImageKind::Png, 90).unwrap()
    }

    fn response(ct: Option<&str>, body: Vec<u8>) -> RemoteResponse {
        RemoteResponse {
            status: 200,
            content_type: ct.map(str::to_string),
            body,
        }
    }

    #[tokio::test]
    async fn page_list_of_images_is_image_archive() {
        let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(png()));
        let json = serde_json::json!({ "pages": [STANDARD.encode(png()), data_uri] });
        let out = classifier()
            .classify(
                response(Some("application/json"), json.to_string().into_bytes()),
                ResponseShape::PageList,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::ImageArchive);
        assert_eq!(out.previews.len(), 2);
        let names: Vec<_> = unpack_archive(&out.artifact)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Page_1.png", "Page_2.png"]);
    }

    #[tokio::test]
    async fn page_list_with_pdfs_renders_their_first_page() {
        let json = serde_json::json!({ "pages": [STANDARD.encode(fake_pdf(2))] });
        let out = classifier()
            .classify(
                response(None, json.to_string().into_bytes()),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::UnclassifiedArchive);
        assert_eq!(out.previews.len(), 1);
        assert_eq!(out.previews[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn invalid_base64_is_malformed_response() {
        let body = br#"{"pages":["@@@not-base64@@@"]}"#.to_vec();
        let err = classifier()
            .classify(
                response(Some("application/json"), body),
                ResponseShape::PageList,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolkitError::Network(NetworkFailure::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn word_has_no_preview() {
        let out = classifier()
            .classify(
                response(
                    Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
                    b"PK\x03\x04docx".to_vec(),
                ),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::WordDocument);
        assert!(out.previews.is_empty());
    }

    #[tokio::test]
    async fn zip_with_images_yields_gallery() {
        let zip = package_archive(&[
            ArchiveEntry::new("a.png", png()),
            ArchiveEntry::new("readme.txt", b"hi".to_vec()),
        ])
        .unwrap();
        let out = classifier()
            .classify(
                response(Some("application/zip"), zip.clone()),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::UnclassifiedArchive);
        assert_eq!(out.artifact, zip);
        assert_eq!(out.previews.len(), 1);
        assert_eq!(out.extracted.len(), 1);
        assert_eq!(out.extracted[0].name, "a.png");
    }

    #[tokio::test]
    async fn broken_zip_falls_back_to_no_preview() {
        let out = classifier()
            .classify(
                response(Some("application/octet-stream"), b"garbage".to_vec()),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::UnclassifiedArchive);
        assert!(out.previews.is_empty());
    }

    #[tokio::test]
    async fn pdf_result_gets_capped_previews() {
        let out = classifier()
            .classify(
                response(Some("application/pdf"), fake_pdf(5)),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::Document);
        assert_eq!(
            out.previews.len(),
            ToolkitConfig::default().preview_page_cap
        );
    }

    #[tokio::test]
    async fn unknown_type_and_non_json_degrades_to_document() {
        let out = classifier()
            .classify(
                response(Some("application/x-mystery"), b"not a pdf at all".to_vec()),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::Document);
        assert!(out.previews.is_empty());
        assert_eq!(out.artifact, b"not a pdf at all");
    }

    #[tokio::test]
    async fn json_without_pages_is_not_a_page_list() {
        let out = classifier()
            .classify(
                response(Some("application/json"), br#"{"ok":true}"#.to_vec()),
                ResponseShape::Blob,
            )
            .await
            .unwrap();
        assert_eq!(out.kind, ResultKind::Document);
    }
}
