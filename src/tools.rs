//! Tool registry.
//!
//! Each tool is a row in [`TOOLS`]: what it accepts, which parameters it takes,
//! where it runs and what its backend answers with. The orchestrator interprets
//! descriptors generically; adding a backend tool is a table change.

use crate::error::ToolkitError;
use crate::params::{ParamKind, ParamSpec, ResolvedParams, ToolParameters};
use crate::pipeline::input::{ensure_pdf, InputFile, InputKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a tool. Serialises as its slug (`"pdf-to-img"`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolId {
    #[serde(rename = "img-to-pdf")]
    ImagesToPdf,
    #[serde(rename = "merge-pdf")]
    MergePdf,
    #[serde(rename = "split-pdf")]
    SplitPdf,
    #[serde(rename = "compress-pdf")]
    CompressPdf,
    #[serde(rename = "pdf-to-img")]
    PdfToImages,
    #[serde(rename = "pdf-to-word")]
    PdfToWord,
    #[serde(rename = "word-to-pdf")]
    WordToPdf,
    #[serde(rename = "booklet-pdf")]
    BookletPdf,
    #[serde(rename = "excel-to-pdf")]
    ExcelToPdf,
    #[serde(rename = "word-to-images")]
    WordToImages,
    #[serde(rename = "add-watermark")]
    AddWatermark,
    #[serde(rename = "add-image-watermark")]
    AddImageWatermark,
    #[serde(rename = "encrypt-pdf")]
    EncryptPdf,
    #[serde(rename = "add-dynamic-alert")]
    AddDynamicAlert,
    #[serde(rename = "add-advanced-annotation")]
    AddAdvancedAnnotation,
    #[serde(rename = "rearrange-pdf")]
    RearrangePdf,
    #[serde(rename = "extract-images")]
    ExtractImages,
}

impl ToolId {
    pub const ALL: [ToolId; 17] = [
        ToolId::ImagesToPdf,
        ToolId::MergePdf,
        ToolId::SplitPdf,
        ToolId::CompressPdf,
        ToolId::PdfToImages,
        ToolId::PdfToWord,
        ToolId::WordToPdf,
        ToolId::BookletPdf,
        ToolId::ExcelToPdf,
        ToolId::WordToImages,
        ToolId::AddWatermark,
        ToolId::AddImageWatermark,
        ToolId::EncryptPdf,
        ToolId::AddDynamicAlert,
        ToolId::AddAdvancedAnnotation,
        ToolId::RearrangePdf,
        ToolId::ExtractImages,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ToolId::ImagesToPdf => "img-to-pdf",
            ToolId::MergePdf => "merge-pdf",
            ToolId::SplitPdf => "split-pdf",
            ToolId::CompressPdf => "compress-pdf",
            ToolId::PdfToImages => "pdf-to-img",
            ToolId::PdfToWord => "pdf-to-word",
            ToolId::WordToPdf => "word-to-pdf",
            ToolId::BookletPdf => "booklet-pdf",
            ToolId::ExcelToPdf => "excel-to-pdf",
            ToolId::WordToImages => "word-to-images",
            ToolId::AddWatermark => "add-watermark",
            ToolId::AddImageWatermark => "add-image-watermark",
            ToolId::EncryptPdf => "encrypt-pdf",
            ToolId::AddDynamicAlert => "add-dynamic-alert",
            ToolId::AddAdvancedAnnotation => "add-advanced-annotation",
            ToolId::RearrangePdf => "rearrange-pdf",
            ToolId::ExtractImages => "extract-images",
        }
    }

    pub fn descriptor(self) -> &'static ToolDescriptor {
        // TOOLS is ordered like ToolId::ALL.
        &TOOLS[self as usize]
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ToolId {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        ToolId::ALL
            .into_iter()
            .find(|t| t.slug() == s)
            .ok_or_else(|| ToolkitError::Validation(format!("Unknown tool '{s}'.")))
    }
}

/// How many input files a tool takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    ExactlyOne,
    OneOrMore,
}

/// Backend endpoint plus the multipart field name its input files go under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    pub file_field: &'static str,
}

const fn ep(path: &'static str, file_field: &'static str) -> Endpoint {
    Endpoint { path, file_field }
}

/// Endpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Fixed(Endpoint),
    /// Chosen by the value of a `Choice` parameter.
    ByChoice {
        param: &'static str,
        routes: &'static [(&'static str, Endpoint)],
    },
}

impl Route {
    pub fn resolve(&self, params: &ResolvedParams) -> Result<Endpoint, ToolkitError> {
        match self {
            Route::Fixed(e) => Ok(*e),
            Route::ByChoice { param, routes } => {
                let value = params.value(param).ok_or_else(|| {
                    ToolkitError::Internal(format!("route parameter '{param}' unresolved"))
                })?;
                routes
                    .iter()
                    .find(|(choice, _)| *choice == value)
                    .map(|(_, e)| *e)
                    .ok_or_else(|| {
                        ToolkitError::Validation(format!(
                            "Parameter '{param}': unsupported value '{value}'."
                        ))
                    })
            }
        }
    }
}

/// Where a tool's work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Rasterize every page locally and package the bitmaps.
    Rasterize,
    Remote(Route),
}

/// What the backend is expected to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single binary body, classified by content type.
    Blob,
    /// `{ "pages": [base64, …] }`.
    PageList,
}

/// Cross-parameter constraint checked after individual values are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `low <= high`, both integer parameters.
    Ordered {
        low: &'static str,
        high: &'static str,
    },
}

impl Constraint {
    fn check(&self, params: &ResolvedParams) -> Result<(), ToolkitError> {
        match *self {
            Constraint::Ordered { low, high } => {
                let lo = params.value(low).and_then(|v| v.parse::<i64>().ok());
                let hi = params.value(high).and_then(|v| v.parse::<i64>().ok());
                match (lo, hi) {
                    (Some(lo), Some(hi)) if lo > hi => Err(ToolkitError::Validation(format!(
                        "'{low}' ({lo}) must not exceed '{high}' ({hi})."
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Declarative description of one tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolDescriptor {
    pub id: ToolId,
    pub title: &'static str,
    pub description: &'static str,
    pub arity: Arity,
    pub accepts: InputKind,
    pub params: &'static [ParamSpec],
    pub constraints: &'static [Constraint],
    pub execution: Execution,
    pub response: ResponseShape,
    /// Uses the backend's document-conversion engine; only changes the
    /// upload status message.
    pub high_fidelity: bool,
}

impl ToolDescriptor {
    pub fn is_local(&self) -> bool {
        matches!(self.execution, Execution::Rasterize)
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check input arity and input kinds.
    pub fn validate_inputs(&self, files: &[InputFile]) -> Result<(), ToolkitError> {
        match (self.arity, files.len()) {
            (_, 0) => {
                return Err(ToolkitError::Validation(format!(
                    "{} needs at least one input file.",
                    self.title
                )));
            }
            (Arity::ExactlyOne, n) if n > 1 => {
                return Err(ToolkitError::Validation(format!(
                    "{} takes exactly one file, got {n}.",
                    self.title
                )));
            }
            _ => {}
        }
        if let Some(bad) = files.iter().find(|f| !self.accepts.matches(f)) {
            return Err(ToolkitError::Validation(format!(
                "{} expects {}; '{}' is not one.",
                self.title,
                self.accepts.describe(),
                bad.name
            )));
        }
        if self.accepts == InputKind::Pdf {
            for file in files {
                ensure_pdf(&file.name, &file.bytes)?;
            }
        }
        Ok(())
    }

    /// Resolve parameters and check cross-parameter constraints.
    pub fn resolve_params(&self, params: &ToolParameters) -> Result<ResolvedParams, ToolkitError> {
        let resolved = crate::params::resolve(self.params, params)?;
        for c in self.constraints {
            c.check(&resolved)?;
        }
        Ok(resolved)
    }
}

// ── Parameter schemas ────────────────────────────────────────────────────

const NO_PARAMS: &[ParamSpec] = &[];

const SPLIT_PARAMS: &[ParamSpec] = &[
    ParamSpec::local("mode", ParamKind::Choice(&["range", "individual"]), "range"),
    ParamSpec::optional(
        "start_page",
        "StartPage",
        ParamKind::Integer {
            min: 1,
            max: 100_000,
        },
        "1",
    )
    .only_when("mode", "range"),
    ParamSpec::optional(
        "end_page",
        "EndPage",
        ParamKind::Integer {
            min: 1,
            max: 100_000,
        },
        "1",
    )
    .only_when("mode", "range"),
];

const SPLIT_ROUTES: &[(&str, Endpoint)] = &[
    ("range", ep("SplitPdfRange", "File")),
    ("individual", ep("SplitPdf", "file")),
];

const PDF_TO_IMG_PARAMS: &[ParamSpec] = &[
    ParamSpec::local("format", ParamKind::Choice(&["jpeg", "png"]), "jpeg"),
    ParamSpec::unset("password", None, ParamKind::Text),
];

const WATERMARK_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("text", "text", ParamKind::Text),
    ParamSpec::optional(
        "font_size",
        "fontSize",
        ParamKind::Integer { min: 8, max: 200 },
        "48",
    ),
    ParamSpec::optional(
        "opacity",
        "opacity",
        ParamKind::Number { min: 0.0, max: 1.0 },
        "0.3",
    ),
    ParamSpec::optional("color", "color", ParamKind::Color, "#FF0000"),
    ParamSpec::optional(
        "rotation",
        "rotation",
        ParamKind::Integer {
            min: -180,
            max: 180,
        },
        "45",
    ),
];

const IMAGE_WATERMARK_PARAMS: &[ParamSpec] = &[
    ParamSpec::required(
        "watermark",
        "watermarkImage",
        ParamKind::Attachment(InputKind::Image),
    ),
    ParamSpec::optional(
        "opacity",
        "opacity",
        ParamKind::Number { min: 0.0, max: 1.0 },
        "0.5",
    ),
    ParamSpec::optional(
        "scale",
        "scale",
        ParamKind::Number {
            min: 0.05,
            max: 1.0,
        },
        "0.5",
    ),
];

const ENCRYPT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("password", "password", ParamKind::Text),
    ParamSpec::unset("owner_password", Some("ownerPassword"), ParamKind::Text),
];

const ALERT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("message", "alertText", ParamKind::Text),
    ParamSpec::optional("show_on_open", "showOnOpen", ParamKind::Flag, "true"),
];

const ANNOTATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("text", "text", ParamKind::Text),
    ParamSpec::optional(
        "page",
        "pageNumber",
        ParamKind::Integer {
            min: 1,
            max: 100_000,
        },
        "1",
    ),
    ParamSpec::optional(
        "x",
        "x",
        ParamKind::Number {
            min: 0.0,
            max: 10_000.0,
        },
        "50",
    ),
    ParamSpec::optional(
        "y",
        "y",
        ParamKind::Number {
            min: 0.0,
            max: 10_000.0,
        },
        "50",
    ),
    ParamSpec::optional("color", "color", ParamKind::Color, "#FFFF00"),
];

const REARRANGE_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "page_order",
    "pageOrder",
    ParamKind::PageOrder,
)];

// ── Registry ─────────────────────────────────────────────────────────────

const fn remote(
    id: ToolId,
    title: &'static str,
    description: &'static str,
    arity: Arity,
    accepts: InputKind,
    params: &'static [ParamSpec],
    endpoint: Endpoint,
) -> ToolDescriptor {
    ToolDescriptor {
        id,
        title,
        description,
        arity,
        accepts,
        params,
        constraints: &[],
        execution: Execution::Remote(Route::Fixed(endpoint)),
        response: ResponseShape::Blob,
        high_fidelity: false,
    }
}

/// All tools, in [`ToolId::ALL`] order.
pub static TOOLS: [ToolDescriptor; 17] = [
    remote(
        ToolId::ImagesToPdf,
        "Images to PDF",
        "Convert JPG, PNG, and more into a PDF document.",
        Arity::OneOrMore,
        InputKind::Image,
        NO_PARAMS,
        ep("ConvertImagesToPdf", "files"),
    ),
    remote(
        ToolId::MergePdf,
        "Merge PDF",
        "Combine multiple PDF files into one document.",
        Arity::OneOrMore,
        InputKind::Pdf,
        NO_PARAMS,
        ep("MergePdf", "files"),
    ),
    ToolDescriptor {
        id: ToolId::SplitPdf,
        title: "Split PDF",
        description: "Extract a page range or save each page as a separate file.",
        arity: Arity::ExactlyOne,
        accepts: InputKind::Pdf,
        params: SPLIT_PARAMS,
        constraints: &[Constraint::Ordered {
            low: "start_page",
            high: "end_page",
        }],
        execution: Execution::Remote(Route::ByChoice {
            param: "mode",
            routes: SPLIT_ROUTES,
        }),
        response: ResponseShape::Blob,
        high_fidelity: false,
    },
    remote(
        ToolId::CompressPdf,
        "Compress PDF",
        "Reduce the file size of a PDF.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        NO_PARAMS,
        ep("CompressPdf", "file"),
    ),
    ToolDescriptor {
        id: ToolId::PdfToImages,
        title: "PDF to Images",
        description: "Render every page to a JPG or PNG image.",
        arity: Arity::ExactlyOne,
        accepts: InputKind::Pdf,
        params: PDF_TO_IMG_PARAMS,
        constraints: &[],
        execution: Execution::Rasterize,
        response: ResponseShape::Blob,
        high_fidelity: false,
    },
    ToolDescriptor {
        high_fidelity: true,
        ..remote(
            ToolId::PdfToWord,
            "PDF to Word",
            "Turn a PDF into an editable Word document.",
            Arity::ExactlyOne,
            InputKind::Pdf,
            NO_PARAMS,
            ep("PdfToWord", "file"),
        )
    },
    ToolDescriptor {
        high_fidelity: true,
        ..remote(
            ToolId::WordToPdf,
            "Word to PDF",
            "Convert a Word document into a PDF.",
            Arity::ExactlyOne,
            InputKind::Word,
            NO_PARAMS,
            ep("WordToPdf", "file"),
        )
    },
    remote(
        ToolId::BookletPdf,
        "PDF Booklet",
        "Impose pages for printing and folding as a booklet.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        NO_PARAMS,
        ep("BookletPdf", "file"),
    ),
    remote(
        ToolId::ExcelToPdf,
        "Excel to PDF",
        "Convert a spreadsheet into a PDF.",
        Arity::ExactlyOne,
        InputKind::Spreadsheet,
        NO_PARAMS,
        ep("ExcelToPdf", "file"),
    ),
    ToolDescriptor {
        response: ResponseShape::PageList,
        high_fidelity: true,
        ..remote(
            ToolId::WordToImages,
            "Word to Images",
            "Render each page of a Word document as an image.",
            Arity::ExactlyOne,
            InputKind::Word,
            NO_PARAMS,
            ep("WordToImages", "file"),
        )
    },
    remote(
        ToolId::AddWatermark,
        "Add Watermark",
        "Stamp text across every page.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        WATERMARK_PARAMS,
        ep("AddWatermark", "file"),
    ),
    remote(
        ToolId::AddImageWatermark,
        "Add Image Watermark",
        "Stamp an image across every page.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        IMAGE_WATERMARK_PARAMS,
        ep("AddImageWatermark", "file"),
    ),
    remote(
        ToolId::EncryptPdf,
        "Encrypt PDF",
        "Protect a PDF with a password.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        ENCRYPT_PARAMS,
        ep("EncryptPdf", "file"),
    ),
    remote(
        ToolId::AddDynamicAlert,
        "Add Alert",
        "Show a message when the PDF is opened.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        ALERT_PARAMS,
        ep("AddDynamicAlert", "file"),
    ),
    remote(
        ToolId::AddAdvancedAnnotation,
        "Annotate PDF",
        "Place a coloured note on a page.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        ANNOTATION_PARAMS,
        ep("AddAdvancedAnnotation", "file"),
    ),
    remote(
        ToolId::RearrangePdf,
        "Rearrange Pages",
        "Reorder the pages of a PDF.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        REARRANGE_PARAMS,
        ep("RearrangePdf", "file"),
    ),
    remote(
        ToolId::ExtractImages,
        "Extract Images",
        "Pull every embedded image out of a PDF.",
        Arity::ExactlyOne,
        InputKind::Pdf,
        NO_PARAMS,
        ep("ExtractImages", "file"),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_ordered_like_ids() {
        for (i, id) in ToolId::ALL.iter().enumerate() {
            assert_eq!(TOOLS[i].id, *id, "row {i}");
            assert_eq!(id.descriptor().id, *id);
        }
    }

    #[test]
    fn slugs_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(id.slug().parse::<ToolId>().unwrap(), id);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.slug()));
        }
        assert!("nope".parse::<ToolId>().is_err());
    }

    #[test]
    fn only_pdf_to_img_is_local() {
        let local: Vec<_> = TOOLS.iter().filter(|t| t.is_local()).map(|t| t.id).collect();
        assert_eq!(local, vec![ToolId::PdfToImages]);
    }

    #[test]
    fn multi_input_tools_use_files_field() {
        for t in TOOLS.iter().filter(|t| t.arity == Arity::OneOrMore) {
            match t.execution {
                Execution::Remote(Route::Fixed(e)) => assert_eq!(e.file_field, "files"),
                other => panic!("{}: unexpected {other:?}", t.id),
            }
        }
    }

    #[test]
    fn split_routes_by_mode() {
        let d = ToolId::SplitPdf.descriptor();
        let Execution::Remote(route) = d.execution else {
            panic!("split is remote")
        };
        let range = d.resolve_params(&ToolParameters::new()).unwrap();
        assert_eq!(route.resolve(&range).unwrap(), ep("SplitPdfRange", "File"));
        assert_eq!(
            range.fields,
            vec![("StartPage", "1".to_string()), ("EndPage", "1".to_string())]
        );

        let individual = d
            .resolve_params(&ToolParameters::new().with_text("mode", "individual"))
            .unwrap();
        assert_eq!(route.resolve(&individual).unwrap(), ep("SplitPdf", "file"));
        assert!(individual.fields.is_empty());
    }

    #[test]
    fn individual_split_ignores_page_range() {
        let d = ToolId::SplitPdf.descriptor();
        let params = ToolParameters::new()
            .with_text("mode", "individual")
            .with_integer("start_page", 5)
            .with_integer("end_page", 2);
        let resolved = d.resolve_params(&params).unwrap();
        assert!(resolved.fields.is_empty());
    }

    #[test]
    fn split_range_must_be_ordered() {
        let d = ToolId::SplitPdf.descriptor();
        let params = ToolParameters::new()
            .with_integer("start_page", 5)
            .with_integer("end_page", 2);
        assert!(matches!(
            d.resolve_params(&params),
            Err(ToolkitError::Validation(_))
        ));
    }

    #[test]
    fn encrypt_requires_password() {
        let d = ToolId::EncryptPdf.descriptor();
        assert!(d.resolve_params(&ToolParameters::new()).is_err());
        assert!(d
            .resolve_params(&ToolParameters::new().with_text("password", ""))
            .is_err());
        let ok = d
            .resolve_params(&ToolParameters::new().with_text("password", "s3cret"))
            .unwrap();
        assert_eq!(ok.fields, vec![("password", "s3cret".to_string())]);
    }

    #[test]
    fn image_watermark_requires_image_attachment() {
        let d = ToolId::AddImageWatermark.descriptor();
        assert!(d.resolve_params(&ToolParameters::new()).is_err());
        let pdf = InputFile::new("x.pdf", None, b"%PDF".to_vec());
        assert!(d
            .resolve_params(&ToolParameters::new().with_attachment("watermark", pdf))
            .is_err());
        let logo = InputFile::new("logo.png", None, vec![0u8; 8]);
        let ok = d
            .resolve_params(&ToolParameters::new().with_attachment("watermark", logo))
            .unwrap();
        assert_eq!(ok.attachments.len(), 1);
        assert_eq!(ok.attachments[0].0, "watermarkImage");
    }

    #[test]
    fn input_validation() {
        let merge = ToolId::MergePdf.descriptor();
        let a = InputFile::new("a.pdf", None, b"%PDF".to_vec());
        let b = InputFile::new("b.pdf", None, b"%PDF".to_vec());
        assert!(merge.validate_inputs(&[]).is_err());
        assert!(merge.validate_inputs(&[a.clone(), b.clone()]).is_ok());

        let compress = ToolId::CompressPdf.descriptor();
        assert!(compress.validate_inputs(&[a.clone(), b]).is_err());
        let renamed = InputFile::new("photo.pdf", None, b"\x89PNG".to_vec());
        assert!(matches!(
            compress.validate_inputs(&[renamed]),
            Err(ToolkitError::NotAPdf { .. })
        ));

        let img = ToolId::ImagesToPdf.descriptor();
        let err = img.validate_inputs(&[a]).unwrap_err();
        assert!(err.user_message().contains("a.pdf"));
    }

    #[test]
    fn word_to_images_expects_page_list() {
        let d = ToolId::WordToImages.descriptor();
        assert_eq!(d.response, ResponseShape::PageList);
        assert!(d.high_fidelity);
        assert_eq!(d.accepts, InputKind::Word);
    }
}
