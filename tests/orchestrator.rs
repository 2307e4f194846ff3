//! Orchestrator integration tests.
//!
//! Everything runs against the fake render engine and a scripted backend
//! from `pdf_toolkit::testing`, so neither pdfium nor a network is needed.

use pdf_toolkit::testing::{
    fake_locked_pdf, fake_pdf, FakeEngine, RecordingCallback, Scripted, ScriptedBackend,
};
use pdf_toolkit::pipeline::engine::EngineError;
use pdf_toolkit::{
    package_archive, unpack_archive, ArchiveEntry, InputFile, NetworkFailure, Orchestrator,
    PageSequenceManager, ProcessingState, RemoteResponse, RenderEngine, ResultKind, Status,
    ToolId, ToolParameters, ToolkitConfig, ToolkitError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn pdf(name: &str, pages: usize) -> InputFile {
    InputFile::new(name, None, fake_pdf(pages))
}

fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        4,
        4,
        image::Rgb([10, 20, 30]),
    ));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    backend: ScriptedBackend,
    recorder: Arc<RecordingCallback>,
}

/// Fake engine that sleeps before every page and counts the pages it drew.
struct SlowEngine {
    inner: FakeEngine,
    delay: Duration,
    rendered: AtomicUsize,
}

impl SlowEngine {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: FakeEngine::default(),
            delay,
            rendered: AtomicUsize::new(0),
        })
    }

    fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }
}

impl RenderEngine for SlowEngine {
    fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
        self.inner.page_count(bytes, password)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page: usize,
        scale: f32,
    ) -> Result<image::DynamicImage, EngineError> {
        std::thread::sleep(self.delay);
        self.rendered.fetch_add(1, Ordering::SeqCst);
        self.inner.render_page(bytes, password, page, scale)
    }
}

fn harness_with(engine: FakeEngine, outcomes: Vec<Scripted>) -> Harness {
    harness_with_engine(Arc::new(engine), outcomes)
}

fn harness_with_engine(engine: Arc<dyn RenderEngine>, outcomes: Vec<Scripted>) -> Harness {
    let recorder = Arc::new(RecordingCallback::default());
    let config = ToolkitConfig::builder()
        .api_base_url("http://backend.test/api/")
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let backend = ScriptedBackend::new(outcomes);
    let orchestrator = Arc::new(Orchestrator::with_components(
        config,
        engine,
        Arc::new(backend.clone()),
    ));
    Harness {
        orchestrator,
        backend,
        recorder,
    }
}

fn harness(outcomes: Vec<Scripted>) -> Harness {
    harness_with(FakeEngine::default(), outcomes)
}

fn download_bytes(o: &Orchestrator, state: &ProcessingState) -> Vec<u8> {
    let url = &state.download.as_ref().expect("download").url;
    o.blobs().get(url).expect("live blob").bytes.to_vec()
}

/// Wait until the published state reaches `progress`.
async fn wait_for_progress(o: &Orchestrator, progress: u8) {
    let mut rx = o.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status == Status::Processing && s.progress >= progress),
    )
    .await
    .expect("timed out waiting for progress")
    .expect("channel closed");
}

// ── Local rasterisation ──────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_png_archive_has_one_entry_per_page() {
    let h = harness(vec![]);
    let params = ToolParameters::new().with_text("format", "png");
    let state = h
        .orchestrator
        .run(ToolId::PdfToImages, vec![pdf("three.pdf", 3)], params)
        .await
        .unwrap();

    assert_eq!(state.status, Status::Success);
    assert_eq!(state.progress, 100);
    assert_eq!(state.result_kind, Some(ResultKind::ImageArchive));
    assert_eq!(
        state.message.as_deref(),
        Some("Done & Ready! Rendered 3 pages.")
    );
    assert_eq!(state.download.as_ref().unwrap().file_name, "pdf-to-img.zip");
    assert_eq!(state.gallery.len(), 3);

    let entries = unpack_archive(&download_bytes(&h.orchestrator, &state)).unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Page_1.png", "Page_2.png", "Page_3.png"]);

    // Export scale 2.0 over 100 × 50 point pages.
    let first = image::load_from_memory(&entries[0].bytes).unwrap();
    assert_eq!((first.width(), first.height()), (200, 100));

    // The gallery is drawn at preview scale 1.0.
    let preview = h
        .orchestrator
        .blobs()
        .get(state.preview.as_ref().unwrap())
        .unwrap();
    let preview = image::load_from_memory(&preview.bytes).unwrap();
    assert_eq!((preview.width(), preview.height()), (100, 50));

    assert!(h.backend.requests().is_empty());
    assert_eq!(
        *h.recorder.pages.lock().unwrap(),
        vec![(1, 3), (2, 3), (3, 3)]
    );
}

#[tokio::test]
async fn jpeg_is_the_default_export_format() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![pdf("two.pdf", 2)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    let entries = unpack_archive(&download_bytes(&h.orchestrator, &state)).unwrap();
    assert_eq!(entries[0].name, "Page_1.jpg");
    assert_eq!(&entries[0].bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let h = harness(vec![]);
    h.orchestrator
        .run(
            ToolId::PdfToImages,
            vec![pdf("seven.pdf", 7)],
            ToolParameters::new(),
        )
        .await
        .unwrap();

    let values = h.recorder.progress_values();
    assert_eq!(values.first(), Some(&5));
    assert_eq!(values.last(), Some(&100));
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");

    let messages: Vec<_> = h
        .recorder
        .states()
        .into_iter()
        .filter_map(|s| s.message)
        .collect();
    assert!(messages.contains(&"Rasterizing page 4 of 7...".to_string()));
    assert_eq!(h.recorder.completed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn a_failing_page_fails_the_export() {
    let h = harness_with(FakeEngine::default().failing_pages([1]), vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![pdf("bad.pdf", 3)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert_eq!(state.message.as_deref(), Some("Could not render page 2."));
    assert!(state.download.is_none());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);
}

#[tokio::test]
async fn locked_document_needs_its_password() {
    let h = harness(vec![]);
    let locked = InputFile::new("locked.pdf", None, fake_locked_pdf(2, "s3cret"));

    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![locked.clone()],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(state.message.unwrap().contains("password"));

    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![locked],
            ToolParameters::new().with_text("password", "s3cret"),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Success);
}

#[tokio::test]
async fn non_pdf_input_is_rejected_before_work_starts() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![InputFile::new("notes.pdf", Some("application/pdf"), b"hello".to_vec())],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(h.recorder.starts.lock().unwrap().is_empty());
}

// ── Rearrange ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rearrange_submits_the_edited_sequence() {
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/pdf",
        fake_pdf(10),
    ))]);

    let mut manager = PageSequenceManager::new();
    let sequence = manager.load(10);
    sequence.reverse();
    assert!(sequence.move_to(9, 0));
    let order = sequence.as_slice().to_vec();

    let state = h
        .orchestrator
        .run(
            ToolId::RearrangePdf,
            vec![pdf("ten.pdf", 10)],
            ToolParameters::new().with_page_order("page_order", order),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Success);

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://backend.test/api/RearrangePdf");
    assert_eq!(
        requests[0].field_value("pageOrder"),
        Some("0,9,8,7,6,5,4,3,2,1")
    );
}

#[tokio::test]
async fn rearrange_rejects_order_of_wrong_length() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::RearrangePdf,
            vec![pdf("four.pdf", 4)],
            ToolParameters::new().with_page_order("page_order", vec![2, 1, 0]),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(h.backend.requests().is_empty());
}

#[tokio::test]
async fn rearrange_rejects_non_permutation() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::RearrangePdf,
            vec![pdf("three.pdf", 3)],
            ToolParameters::new().with_page_order("page_order", vec![0, 0, 1]),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(h.backend.requests().is_empty());
}

// ── Remote failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_reports_busy_without_download() {
    let h = harness(vec![Scripted::Respond(RemoteResponse {
        status: 429,
        content_type: Some("text/plain".into()),
        body: b"Too Many Requests".to_vec(),
    })]);
    let state = h
        .orchestrator
        .run(
            ToolId::CompressPdf,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(state.message.unwrap().contains("busy"));
    assert!(state.download.is_none());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);
}

#[tokio::test]
async fn backend_error_body_becomes_the_message() {
    let h = harness(vec![Scripted::Respond(RemoteResponse {
        status: 400,
        content_type: Some("text/plain".into()),
        body: b"Start page exceeds document length".to_vec(),
    })]);
    let state = h
        .orchestrator
        .run(
            ToolId::SplitPdf,
            vec![pdf("a.pdf", 2)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        state.message.as_deref(),
        Some("Start page exceeds document length")
    );
}

#[tokio::test]
async fn transport_failure_is_an_error_state() {
    let h = harness(vec![Scripted::Fail(NetworkFailure::Transport {
        url: "http://backend.test/api/MergePdf".into(),
        reason: "connection refused".into(),
    })]);
    let state = h
        .orchestrator
        .run(
            ToolId::MergePdf,
            vec![pdf("a.pdf", 1), pdf("b.pdf", 1)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(!state.message.unwrap().contains("refused"));
}

// ── Request shapes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_sends_every_file_in_order() {
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/pdf",
        fake_pdf(3),
    ))]);
    let state = h
        .orchestrator
        .run(
            ToolId::MergePdf,
            vec![pdf("a.pdf", 1), pdf("b.pdf", 2)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.download.unwrap().file_name, "merge-pdf.pdf");

    let request = &h.backend.requests()[0];
    let files: Vec<_> = request
        .files
        .iter()
        .map(|(field, f)| (field.as_str(), f.name.as_str()))
        .collect();
    assert_eq!(files, vec![("files", "a.pdf"), ("files", "b.pdf")]);
}

#[tokio::test]
async fn split_mode_selects_the_endpoint() {
    let ok = || Scripted::Respond(RemoteResponse::ok("application/pdf", fake_pdf(1)));
    let h = harness(vec![ok(), ok()]);

    h.orchestrator
        .run(
            ToolId::SplitPdf,
            vec![pdf("a.pdf", 6)],
            ToolParameters::new()
                .with_integer("start_page", 2)
                .with_integer("end_page", 4),
        )
        .await
        .unwrap();
    h.orchestrator
        .run(
            ToolId::SplitPdf,
            vec![pdf("a.pdf", 6)],
            ToolParameters::new()
                .with_text("mode", "individual")
                .with_integer("start_page", 5)
                .with_integer("end_page", 2),
        )
        .await
        .unwrap();

    let requests = h.backend.requests();
    assert_eq!(requests[0].url, "http://backend.test/api/SplitPdfRange");
    assert_eq!(requests[0].files[0].0, "File");
    assert_eq!(requests[0].field_value("StartPage"), Some("2"));
    assert_eq!(requests[0].field_value("EndPage"), Some("4"));
    assert_eq!(requests[1].url, "http://backend.test/api/SplitPdf");
    assert_eq!(requests[1].files[0].0, "file");
    assert!(requests[1].fields.is_empty());
}

#[tokio::test]
async fn split_range_must_be_ordered() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::SplitPdf,
            vec![pdf("a.pdf", 6)],
            ToolParameters::new()
                .with_integer("start_page", 5)
                .with_integer("end_page", 2),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Error);
    assert!(h.backend.requests().is_empty());
}

#[tokio::test]
async fn watermark_fields_use_wire_names_and_defaults() {
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/pdf",
        fake_pdf(1),
    ))]);
    h.orchestrator
        .run(
            ToolId::AddWatermark,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new()
                .with_text("text", "DRAFT")
                .with_text("color", "#00ff00"),
        )
        .await
        .unwrap();

    let request = &h.backend.requests()[0];
    assert_eq!(request.field_value("text"), Some("DRAFT"));
    assert_eq!(request.field_value("fontSize"), Some("48"));
    assert_eq!(request.field_value("color"), Some("#00FF00"));
}

#[tokio::test]
async fn image_watermark_attaches_the_stamp() {
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/pdf",
        fake_pdf(1),
    ))]);
    let stamp = InputFile::new("logo.png", None, png_bytes());
    let state = h
        .orchestrator
        .run(
            ToolId::AddImageWatermark,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new().with_attachment("watermark", stamp),
        )
        .await
        .unwrap();
    assert_eq!(state.status, Status::Success);

    let request = &h.backend.requests()[0];
    let fields: Vec<_> = request.files.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(fields, vec!["file", "watermarkImage"]);
}

#[tokio::test]
async fn encrypt_without_password_is_rejected() {
    let h = harness(vec![]);
    for params in [
        ToolParameters::new(),
        ToolParameters::new().with_text("password", "   "),
    ] {
        let state = h
            .orchestrator
            .run(ToolId::EncryptPdf, vec![pdf("a.pdf", 1)], params)
            .await
            .unwrap();
        assert_eq!(state.status, Status::Error);
    }
    assert!(h.backend.requests().is_empty());
}

#[tokio::test]
async fn arity_is_enforced() {
    let h = harness(vec![]);
    let none = h
        .orchestrator
        .run(ToolId::MergePdf, vec![], ToolParameters::new())
        .await
        .unwrap();
    assert_eq!(none.status, Status::Error);

    let two = h
        .orchestrator
        .run(
            ToolId::CompressPdf,
            vec![pdf("a.pdf", 1), pdf("b.pdf", 1)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(two.status, Status::Error);
}

// ── Results ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn hi_fi_tools_announce_the_engine() {
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"PK\x03\x04".to_vec(),
    ))]);
    let state = h
        .orchestrator
        .run(
            ToolId::PdfToWord,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.download.unwrap().file_name, "pdf-to-word.docx");
    assert!(h
        .recorder
        .states()
        .iter()
        .any(|s| s.message.as_deref() == Some("Initiating high-fidelity engine...")));
}

#[tokio::test]
async fn archive_result_exposes_selectable_images() {
    let zip = package_archive(&[
        ArchiveEntry::new("img_1.png", png_bytes()),
        ArchiveEntry::new("img_2.png", png_bytes()),
        ArchiveEntry::new("manifest.txt", b"2 images".to_vec()),
    ])
    .unwrap();
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/zip",
        zip,
    ))]);
    let state = h
        .orchestrator
        .run(
            ToolId::ExtractImages,
            vec![pdf("a.pdf", 2)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.result_kind, Some(ResultKind::UnclassifiedArchive));
    assert_eq!(state.gallery.len(), 2);

    let selected = h
        .orchestrator
        .update_extracted_images(|set| {
            set.toggle(1);
            set.package_selected()
        })
        .unwrap()
        .unwrap();
    let names: Vec<_> = unpack_archive(&selected)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["img_2.png"]);

    h.orchestrator.reset();
    assert!(h.orchestrator.extracted_images().is_none());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);
}

#[tokio::test]
async fn page_list_result_is_zipped() {
    use base64::Engine as _;
    let page = base64::engine::general_purpose::STANDARD.encode(png_bytes());
    let body = serde_json::json!({ "pages": [page.clone(), page] }).to_string();
    let h = harness(vec![Scripted::Respond(RemoteResponse::ok(
        "application/json",
        body,
    ))]);
    let state = h
        .orchestrator
        .run(
            ToolId::WordToImages,
            vec![InputFile::new("a.docx", None, b"PK\x03\x04".to_vec())],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    assert_eq!(state.result_kind, Some(ResultKind::ImageArchive));
    assert_eq!(
        state.download.as_ref().unwrap().file_name,
        "word-to-images.zip"
    );
    assert_eq!(
        unpack_archive(&download_bytes(&h.orchestrator, &state))
            .unwrap()
            .len(),
        2
    );
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_during_upload_returns_to_idle() {
    let h = harness(vec![Scripted::Hang]);
    let o = Arc::clone(&h.orchestrator);
    let run = tokio::spawn(async move {
        o.run(
            ToolId::CompressPdf,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new(),
        )
        .await
    });

    wait_for_progress(&h.orchestrator, 20).await;
    h.orchestrator.cancel();

    let state = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(state, ProcessingState::idle());
    assert_eq!(h.orchestrator.state(), ProcessingState::idle());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);
}

#[tokio::test]
async fn cancel_during_export_returns_to_idle() {
    let engine = SlowEngine::new(Duration::from_millis(20));
    let h = harness_with_engine(engine.clone(), vec![]);
    let o = Arc::clone(&h.orchestrator);
    let run = tokio::spawn(async move {
        o.run(
            ToolId::PdfToImages,
            vec![pdf("long.pdf", 40)],
            ToolParameters::new(),
        )
        .await
    });

    // First page published: 10 + 80/40.
    wait_for_progress(&h.orchestrator, 12).await;
    h.orchestrator.cancel();

    let state = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(state, ProcessingState::idle());
    assert!(engine.rendered() < 40, "rendered {}", engine.rendered());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);
    assert!(h.recorder.states().iter().all(|s| s.status != Status::Error));
}

#[tokio::test]
async fn nothing_is_published_after_reset_during_export() {
    let engine = SlowEngine::new(Duration::from_millis(25));
    let h = harness_with_engine(engine.clone(), vec![]);
    let o = Arc::clone(&h.orchestrator);
    let run = tokio::spawn(async move {
        o.run(
            ToolId::PdfToImages,
            vec![pdf("long.pdf", 20)],
            ToolParameters::new(),
        )
        .await
    });

    // First page published: 10 + 80/20.
    wait_for_progress(&h.orchestrator, 14).await;
    h.orchestrator.reset();

    let state = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(state.status, Status::Idle);
    assert_eq!(h.orchestrator.state(), ProcessingState::idle());
    assert_eq!(h.orchestrator.blobs().live_count(), 0);

    let states = h.recorder.states();
    let first_processing = states
        .iter()
        .position(|s| s.status == Status::Processing)
        .expect("run started");
    let reset_at = states[first_processing..]
        .iter()
        .position(|s| s.status == Status::Idle)
        .expect("reset published Idle")
        + first_processing;
    let after: Vec<_> = states[reset_at..].iter().map(|s| s.status).collect();
    assert!(
        after.iter().all(|s| *s == Status::Idle),
        "published after reset: {after:?}"
    );
}

#[tokio::test]
async fn second_run_while_processing_is_refused() {
    let h = harness(vec![Scripted::Hang]);
    let o = Arc::clone(&h.orchestrator);
    let run = tokio::spawn(async move {
        o.run(
            ToolId::CompressPdf,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new(),
        )
        .await
    });
    wait_for_progress(&h.orchestrator, 20).await;

    let second = h
        .orchestrator
        .run(
            ToolId::CompressPdf,
            vec![pdf("b.pdf", 1)],
            ToolParameters::new(),
        )
        .await;
    assert!(matches!(second, Err(ToolkitError::RunInProgress)));

    h.orchestrator.reset();
    let state = run.await.unwrap().unwrap();
    assert_eq!(state.status, Status::Idle);
}

#[tokio::test]
async fn state_stream_sees_the_terminal_state() {
    use tokio_stream::StreamExt;

    let h = harness(vec![]);
    let mut stream = h.orchestrator.state_stream();
    assert_eq!(stream.next().await, Some(ProcessingState::idle()));

    h.orchestrator
        .run(
            ToolId::PdfToImages,
            vec![pdf("a.pdf", 1)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    let latest = stream.next().await.unwrap();
    assert_eq!(latest.status, Status::Success);
}

#[tokio::test]
async fn reset_after_success_releases_every_blob() {
    let h = harness(vec![]);
    let state = h
        .orchestrator
        .run(
            ToolId::PdfToImages,
            vec![pdf("a.pdf", 4)],
            ToolParameters::new(),
        )
        .await
        .unwrap();
    let urls: Vec<_> = state.blob_urls().into_iter().cloned().collect();
    assert!(!urls.is_empty());

    h.orchestrator.reset();
    for url in &urls {
        assert!(h.orchestrator.blobs().get(url).is_none());
    }
    assert_eq!(h.orchestrator.state().status, Status::Idle);
}
