//! Test doubles: a render engine that needs no pdfium, a scripted backend
//! and a recording progress callback.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests under `tests/`.
//!
//! Fake documents are ordinary byte strings such as `%PDF-fake pages=3`;
//! every page is 100 × 50 points.

use crate::error::NetworkFailure;
use crate::pipeline::engine::{pixel_size, EngineError, RenderEngine};
use crate::pipeline::remote::{RemoteBackend, RemoteRequest, RemoteResponse};
use crate::progress::RunProgressCallback;
use crate::state::ProcessingState;
use crate::tools::ToolId;
use futures::future::BoxFuture;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const FAKE_PAGE_WIDTH: f32 = 100.0;
pub const FAKE_PAGE_HEIGHT: f32 = 50.0;

/// Bytes of a fake `pages`-page document.
pub fn fake_pdf(pages: usize) -> Vec<u8> {
    format!("%PDF-fake pages={pages}\n").into_bytes()
}

/// Bytes of a fake document that needs `password` to open.
pub fn fake_locked_pdf(pages: usize, password: &str) -> Vec<u8> {
    format!("%PDF-fake pages={pages} password={password}\n").into_bytes()
}

fn field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.split_whitespace()
        .find_map(|tok| tok.strip_prefix(key)?.strip_prefix('='))
}

/// [`RenderEngine`] over fake documents.
#[derive(Debug, Default, Clone)]
pub struct FakeEngine {
    failing: HashSet<usize>,
}

impl FakeEngine {
    /// Make the given 0-based pages fail to render.
    pub fn failing_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(pages);
        self
    }

    fn open(&self, bytes: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| EngineError::Corrupt("not a fake document".into()))?;
        if let Some(expected) = field(text, "password") {
            match password {
                None => return Err(EngineError::PasswordRequired),
                Some(p) if p != expected => return Err(EngineError::WrongPassword),
                Some(_) => {}
            }
        }
        field(text, "pages")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| EngineError::Corrupt("missing page count".into()))
    }
}

impl RenderEngine for FakeEngine {
    fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize, EngineError> {
        self.open(bytes, password)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page: usize,
        scale: f32,
    ) -> Result<DynamicImage, EngineError> {
        let page_count = self.open(bytes, password)?;
        if page >= page_count {
            return Err(EngineError::PageOutOfRange { page, page_count });
        }
        if self.failing.contains(&page) {
            return Err(EngineError::Render(format!("page {} is damaged", page + 1)));
        }
        let (w, h) = pixel_size(FAKE_PAGE_WIDTH, FAKE_PAGE_HEIGHT, scale);
        let shade = (page * 37 % 256) as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            w,
            h,
            Rgb([shade, 255 - shade, 128]),
        )))
    }
}

/// One scripted backend outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(RemoteResponse),
    Fail(NetworkFailure),
    /// Never answers; only cancellation ends the run.
    Hang,
}

/// [`RemoteBackend`] that replays scripted outcomes and records requests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<RemoteRequest>>>,
}

impl ScriptedBackend {
    pub fn new(outcomes: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    pub fn responding(response: RemoteResponse) -> Self {
        Self::new([Scripted::Respond(response)])
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl RemoteBackend for ScriptedBackend {
    fn send(
        &self,
        request: RemoteRequest,
    ) -> BoxFuture<'_, Result<RemoteResponse, NetworkFailure>> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Scripted::Respond(r)) => Ok(r),
                Some(Scripted::Fail(e)) => Err(e),
                Some(Scripted::Hang) => futures::future::pending().await,
                None => Err(NetworkFailure::Transport {
                    url: "scripted".into(),
                    reason: "script exhausted".into(),
                }),
            }
        })
    }
}

/// Progress callback that records everything it sees.
#[derive(Debug, Default)]
pub struct RecordingCallback {
    pub starts: Mutex<Vec<(ToolId, usize)>>,
    pub states: Mutex<Vec<ProcessingState>>,
    pub pages: Mutex<Vec<(usize, usize)>>,
    pub completed: Mutex<Vec<ProcessingState>>,
}

impl RecordingCallback {
    pub fn states(&self) -> Vec<ProcessingState> {
        self.states.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.states().iter().map(|s| s.progress).collect()
    }
}

impl RunProgressCallback for RecordingCallback {
    fn on_run_start(&self, tool: ToolId, file_count: usize) {
        self.starts.lock().unwrap().push((tool, file_count));
    }

    fn on_state_change(&self, state: &ProcessingState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_page_rendered(&self, page_num: usize, total_pages: usize, _encoded_len: usize) {
        self.pages.lock().unwrap().push((page_num, total_pages));
    }

    fn on_run_complete(&self, state: &ProcessingState) {
        self.completed.lock().unwrap().push(state.clone());
    }
}
