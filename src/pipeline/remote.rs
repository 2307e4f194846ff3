//! Remote conversion backend.
//!
//! [`RemoteBackend`] sends one multipart request and hands back the raw
//! response; [`check_status`] turns non-2xx answers into [`NetworkFailure`]s.
//! [`HttpBackend`] is the reqwest implementation. Tests use a scripted
//! backend so no network is needed.
//!
//! Requests are never retried here; a failed run is restarted by the user.

use crate::error::{NetworkFailure, GENERIC_SERVER_MESSAGE};
use crate::pipeline::input::InputFile;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backend messages that mean "try again later" rather than "your file is bad".
static LOCK_CONTENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)database is locked|deadlock|being used by another process|lock timeout")
        .unwrap()
});

/// One multipart POST.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub url: String,
    /// `(field name, file)`, in submission order.
    pub files: Vec<(String, InputFile)>,
    /// `(field name, value)` text fields.
    pub fields: Vec<(String, String)>,
}

impl RemoteRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            files: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn file(mut self, field: impl Into<String>, file: InputFile) -> Self {
        self.files.push((field.into(), file));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Value of a text field, if present.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response as received, before status interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the conversion backend.
pub trait RemoteBackend: Send + Sync {
    /// Send `request` and return the response, whatever its status.
    ///
    /// Only transport problems are errors here. Dropping the future aborts
    /// the request.
    fn send(&self, request: RemoteRequest) -> BoxFuture<'_, Result<RemoteResponse, NetworkFailure>>;
}

/// Map a non-2xx response to a [`NetworkFailure`].
pub fn check_status(response: RemoteResponse) -> Result<RemoteResponse, NetworkFailure> {
    if response.is_success() {
        return Ok(response);
    }
    let body = String::from_utf8_lossy(&response.body).trim().to_string();
    warn!("Backend returned HTTP {}: {}", response.status, body);

    if response.status == 429 {
        return Err(NetworkFailure::RateLimited);
    }
    if LOCK_CONTENTION.is_match(&body) {
        return Err(NetworkFailure::ServerBusy { detail: body });
    }
    Err(NetworkFailure::Rejected {
        status: response.status,
        message: if body.is_empty() {
            GENERIC_SERVER_MESSAGE.to_string()
        } else {
            body
        },
    })
}

// ── reqwest ──────────────────────────────────────────────────────────────

/// [`RemoteBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    /// `timeout_secs: None` leaves the transport default (no overall timeout).
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, NetworkFailure> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| NetworkFailure::Transport {
            url: String::new(),
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }

    fn form(request: &RemoteRequest) -> Result<Form, NetworkFailure> {
        let mut form = Form::new();
        for (field, file) in &request.files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| NetworkFailure::Transport {
                    url: request.url.clone(),
                    reason: format!("invalid MIME type '{}': {}", file.mime_type, e),
                })?;
            form = form.part(field.clone(), part);
        }
        for (name, value) in &request.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }

    async fn post(&self, request: RemoteRequest) -> Result<RemoteResponse, NetworkFailure> {
        let transport = |e: reqwest::Error| NetworkFailure::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let form = Self::form(&request)?;
        info!(
            "POST {} ({} files, {} fields)",
            request.url,
            request.files.len(),
            request.fields.len()
        );
        let response = self
            .client
            .post(&request.url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport)?.to_vec();
        debug!("HTTP {} {:?}, {} bytes", status, content_type, body.len());
        Ok(RemoteResponse {
            status,
            content_type,
            body,
        })
    }
}

impl RemoteBackend for HttpBackend {
    fn send(
        &self,
        request: RemoteRequest,
    ) -> BoxFuture<'_, Result<RemoteResponse, NetworkFailure>> {
        Box::pin(self.post(request))
    }
}
