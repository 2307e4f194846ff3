//! Pipeline stages used by the orchestrator.
//!
//! Each submodule does one job and is testable on its own; the two outward
//! seams ([`engine::RenderEngine`] and [`remote::RemoteBackend`]) are traits
//! so tests run without pdfium or a network.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ render ──▶ encode ──▶ archive ───────────┐
//! input ─────┤   (pdfium)   (jpeg/png)   (zip)             ├──▶ result
//!            └──▶ remote ──────────────▶ classify ─────────┘
//!                (multipart)            (sniff, preview)
//! ```
//!
//! 1. [`input`]: named input files and their accepted kinds
//! 2. [`engine`]: the rendering seam and its pdfium implementation
//! 3. [`render`]: page rasterisation; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`]: bitmap encoding, base64 payloads and content sniffing
//! 5. [`archive`]: zip packaging and unpacking
//! 6. [`remote`]: the conversion backend client; the only stage with
//!    network I/O
//! 7. [`classify`]: turns a backend response into a typed result

pub mod archive;
pub mod classify;
pub mod encode;
pub mod engine;
pub mod input;
pub mod remote;
pub mod render;
