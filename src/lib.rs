//! # ocrview
//!
//! Submit an image to an OCR service, pick the recognition engine, and view
//! the recognised text fragments colour-coded by confidence.
//!
//! ## Pieces
//!
//! * [`Uploader`]: owns file acquisition (drop or pick), engine selection
//!   and the request lifecycle. Publishes immutable [`Snapshot`]s on a watch
//!   channel.
//! * [`render`]: pure projection of a snapshot into a view: one chip per
//!   fragment, painted from red (0 %) to green (100 %), an engine badge and
//!   a static legend. Outputs ANSI, plain text, HTML, or JSON.
//!
//! ## Service contract
//!
//! ```text
//! POST <endpoint>   multipart: file=<image bytes>, engine=local|easyocr
//!   200 {"engine": "easyocr", "result": [{"text": "…", "confidence": 97.1}, …]}
//!   2xx/4xx/5xx {"error": "…"}   → always a failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocrview::{render, Engine, OutputFormat, Uploader, UploaderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uploader = Uploader::new(UploaderConfig::default())?;
//!     uploader.select_engine(Engine::EasyOcr);
//!
//!     // Errors are also recorded in the snapshot; the render shows them.
//!     let _ = uploader.pick_file("receipt.png").await;
//!     println!("{}", render::render(&uploader.snapshot(), OutputFormat::Ansi)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrview` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocrview = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod recognize;
pub mod render;
pub mod state;
pub mod uploader;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Engine, OverlapPolicy, UploaderConfig, UploaderConfigBuilder};
pub use error::{ErrorKind, OcrViewError, UploadError};
pub use output::{RecognitionResult, RecognizedItem};
pub use pipeline::input::ImageFile;
pub use pipeline::preview::PreviewInfo;
pub use pipeline::request::{HttpRecognitionService, RecognitionService};
pub use progress::{NoopObserver, ObserverRef, SubmissionObserver};
pub use recognize::{recognize_file, recognize_sync, recognize_to_file};
pub use render::{confidence_color, OutputFormat, ResultView, Rgb};
pub use state::{Snapshot, UploadState};
pub use uploader::Uploader;
