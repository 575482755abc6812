//! Observer trait for per-submission lifecycle events.
//!
//! Inject an [`Arc<dyn SubmissionObserver>`] via
//! [`crate::config::UploaderConfigBuilder::observer`] to receive events as
//! the uploader works through a submission. The CLI drives its spinner from
//! these; a GUI shell could forward them to its own event loop.
//!
//! # Example
//!
//! ```rust
//! use ocrview::{RecognitionResult, SubmissionObserver, UploaderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     completed: AtomicUsize,
//! }
//!
//! impl SubmissionObserver for CountingObserver {
//!     fn on_complete(&self, result: &RecognitionResult) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} fragments", result.items.len());
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { completed: AtomicUsize::new(0) });
//! let config = UploaderConfig::builder()
//!     .observer(observer as Arc<dyn SubmissionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::Engine;
use crate::error::UploadError;
use crate::output::RecognitionResult;
use crate::pipeline::preview::PreviewInfo;
use std::sync::Arc;

/// Called by the uploader as a submission progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Submissions may run on different tasks, so
/// implementations must be `Send + Sync`.
pub trait SubmissionObserver: Send + Sync {
    /// Called once the file passed validation, before the request is sent.
    fn on_submit_start(&self, file_name: &str, engine: Engine) {
        let _ = (file_name, engine);
    }

    /// Called when the local preview for the submitted file is available.
    fn on_preview_ready(&self, preview: &PreviewInfo) {
        let _ = preview;
    }

    /// Called when a submission produced a result that was published.
    fn on_complete(&self, result: &RecognitionResult) {
        let _ = result;
    }

    /// Called when a submission ended in an error, including validation
    /// failures and overlap-policy outcomes.
    fn on_error(&self, error: &UploadError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::UploaderConfig`].
pub type ObserverRef = Arc<dyn SubmissionObserver>;
