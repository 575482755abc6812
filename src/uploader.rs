//! The uploader: file acquisition, engine selection and the submission
//! lifecycle.
//!
//! ## Submission pipeline
//!
//! ```text
//! drop / pick ──▶ validate ──▶ begin ──▶ preview ──▶ request ──▶ publish
//!                 (no I/O)    loading=on  (tempfile)  (one POST)   result|error
//!                                 │                                  │
//!                                 └──────── InFlight guard ──────────┘
//!                                          loading=off on every exit
//! ```
//!
//! ## Overlapping submissions
//!
//! Every submission gets a generation number. State writes from a
//! submission are applied only while its generation is current, so a late
//! completion of a superseded request can never overwrite newer state.
//! With [`OverlapPolicy::CancelPrevious`] the older request is also aborted
//! so it stops consuming a connection; with
//! [`OverlapPolicy::RejectWhileBusy`] the newer one is refused instead.

use crate::config::{Engine, OverlapPolicy, UploaderConfig};
use crate::error::{OcrViewError, UploadError};
use crate::output::RecognitionResult;
use crate::pipeline::input::{self, ImageFile};
use crate::pipeline::preview::Preview;
use crate::pipeline::request::{HttpRecognitionService, RecognitionService};
use crate::state::{SessionState, Snapshot};
use futures::future::{abortable, AbortHandle};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Handle to an upload session. Clones share the same session.
#[derive(Clone)]
pub struct Uploader {
    inner: Arc<Inner>,
}

struct Inner {
    config: UploaderConfig,
    service: Arc<dyn RecognitionService>,
    session: SessionState,
    /// The single live preview; replacing it revokes the previous one.
    preview: Mutex<Option<Preview>>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

struct InFlight {
    generation: u64,
    abort: AbortHandle,
}

impl Uploader {
    /// Create an uploader talking HTTP to `config.endpoint`.
    pub fn new(config: UploaderConfig) -> Result<Self, OcrViewError> {
        let service = HttpRecognitionService::new(&config)?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Create an uploader backed by a caller-supplied service.
    pub fn with_service(config: UploaderConfig, service: Arc<dyn RecognitionService>) -> Self {
        let session = SessionState::new(config.default_engine);
        Self {
            inner: Arc::new(Inner {
                config,
                service,
                session,
                preview: Mutex::new(None),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.inner.config
    }

    /// Receiver of every published [`Snapshot`].
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.session.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.session.snapshot()
    }

    // ── Controls ─────────────────────────────────────────────────────────

    /// Choose the engine applied to the next submission.
    pub fn select_engine(&self, engine: Engine) {
        debug!("Engine selected: {}", engine);
        self.inner.session.update(|s| s.engine = engine);
    }

    pub fn engine(&self) -> Engine {
        self.snapshot().engine
    }

    /// A drag gesture entered the drop target.
    pub fn drag_enter(&self) {
        self.inner.session.update(|s| s.upload.dragging = true);
    }

    /// A drag gesture left the drop target without dropping.
    pub fn drag_leave(&self) {
        self.inner.session.update(|s| s.upload.dragging = false);
    }

    /// Files were dropped on the target. Only the first one is submitted.
    pub async fn drop_files(&self, paths: &[PathBuf]) -> Result<Arc<RecognitionResult>, UploadError> {
        self.drag_leave();
        let path = match input::first_dropped(paths) {
            Ok(p) => p,
            Err(e) => return Err(self.reject(e)),
        };
        self.submit_path(path).await
    }

    /// A file was chosen in the file picker.
    pub async fn pick_file(&self, path: impl AsRef<Path>) -> Result<Arc<RecognitionResult>, UploadError> {
        self.submit_path(path.as_ref()).await
    }

    /// Submit an already-loaded file with the currently selected engine.
    pub async fn submit(&self, image: ImageFile) -> Result<Arc<RecognitionResult>, UploadError> {
        let engine = self.engine();
        self.submit_with(image, engine).await
    }

    /// Submit `image` for recognition by `engine`.
    ///
    /// Publishes exactly one outcome: the new result, or an error in the
    /// upload state. `Busy` and `Superseded` are returned but never
    /// published.
    pub async fn submit_with(
        &self,
        image: ImageFile,
        engine: Engine,
    ) -> Result<Arc<RecognitionResult>, UploadError> {
        let inner = &self.inner;
        let guard = self.begin()?;
        let generation = guard.generation;
        let observer = inner.config.observer.clone();

        if let Some(ref o) = observer {
            o.on_submit_start(image.name(), engine);
        }
        self.install_preview(generation, &image).await;

        let timeout_secs = inner.config.request_timeout_secs;
        let service = Arc::clone(&inner.service);
        let (request, abort) = abortable(tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            service.recognize(&image, engine),
        ));
        guard.arm(abort);

        let outcome = match request.await {
            Err(_aborted) => Err(UploadError::Superseded),
            Ok(Err(_elapsed)) => Err(UploadError::Timeout { secs: timeout_secs }),
            Ok(Ok(result)) => result.map(Arc::new),
        };

        let outcome = match outcome {
            Ok(result) => {
                let applied = guard.apply(|s| {
                    s.result = Some(Arc::clone(&result));
                    s.upload.error = None;
                });
                if applied {
                    info!(
                        "Recognised {} fragment(s) with '{}'",
                        result.items.len(),
                        result.engine
                    );
                    Ok(result)
                } else {
                    Err(UploadError::Superseded)
                }
            }
            Err(e) if e.is_reportable() => {
                let applied = guard.apply(|s| s.upload.error = Some(e.clone()));
                if applied {
                    warn!("Submission of '{}' failed: {}", image.name(), e);
                    Err(e)
                } else {
                    Err(UploadError::Superseded)
                }
            }
            Err(e) => Err(e),
        };
        drop(guard);

        if let Some(ref o) = observer {
            match &outcome {
                Ok(result) => o.on_complete(result),
                Err(e) => o.on_error(e),
            }
        }
        outcome
    }

    /// Revoke the preview and abort any in-flight request.
    pub fn shutdown(&self) {
        let preview = {
            let mut in_flight = self.inner.in_flight.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(flight) = in_flight.take() {
                flight.abort.abort();
            }
            let preview = self.inner.preview.lock().take();
            self.inner.session.update(|s| {
                s.upload.loading = false;
                s.upload.preview = None;
            });
            preview
        };
        if let Some(preview) = preview {
            if let Err(e) = preview.revoke() {
                warn!("Failed to revoke preview: {}", e);
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn submit_path(&self, path: &Path) -> Result<Arc<RecognitionResult>, UploadError> {
        match input::acquire(path, self.inner.config.max_upload_bytes).await {
            Ok(image) => self.submit(image).await,
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Record a validation failure. No request is made.
    ///
    /// Under `CancelPrevious` a rejected file still counts as the newest
    /// submission and aborts whatever was in flight, so `loading` and
    /// `error` never coexist.
    fn reject(&self, error: UploadError) -> UploadError {
        let inner = &self.inner;
        let mut in_flight = inner.in_flight.lock();
        if in_flight.is_some() && inner.config.overlap == OverlapPolicy::RejectWhileBusy {
            debug!("Ignoring rejected file while busy: {}", error);
            return UploadError::Busy;
        }
        inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(flight) = in_flight.take() {
            flight.abort.abort();
        }
        inner.session.update(|s| {
            s.upload.loading = false;
            s.upload.error = Some(error.clone());
        });
        drop(in_flight);

        info!("Rejected file: {}", error);
        if let Some(ref o) = inner.config.observer {
            o.on_error(&error);
        }
        error
    }

    /// Claim the in-flight slot for a new submission.
    fn begin(&self) -> Result<InFlightGuard<'_>, UploadError> {
        let inner = &self.inner;
        let mut in_flight = inner.in_flight.lock();
        if let Some(ref flight) = *in_flight {
            match inner.config.overlap {
                OverlapPolicy::RejectWhileBusy => {
                    debug!("Submission rejected: generation {} in flight", flight.generation);
                    drop(in_flight);
                    if let Some(ref o) = inner.config.observer {
                        o.on_error(&UploadError::Busy);
                    }
                    return Err(UploadError::Busy);
                }
                OverlapPolicy::CancelPrevious => {
                    debug!("Cancelling submission generation {}", flight.generation);
                    flight.abort.abort();
                }
            }
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Placeholder until the request future exists; aborting it is a no-op.
        let (abort, _) = AbortHandle::new_pair();
        *in_flight = Some(InFlight { generation, abort });
        inner.session.update(|s| {
            s.upload.loading = true;
            s.upload.error = None;
            s.result = None;
        });
        drop(in_flight);

        Ok(InFlightGuard {
            uploader: self,
            generation,
        })
    }

    async fn install_preview(&self, generation: u64, image: &ImageFile) {
        let preview = match Preview::create(image).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not create preview for '{}': {}", image.name(), e);
                return;
            }
        };
        let info = preview.info().clone();

        // The slot and the published info change together, and only while
        // this generation is current.
        let outcome = {
            let in_flight = self.inner.in_flight.lock();
            let outcome = if self.is_current(generation) {
                let previous = self.inner.preview.lock().replace(preview);
                self.inner
                    .session
                    .update(|s| s.upload.preview = Some(info.clone()));
                Ok(previous)
            } else {
                Err(preview)
            };
            drop(in_flight);
            outcome
        };

        match outcome {
            // Dropping the previous preview revokes it.
            Ok(previous) => {
                drop(previous);
                if let Some(ref o) = self.inner.config.observer {
                    o.on_preview_ready(&info);
                }
            }
            Err(stale) => debug!("Discarding preview of superseded submission {}", stale.info().url),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("config", &self.inner.config)
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish()
    }
}

/// Scoped ownership of the in-flight slot.
///
/// Dropping the guard clears `loading`, whatever path the submission took.
struct InFlightGuard<'a> {
    uploader: &'a Uploader,
    generation: u64,
}

impl InFlightGuard<'_> {
    fn arm(&self, abort: AbortHandle) {
        let mut in_flight = self.uploader.inner.in_flight.lock();
        match *in_flight {
            Some(ref mut flight) if flight.generation == self.generation => flight.abort = abort,
            // Superseded between begin() and now.
            _ => abort.abort(),
        }
    }

    /// Publish the final outcome if this submission is still current.
    ///
    /// `loading` is cleared in the same update, so no snapshot ever shows
    /// it next to an error.
    fn apply(&self, f: impl FnOnce(&mut Snapshot)) -> bool {
        let in_flight = self.uploader.inner.in_flight.lock();
        if !self.uploader.is_current(self.generation) {
            return false;
        }
        self.uploader.inner.session.update(|s| {
            f(s);
            s.upload.loading = false;
        });
        drop(in_flight);
        true
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.uploader.inner;
        let mut in_flight = inner.in_flight.lock();
        if in_flight.as_ref().map(|f| f.generation) == Some(self.generation) {
            *in_flight = None;
        }
        if self.uploader.is_current(self.generation) {
            inner.session.update(|s| s.upload.loading = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecognizedItem;
    use crate::pipeline::input::tests::sample_image;
    use futures::future::{BoxFuture, FutureExt};
    use image::ImageFormat;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Fake service returning canned outcomes, optionally held until released.
    struct FakeService {
        calls: AtomicUsize,
        outcome: Mutex<Result<Vec<RecognizedItem>, UploadError>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeService {
        fn ok(items: Vec<RecognizedItem>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Mutex::new(Ok(items)),
                gate: None,
            })
        }

        fn failing(e: UploadError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Mutex::new(Err(e)),
                gate: None,
            })
        }

        fn gated(items: Vec<RecognizedItem>, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Mutex::new(Ok(items)),
                gate: Some(gate),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RecognitionService for FakeService {
        fn recognize<'a>(
            &'a self,
            _image: &'a ImageFile,
            engine: Engine,
        ) -> BoxFuture<'a, Result<RecognitionResult, UploadError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                // Only the first call waits, so a second submission can finish.
                if let (Some(gate), 0) = (&self.gate, call) {
                    gate.notified().await;
                }
                self.outcome
                    .lock()
                    .clone()
                    .map(|items| RecognitionResult::new(engine, items))
            }
            .boxed()
        }
    }

    fn png(name: &str) -> ImageFile {
        ImageFile::from_bytes(name, sample_image(ImageFormat::Png), 1 << 20).unwrap()
    }

    fn uploader(service: Arc<FakeService>, overlap: OverlapPolicy) -> Uploader {
        let config = UploaderConfig::builder().overlap(overlap).build().unwrap();
        Uploader::with_service(config, service)
    }

    fn items_ab() -> Vec<RecognizedItem> {
        vec![RecognizedItem::new("A", 90.0), RecognizedItem::new("B", 10.0)]
    }

    #[tokio::test]
    async fn success_publishes_result_and_clears_loading() {
        let service = FakeService::ok(items_ab());
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);

        let result = up.submit(png("a.png")).await.unwrap();
        assert_eq!(result.items.len(), 2);

        let snap = up.snapshot();
        assert!(!snap.upload.loading);
        assert!(snap.upload.error.is_none());
        assert!(snap.upload.preview.is_some());
        assert_eq!(snap.result.as_deref(), Some(&*result));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn logical_error_sets_error_state_without_result() {
        let service = FakeService::failing(UploadError::Logical {
            message: "engine unavailable".into(),
        });
        let up = uploader(service, OverlapPolicy::CancelPrevious);

        let err = up.submit(png("a.png")).await.unwrap_err();
        let snap = up.snapshot();
        assert_eq!(snap.upload.error, Some(err));
        assert_eq!(snap.upload.error.unwrap().to_string(), "engine unavailable");
        assert!(!snap.upload.loading);
        assert!(snap.result.is_none());
        // The preview survives the failure.
        assert!(snap.upload.preview.is_some());
    }

    #[tokio::test]
    async fn non_image_drop_never_calls_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just text").unwrap();

        let service = FakeService::ok(items_ab());
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);
        up.drag_enter();

        let err = up.drop_files(&[path]).await.unwrap_err();
        assert_eq!(err, UploadError::validation(UploadError::NOT_AN_IMAGE));
        assert_eq!(service.calls(), 0);

        let snap = up.snapshot();
        assert!(!snap.upload.dragging);
        assert_eq!(snap.upload.error, Some(err));
    }

    #[tokio::test]
    async fn empty_drop_is_validation_error() {
        let service = FakeService::ok(items_ab());
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);
        assert!(matches!(
            up.drop_files(&[]).await,
            Err(UploadError::Validation { .. })
        ));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn new_submission_clears_previous_error() {
        let service = FakeService::failing(UploadError::Transport {
            detail: "refused".into(),
        });
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);
        up.submit(png("a.png")).await.unwrap_err();

        *service.outcome.lock() = Ok(items_ab());
        up.submit(png("a.png")).await.unwrap();
        assert!(up.snapshot().upload.error.is_none());
    }

    #[tokio::test]
    async fn second_result_replaces_first() {
        let service = FakeService::ok(vec![RecognizedItem::new("first", 50.0)]);
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);
        up.submit(png("a.png")).await.unwrap();

        *service.outcome.lock() = Ok(vec![RecognizedItem::new("second", 60.0)]);
        up.submit(png("a.png")).await.unwrap();

        let result = up.snapshot().result.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].text, "second");
    }

    #[tokio::test]
    async fn engine_selection_applies_to_next_submission() {
        let service = FakeService::ok(items_ab());
        let up = uploader(service, OverlapPolicy::CancelPrevious);
        up.select_engine(Engine::EasyOcr);

        let result = up.submit(png("a.png")).await.unwrap();
        assert_eq!(result.engine, Engine::EasyOcr);
    }

    #[tokio::test]
    async fn newer_submission_cancels_older() {
        let gate = Arc::new(Notify::new());
        let service = FakeService::gated(items_ab(), gate.clone());
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);

        let first = tokio::spawn({
            let up = up.clone();
            async move { up.submit(png("first.png")).await }
        });
        while service.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let second = up.submit(png("second.png")).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(first.await.unwrap(), Err(UploadError::Superseded));

        let snap = up.snapshot();
        assert!(!snap.upload.loading);
        assert!(snap.upload.error.is_none());
        assert_eq!(snap.upload.preview.unwrap().file_name, "second.png");
    }

    #[tokio::test]
    async fn reject_policy_refuses_overlap() {
        let gate = Arc::new(Notify::new());
        let service = FakeService::gated(items_ab(), gate.clone());
        let up = uploader(service.clone(), OverlapPolicy::RejectWhileBusy);

        let first = tokio::spawn({
            let up = up.clone();
            async move { up.submit(png("first.png")).await }
        });
        while service.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(up.submit(png("second.png")).await, Err(UploadError::Busy));
        assert!(up.snapshot().upload.loading);
        assert!(up.snapshot().upload.error.is_none());

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!up.snapshot().upload.loading);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn superseded_preview_is_revoked() {
        let service = FakeService::ok(items_ab());
        let up = uploader(service, OverlapPolicy::CancelPrevious);

        up.submit(png("a.png")).await.unwrap();
        let first = up.snapshot().upload.preview.unwrap().path;
        assert!(first.exists());

        up.submit(png("b.png")).await.unwrap();
        let second = up.snapshot().upload.preview.unwrap().path;
        assert!(!first.exists());
        assert!(second.exists());

        up.shutdown();
        assert!(!second.exists());
        assert!(up.snapshot().upload.preview.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_service_times_out() {
        let gate = Arc::new(Notify::new());
        let service = FakeService::gated(items_ab(), gate);
        let config = UploaderConfig::builder()
            .request_timeout_secs(2)
            .build()
            .unwrap();
        let up = Uploader::with_service(config, service);

        let err = up.submit(png("a.png")).await.unwrap_err();
        assert_eq!(err, UploadError::Timeout { secs: 2 });
        assert!(!up.snapshot().upload.loading);
    }

    #[tokio::test]
    async fn shutdown_aborts_in_flight_request() {
        let gate = Arc::new(Notify::new());
        let service = FakeService::gated(items_ab(), gate);
        let up = uploader(service.clone(), OverlapPolicy::CancelPrevious);

        let pending = tokio::spawn({
            let up = up.clone();
            async move { up.submit(png("a.png")).await }
        });
        while service.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let preview = up.snapshot().upload.preview.unwrap().path;
        assert!(up.snapshot().upload.loading);

        up.shutdown();
        assert_eq!(pending.await.unwrap(), Err(UploadError::Superseded));

        let snap = up.snapshot();
        assert!(!snap.upload.loading);
        assert!(snap.upload.error.is_none());
        assert!(snap.result.is_none());
        assert!(snap.upload.preview.is_none());
        assert!(!preview.exists());
    }

    #[tokio::test]
    async fn stale_generation_cannot_publish_preview() {
        let up = uploader(FakeService::ok(items_ab()), OverlapPolicy::CancelPrevious);
        up.submit(png("current.png")).await.unwrap();
        let current = up.snapshot().upload.preview.unwrap();

        let stale = up.inner.generation.load(Ordering::SeqCst) - 1;
        up.install_preview(stale, &png("stale.png")).await;

        assert_eq!(up.snapshot().upload.preview.as_ref(), Some(&current));
        assert!(current.path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_leave_consistent_state() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not an image").unwrap();

        for round in 0..200 {
            let up = uploader(FakeService::ok(items_ab()), OverlapPolicy::CancelPrevious);
            let a = tokio::spawn({
                let up = up.clone();
                async move { up.submit(png("a.png")).await }
            });
            let b = tokio::spawn({
                let up = up.clone();
                async move { up.submit(png("b.png")).await }
            });
            let c = tokio::spawn({
                let up = up.clone();
                let text = text.clone();
                async move { up.pick_file(text).await }
            });
            let (a, b, c) = tokio::join!(a, b, c);
            a.unwrap().ok();
            b.unwrap().ok();
            c.unwrap().ok();

            let snap = up.snapshot();
            assert!(!snap.upload.loading, "round {round}: stuck loading");
            if let Some(ref p) = snap.upload.preview {
                assert!(p.path.exists(), "round {round}: preview {} was revoked", p.url);
            }
            up.shutdown();
        }
    }

    #[tokio::test]
    async fn drag_flags_toggle() {
        let up = uploader(FakeService::ok(vec![]), OverlapPolicy::CancelPrevious);
        up.drag_enter();
        assert!(up.snapshot().upload.dragging);
        up.drag_leave();
        assert!(up.snapshot().upload.is_idle());
    }
}
