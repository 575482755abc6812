//! Shared session state.
//!
//! The uploader is the only writer; everything else reads immutable
//! [`Snapshot`]s. Snapshots travel over a [`tokio::sync::watch`] channel, so
//! a renderer simply re-renders whatever the latest snapshot says and never
//! observes a half-applied update.

use crate::config::Engine;
use crate::error::UploadError;
use crate::output::RecognitionResult;
use crate::pipeline::preview::PreviewInfo;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome flags of the most recent submission plus the transient drag hover.
///
/// `loading` and `error` are never set together. The preview is independent
/// and survives a failed request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadState {
    pub dragging: bool,
    pub loading: bool,
    pub error: Option<UploadError>,
    pub preview: Option<PreviewInfo>,
}

impl UploadState {
    /// Nothing happening and nothing to report.
    pub fn is_idle(&self) -> bool {
        !self.dragging && !self.loading && self.error.is_none()
    }
}

/// One consistent view of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Engine applied to the next submission.
    pub engine: Engine,
    pub upload: UploadState,
    /// Result of the last successful submission, if it has not been
    /// discarded by a newer one.
    pub result: Option<Arc<RecognitionResult>>,
}

/// Writer side of the session; cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct SessionState {
    tx: watch::Sender<Snapshot>,
}

impl SessionState {
    pub fn new(engine: Engine) -> Self {
        let (tx, _rx) = watch::channel(Snapshot {
            engine,
            ..Snapshot::default()
        });
        Self { tx }
    }

    /// Receiver that wakes on every published change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Apply `f` and notify subscribers if anything changed.
    pub fn update(&self, f: impl FnOnce(&mut Snapshot)) {
        self.tx.send_if_modified(|snap| {
            let before = snap.clone();
            f(snap);
            *snap != before
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecognizedItem;

    #[test]
    fn starts_idle_with_selected_engine() {
        let state = SessionState::new(Engine::EasyOcr);
        let snap = state.snapshot();
        assert_eq!(snap.engine, Engine::EasyOcr);
        assert!(snap.upload.is_idle());
        assert!(snap.result.is_none());
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let state = SessionState::new(Engine::Local);
        let mut rx = state.subscribe();

        state.update(|s| {
            s.result = Some(Arc::new(RecognitionResult::new(
                Engine::Local,
                vec![RecognizedItem::new("hi", 70.0)],
            )))
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().result.as_ref().unwrap().items.len(), 1);
    }

    #[test]
    fn no_op_update_does_not_notify() {
        let state = SessionState::new(Engine::Local);
        let rx = state.subscribe();
        state.update(|s| s.engine = Engine::Local);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn snapshot_with_result_serializes() {
        let snap = Snapshot {
            engine: Engine::EasyOcr,
            upload: UploadState::default(),
            result: Some(Arc::new(RecognitionResult::new(
                Engine::EasyOcr,
                vec![RecognizedItem::new("TOTAL", 97.5)],
            ))),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["result"]["items"][0]["text"], "TOTAL");
        assert_eq!(json["upload"]["loading"], false);
    }
}
