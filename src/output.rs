//! Result types handed from the uploader to the renderer.

use crate::config::Engine;
use serde::{Deserialize, Serialize};

/// One recognised text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedItem {
    pub text: String,

    /// Certainty reported by the service, always within `0.0..=100.0`.
    pub confidence: f64,

    /// Corner points of the detected region, when the engine reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<[f64; 2]>>,
}

impl RecognizedItem {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_confidence(confidence),
            bbox: None,
        }
    }
}

/// The outcome of one successful submission.
///
/// `items` keeps the order in which the service detected the fragments; it
/// is never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub engine: Engine,
    pub items: Vec<RecognizedItem>,
}

impl RecognitionResult {
    pub fn new(engine: Engine, items: Vec<RecognizedItem>) -> Self {
        Self { engine, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Mean confidence across all items, `None` when nothing was recognised.
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }
        let sum: f64 = self.items.iter().map(|i| i.confidence).sum();
        Some(sum / self.items.len() as f64)
    }

    /// All item texts joined by single spaces, in detection order.
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pin a reported confidence into `0.0..=100.0`.
pub(crate) fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_clamps_confidence() {
        assert_eq!(RecognizedItem::new("x", 140.0).confidence, 100.0);
        assert_eq!(RecognizedItem::new("x", -3.0).confidence, 0.0);
        assert_eq!(RecognizedItem::new("x", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn mean_and_text_follow_detection_order() {
        let r = RecognitionResult::new(
            Engine::Local,
            vec![RecognizedItem::new("A", 90.0), RecognizedItem::new("B", 10.0)],
        );
        assert_eq!(r.text(), "A B");
        assert_eq!(r.mean_confidence(), Some(50.0));
    }

    #[test]
    fn empty_result_has_no_mean() {
        let r = RecognitionResult::new(Engine::EasyOcr, vec![]);
        assert!(r.is_empty());
        assert_eq!(r.mean_confidence(), None);
    }

    #[test]
    fn bbox_omitted_from_json_when_absent() {
        let json = serde_json::to_value(RecognizedItem::new("hi", 50.0)).unwrap();
        assert!(json.get("bbox").is_none());
    }
}
