//! Response interpretation: HTTP status + body → result or error.
//!
//! The checks run in a fixed order so every reply maps to exactly one
//! outcome:
//!
//! 1. non-2xx status → [`UploadError::Protocol`] (any `error` text in the
//!    body is attached as detail)
//! 2. body is not JSON → [`UploadError::MalformedResponse`]
//! 3. body carries an `error` field → [`UploadError::Logical`], even on 200
//! 4. body lacks the `result` list → [`UploadError::MalformedResponse`]
//!
//! Kept free of any HTTP client types so it can be tested on plain bytes.

use crate::config::Engine;
use crate::error::UploadError;
use crate::output::{clamp_confidence, RecognitionResult, RecognizedItem};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    engine: Option<Engine>,
    #[serde(alias = "items")]
    result: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    text: String,
    confidence: f64,
    #[serde(default)]
    bbox: Option<Vec<[f64; 2]>>,
}

/// Turn a service reply into a [`RecognitionResult`].
///
/// `requested` is used when the body does not name the engine.
pub fn interpret(
    status: u16,
    body: &[u8],
    requested: Engine,
) -> Result<RecognitionResult, UploadError> {
    if !(200..300).contains(&status) {
        let detail = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| error_message(&v));
        return Err(UploadError::Protocol { status, detail });
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| UploadError::MalformedResponse {
        detail: format!("response is not valid JSON ({e})"),
    })?;

    if let Some(message) = error_message(&value) {
        return Err(UploadError::Logical { message });
    }

    let wire: WireResponse =
        serde_json::from_value(value).map_err(|e| UploadError::MalformedResponse {
            detail: format!("unexpected response shape ({e})"),
        })?;

    let engine = match wire.engine {
        Some(reported) if reported != requested => {
            warn!(
                "Requested engine '{}' but service reports '{}'",
                requested, reported
            );
            reported
        }
        Some(reported) => reported,
        None => requested,
    };

    let items = wire
        .result
        .into_iter()
        .map(|w| {
            let confidence = clamp_confidence(w.confidence);
            if confidence != w.confidence {
                debug!("Clamped confidence {} to {}", w.confidence, confidence);
            }
            RecognizedItem {
                text: w.text,
                confidence,
                bbox: w.bbox,
            }
        })
        .collect();

    Ok(RecognitionResult::new(engine, items))
}

/// The body's `error` field, when it is set to something truthy.
///
/// `null`, `false`, `0` and `""` all mean "no error".
fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
