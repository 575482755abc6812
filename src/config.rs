//! Configuration types for image submission.
//!
//! All uploader behaviour is controlled through [`UploaderConfig`], built
//! via its [`UploaderConfigBuilder`]. The engine enum lives here too because
//! it is the one knob the user changes between submissions.

use crate::error::OcrViewError;
use crate::progress::ObserverRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recognition endpoint of the reference service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/ocr";

/// The service refuses bodies above 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for an [`crate::uploader::Uploader`].
///
/// Built via [`UploaderConfig::builder()`] or using
/// [`UploaderConfig::default()`].
///
/// # Example
/// ```rust
/// use ocrview::{Engine, UploaderConfig};
///
/// let config = UploaderConfig::builder()
///     .endpoint("http://ocr.internal:5000/ocr")
///     .default_engine(Engine::EasyOcr)
///     .request_timeout_secs(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct UploaderConfig {
    /// Recognition service URL receiving the multipart POST.
    /// Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Engine selected when the session starts. Default: [`Engine::Local`].
    pub default_engine: Engine,

    /// Per-request timeout in seconds. Default: 30.
    ///
    /// Expiry is reported as [`crate::error::UploadError::Timeout`], a
    /// transport-class failure.
    pub request_timeout_secs: u64,

    /// Largest file accepted for upload, in bytes. Default: 16 MiB.
    pub max_upload_bytes: usize,

    /// What happens when a submission starts while another is in flight.
    /// Default: [`OverlapPolicy::CancelPrevious`].
    pub overlap: OverlapPolicy,

    /// Optional lifecycle observer (progress spinners, logging sinks).
    pub observer: Option<ObserverRef>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_engine: Engine::default(),
            request_timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            overlap: OverlapPolicy::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("endpoint", &self.endpoint)
            .field("default_engine", &self.default_engine)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("overlap", &self.overlap)
            .field(
                "observer",
                &self.observer.as_ref().map(|_| "<dyn SubmissionObserver>"),
            )
            .finish()
    }
}

impl UploaderConfig {
    /// Create a new builder for `UploaderConfig`.
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`UploaderConfig`].
#[derive(Debug)]
pub struct UploaderConfigBuilder {
    config: UploaderConfig,
}

impl UploaderConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn default_engine(mut self, engine: Engine) -> Self {
        self.config.default_engine = engine;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn overlap(mut self, policy: OverlapPolicy) -> Self {
        self.config.overlap = policy;
        self
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploaderConfig, OcrViewError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.endpoint).map_err(|e| {
            OcrViewError::InvalidConfig(format!("endpoint '{}' is not a URL: {}", c.endpoint, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(OcrViewError::InvalidConfig(format!(
                "endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(OcrViewError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(OcrViewError::InvalidConfig(
                "Maximum upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Recognition backend the service should run.
///
/// Serialised as the wire strings `"local"` and `"easyocr"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Engine {
    /// The service's own custom model. (default)
    #[default]
    #[serde(rename = "local")]
    Local,
    /// EasyOCR.
    #[serde(rename = "easyocr")]
    EasyOcr,
}

impl Engine {
    pub const ALL: [Engine; 2] = [Engine::Local, Engine::EasyOcr];

    /// Value sent in the `engine` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Local => "local",
            Engine::EasyOcr => "easyocr",
        }
    }

    /// Human-readable label used by selectors and the result badge.
    pub fn label(&self) -> &'static str {
        match self {
            Engine::Local => "Local Model",
            Engine::EasyOcr => "EasyOCR",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = OcrViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Engine::Local),
            "easyocr" => Ok(Engine::EasyOcr),
            other => Err(OcrViewError::InvalidConfig(format!(
                "unknown engine '{other}' (expected 'local' or 'easyocr')"
            ))),
        }
    }
}

/// Discipline for a submission that starts while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Abort the in-flight request; the newest submission decides the final
    /// state. (default)
    #[default]
    CancelPrevious,
    /// Refuse the new submission with [`crate::error::UploadError::Busy`].
    RejectWhileBusy,
}
