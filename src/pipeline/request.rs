//! Request stage: send one multipart POST to the recognition service.
//!
//! [`RecognitionService`] is the seam between the uploader state machine and
//! the network. [`HttpRecognitionService`] is the real implementation; tests
//! and embedders can inject their own through
//! [`crate::uploader::Uploader::with_service`].
//!
//! Exactly one request is sent per call. Nothing here retries: a failed
//! submission is repeated only when the user submits again.

use crate::config::{Engine, UploaderConfig};
use crate::error::{OcrViewError, UploadError};
use crate::output::RecognitionResult;
use crate::pipeline::input::ImageFile;
use crate::pipeline::response;
use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info};

/// Something that turns an image and an engine choice into a result.
pub trait RecognitionService: Send + Sync {
    fn recognize<'a>(
        &'a self,
        image: &'a ImageFile,
        engine: Engine,
    ) -> BoxFuture<'a, Result<RecognitionResult, UploadError>>;
}

/// [`RecognitionService`] speaking the multipart/JSON contract over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecognitionService {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpRecognitionService {
    pub fn new(config: &UploaderConfig) -> Result<Self, OcrViewError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("ocrview/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OcrViewError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        image: &ImageFile,
        engine: Engine,
    ) -> Result<RecognitionResult, UploadError> {
        let form = build_form(image, engine)?;
        info!(
            "Sending '{}' to {} with engine '{}'",
            image.name(), self.endpoint, engine
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!("Service replied {} with {} bytes", status, body.len());

        response::interpret(status.as_u16(), &body, engine)
    }

    fn transport_error(&self, e: reqwest::Error) -> UploadError {
        if e.is_timeout() {
            UploadError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            UploadError::Transport {
                detail: error_chain(&e),
            }
        }
    }
}

impl RecognitionService for HttpRecognitionService {
    fn recognize<'a>(
        &'a self,
        image: &'a ImageFile,
        engine: Engine,
    ) -> BoxFuture<'a, Result<RecognitionResult, UploadError>> {
        self.post(image, engine).boxed()
    }
}

/// Multipart body with the raw `file` part and the `engine` text field.
pub fn build_form(image: &ImageFile, engine: Engine) -> Result<Form, UploadError> {
    let part = Part::bytes(image.bytes().to_vec())
        .file_name(image.name().to_string())
        .mime_str(image.media_type())
        .map_err(|e| UploadError::validation(format!("Bad media type '{}': {e}", image.media_type())))?;

    Ok(Form::new()
        .part("file", part)
        .text("engine", engine.as_str()))
}

/// reqwest hides the useful part ("connection refused") in the source chain.
fn error_chain(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}
