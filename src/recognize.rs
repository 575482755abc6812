//! One-shot entry points: submit a single file and return.
//!
//! These wrap an [`Uploader`] session that lives for exactly one
//! submission. Use the [`Uploader`] directly when the caller needs to
//! switch engines, resubmit, or watch state changes.

use crate::config::{Engine, UploaderConfig};
use crate::error::OcrViewError;
use crate::output::RecognitionResult;
use crate::pipeline::preview;
use crate::render::{self, OutputFormat};
use crate::uploader::Uploader;
use std::path::Path;
use tracing::{info, warn};

/// Recognise the image at `path` with `engine`.
///
/// # Errors
/// Any failed submission surfaces as [`OcrViewError::Upload`]; construction
/// problems (bad endpoint, HTTP client) as the other variants.
pub async fn recognize_file(
    path: impl AsRef<Path>,
    engine: Engine,
    config: &UploaderConfig,
) -> Result<RecognitionResult, OcrViewError> {
    let uploader = Uploader::new(config.clone())?;
    uploader.select_engine(engine);
    let outcome = uploader.pick_file(path.as_ref()).await;
    uploader.shutdown();
    Ok(outcome?.as_ref().clone())
}

/// Synchronous wrapper around [`recognize_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn recognize_sync(
    path: impl AsRef<Path>,
    engine: Engine,
    config: &UploaderConfig,
) -> Result<RecognitionResult, OcrViewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrViewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(recognize_file(path, engine, config))
}

/// Recognise `input` and write the rendered result to `output`.
///
/// HTML output embeds the preview as a `data:` URL so the file stays
/// viewable after the preview copy is revoked. Uses an atomic write
/// (temp file + rename) to prevent partial files.
pub async fn recognize_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    engine: Engine,
    format: OutputFormat,
    config: &UploaderConfig,
) -> Result<RecognitionResult, OcrViewError> {
    let uploader = Uploader::new(config.clone())?;
    uploader.select_engine(engine);
    let outcome = uploader.pick_file(input.as_ref()).await;
    let snapshot = uploader.snapshot();

    let rendered = match (&outcome, format) {
        (Ok(_), OutputFormat::Html) => {
            let src = match snapshot.upload.preview.as_ref() {
                Some(p) => preview::data_url(p)
                    .await
                    .map_err(|e| warn!("Preview not embedded: {}", e))
                    .ok(),
                None => None,
            };
            Ok(render::to_html(
                render::render_result(snapshot.result.as_deref()).as_ref(),
                src.as_deref(),
            ))
        }
        (Ok(_), _) => render::render(&snapshot, format),
        (Err(_), _) => Ok(String::new()),
    };
    uploader.shutdown();

    let result = outcome?;
    write_atomic(output.as_ref(), &rendered?).await?;
    info!("Wrote {}", output.as_ref().display());
    Ok(result.as_ref().clone())
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), OcrViewError> {
    let write_err = |source| OcrViewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}
