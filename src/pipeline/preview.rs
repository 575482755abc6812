//! Local preview of the submitted file.
//!
//! A [`Preview`] is a temp-file copy of the upload, addressable through a
//! `file://` URL so any viewer can show it while the request is in flight.
//! The copy lives exactly as long as the `Preview` value: dropping it
//! revokes the URL and deletes the file. The uploader keeps at most one
//! preview alive, so repeated submissions never accumulate files.

use crate::pipeline::input::ImageFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Snapshot-friendly description of a live preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewInfo {
    /// `file://` URL of the preview copy.
    pub url: String,
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
    /// Pixel dimensions, when the format could be decoded.
    pub dimensions: Option<(u32, u32)>,
    pub byte_len: usize,
}

/// Owner of a preview copy. Dropping it revokes the preview.
pub struct Preview {
    file: NamedTempFile,
    info: PreviewInfo,
}

impl Preview {
    /// Write a preview copy of `image` to the system temp directory.
    ///
    /// The copy and the header decode run inside `spawn_blocking`.
    pub async fn create(image: &ImageFile) -> std::io::Result<Self> {
        let image = image.clone();
        tokio::task::spawn_blocking(move || Self::create_blocking(&image))
            .await
            .map_err(|e| std::io::Error::other(format!("Preview task panicked: {}", e)))?
    }

    fn create_blocking(image: &ImageFile) -> std::io::Result<Self> {
        let suffix = format!(".{}", image.extension());
        let mut file = tempfile::Builder::new()
            .prefix("ocrview-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(image.bytes())?;
        file.flush()?;

        let path = file.path().to_path_buf();
        let info = PreviewInfo {
            url: file_url(&path),
            path,
            file_name: image.name().to_string(),
            media_type: image.media_type().to_string(),
            dimensions: image_dimensions(image.bytes()),
            byte_len: image.bytes().len(),
        };
        debug!("Preview for '{}' at {}", info.file_name, info.url);
        Ok(Self { file, info })
    }

    pub fn info(&self) -> &PreviewInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Revoke the preview now instead of waiting for drop.
    pub fn revoke(self) -> std::io::Result<()> {
        let url = self.info.url;
        self.file.close()?;
        debug!("Revoked preview {}", url);
        Ok(())
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Preview").field(&self.info.url).finish()
    }
}

/// Inline the preview as a `data:` URL for self-contained HTML output.
pub async fn data_url(info: &PreviewInfo) -> std::io::Result<String> {
    let bytes = tokio::fs::read(&info.path).await?;
    Ok(format!("data:{};base64,{}", info.media_type, STANDARD.encode(bytes)))
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}
