//! File acquisition: turn a dropped or picked path into a validated upload.
//!
//! Validation happens here, before any network activity. The media type is
//! sniffed from the magic bytes first and only falls back to the file
//! extension when the content is not recognised, which mirrors what a
//! browser reports for `File.type` on unusual encoders.

use crate::error::UploadError;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An image file ready to be sent to the recognition service.
///
/// Only [`ImageFile::from_bytes`] and [`acquire`] build one, so the media
/// type is always `image/*`:
///
/// ```compile_fail
/// let file = ocrview::ImageFile {
///     name: "notes.txt".into(),
///     media_type: "text/plain".into(),
///     bytes: b"hello".to_vec(),
/// };
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl ImageFile {
    /// Validate in-memory bytes as an image upload.
    ///
    /// Fails with [`UploadError::Validation`] when the data is empty, larger
    /// than `max_bytes`, or not an image.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(UploadError::validation(format!("'{name}' is empty")));
        }
        if bytes.len() > max_bytes {
            return Err(too_large(&name, bytes.len() as u64, max_bytes));
        }
        let media_type = detect_media_type(&bytes, &name)
            .ok_or_else(|| UploadError::validation(UploadError::NOT_AN_IMAGE))?;

        debug!("Accepted '{}' as {} ({} bytes)", name, media_type, bytes.len());
        Ok(Self {
            name,
            media_type: media_type.to_string(),
            bytes,
        })
    }

    /// File name sent in the multipart `file` part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always starts with `image/`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Conventional extension for the detected media type.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.media_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("img")
    }
}

/// Read `path` and validate it as an image upload.
pub async fn acquire(path: &Path, max_bytes: usize) -> Result<ImageFile, UploadError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| read_failed(path, &e))?;
    if !meta.is_file() {
        return Err(UploadError::validation(format!(
            "'{}' is not a file",
            path.display()
        )));
    }
    // Reject before reading the whole thing into memory.
    if meta.len() > max_bytes as u64 {
        return Err(too_large(&display_name(path), meta.len(), max_bytes));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| read_failed(path, &e))?;
    ImageFile::from_bytes(display_name(path), bytes, max_bytes)
}

/// Pick the file a drop gesture delivers.
///
/// Only the first file counts; batch upload is not supported.
pub fn first_dropped(paths: &[PathBuf]) -> Result<&Path, UploadError> {
    match paths {
        [] => Err(UploadError::validation(UploadError::NOT_AN_IMAGE)),
        [first, rest @ ..] => {
            if !rest.is_empty() {
                debug!("Ignoring {} extra dropped file(s)", rest.len());
            }
            Ok(first.as_path())
        }
    }
}

/// Media type of `bytes`, or `None` when it is not an image.
pub fn detect_media_type(bytes: &[u8], name: &str) -> Option<&'static str> {
    let format = image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(name).ok())?;
    let mime = format.to_mime_type();
    mime.starts_with("image/").then_some(mime)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_failed(path: &Path, e: &std::io::Error) -> UploadError {
    match e.kind() {
        std::io::ErrorKind::NotFound => {
            UploadError::validation(format!("File not found: '{}'", path.display()))
        }
        std::io::ErrorKind::PermissionDenied => {
            UploadError::validation(format!("Permission denied reading '{}'", path.display()))
        }
        _ => UploadError::validation(format!("Cannot read '{}': {}", path.display(), e)),
    }
}

fn too_large(name: &str, len: u64, max_bytes: usize) -> UploadError {
    UploadError::validation(format!(
        "'{name}' is {len} bytes; the limit is {max_bytes} bytes"
    ))
}
