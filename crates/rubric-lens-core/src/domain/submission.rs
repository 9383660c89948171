//! Submissions: the artifact being graded and where its bytes come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Upload types the file picker offers by default.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "application/pdf"];

/// How an artifact is transmitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    /// Bitmap formats (PNG, JPEG, ...). Sent as a base64 data URI.
    RasterImage,
    /// SVG and any textual document. Sent as decoded text.
    VectorOrText,
}

impl MediaKind {
    /// Classify a declared MIME type.
    ///
    /// `image/*` is raster unless it is an SVG variant; everything else,
    /// including an empty or unknown type, is treated as text.
    pub fn from_media_type(media_type: &str) -> Self {
        let normalized = media_type.trim().to_ascii_lowercase();
        if normalized.starts_with("image/") && !normalized.contains("svg") {
            MediaKind::RasterImage
        } else {
            MediaKind::VectorOrText
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::RasterImage => "rasterImage",
            MediaKind::VectorOrText => "vectorOrText",
        }
    }
}

/// Guess a MIME type from a file name's extension.
pub fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Something that can yield the raw bytes of a selected artifact.
///
/// Reads are async and may fail; a failure aborts the attempt before any
/// request is sent.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Read the full blob.
    async fn read(&self) -> std::io::Result<Vec<u8>>;

    /// Declared MIME type of the blob.
    fn media_type(&self) -> &str;

    /// Display name (file name for file-backed sources).
    fn name(&self) -> &str;

    fn media_kind(&self) -> MediaKind {
        MediaKind::from_media_type(self.media_type())
    }
}

/// A blob already held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    name: String,
    media_type: String,
    content: Vec<u8>,
}

impl Submission {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            content,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

#[async_trait]
impl ArtifactSource for Submission {
    async fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.content.clone())
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A blob read lazily from disk at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    path: PathBuf,
    name: String,
    media_type: String,
}

impl FileArtifact {
    /// Media type is guessed from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = guess_media_type(&path);
        Self::with_media_type(path, media_type)
    }

    /// Use an explicitly declared media type.
    pub fn with_media_type(path: impl Into<PathBuf>, media_type: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            media_type: media_type.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArtifactSource for FileArtifact {
    async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_classification() {
        assert_eq!(MediaKind::from_media_type("image/png"), MediaKind::RasterImage);
        assert_eq!(MediaKind::from_media_type("image/jpeg"), MediaKind::RasterImage);
        assert_eq!(MediaKind::from_media_type("IMAGE/WEBP"), MediaKind::RasterImage);
        assert_eq!(
            MediaKind::from_media_type("image/svg+xml"),
            MediaKind::VectorOrText
        );
        assert_eq!(
            MediaKind::from_media_type("application/pdf"),
            MediaKind::VectorOrText
        );
        assert_eq!(MediaKind::from_media_type("text/plain"), MediaKind::VectorOrText);
        assert_eq!(MediaKind::from_media_type(""), MediaKind::VectorOrText);
    }

    #[test]
    fn test_guess_media_type_from_extension() {
        assert_eq!(guess_media_type(Path::new("a/b/photo.PNG")), "image/png");
        assert_eq!(guess_media_type(Path::new("diagram.svg")), "image/svg+xml");
        assert_eq!(guess_media_type(Path::new("report.pdf")), "application/pdf");
        assert_eq!(
            guess_media_type(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_accepted_types_are_mixed_kinds() {
        let kinds: Vec<_> = ACCEPTED_MEDIA_TYPES
            .iter()
            .map(|t| MediaKind::from_media_type(t))
            .collect();
        assert!(kinds.contains(&MediaKind::RasterImage));
        assert!(kinds.contains(&MediaKind::VectorOrText));
    }

    #[tokio::test]
    async fn test_file_artifact_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let artifact = FileArtifact::new(&path);
        assert_eq!(artifact.name(), "notes.txt");
        assert_eq!(artifact.media_type(), "text/plain");
        assert_eq!(artifact.media_kind(), MediaKind::VectorOrText);
        assert_eq!(artifact.read().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_file_artifact_missing_file_errors() {
        let artifact = FileArtifact::with_media_type("/definitely/not/here.png", "image/png");
        assert!(artifact.read().await.is_err());
    }
}
