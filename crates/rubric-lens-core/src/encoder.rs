//! Artifact encoding.
//!
//! Turns the raw blob of an [`ArtifactSource`] into the string the engine
//! receives:
//! - raster images become a `data:<mime>;base64,<payload>` URI;
//! - SVG and every other type is decoded as UTF-8 text.
//!
//! Decoding is lossy in the same way a browser `text()` read is: invalid
//! byte sequences turn into U+FFFD and a warning is logged. An empty text
//! document encodes to `""`; an empty raster image is an error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ArtifactSource, MediaKind, Submission};

/// Errors produced while reading or encoding an artifact.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to read artifact {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image artifact {name} is empty")]
    Empty { name: String },

    #[error("not a base64 data URI: {0}")]
    InvalidDataUri(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Transmittable form of an artifact. Derived and read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodedArtifact {
    DataUri { media_type: String, uri: String },
    Text { media_type: String, text: String },
}

impl EncodedArtifact {
    /// The encoded string itself.
    pub fn as_str(&self) -> &str {
        match self {
            EncodedArtifact::DataUri { uri, .. } => uri,
            EncodedArtifact::Text { text, .. } => text,
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            EncodedArtifact::DataUri { media_type, .. } | EncodedArtifact::Text { media_type, .. } => {
                media_type
            }
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            EncodedArtifact::DataUri { .. } => MediaKind::RasterImage,
            EncodedArtifact::Text { .. } => MediaKind::VectorOrText,
        }
    }

    /// Base64 payload without the `data:...;base64,` prefix.
    pub fn base64_payload(&self) -> Option<&str> {
        match self {
            EncodedArtifact::DataUri { uri, .. } => uri.split_once(',').map(|(_, data)| data),
            EncodedArtifact::Text { .. } => None,
        }
    }

    /// Length of the encoded string in bytes.
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

/// Build a data URI from raw bytes.
pub fn to_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Inverse of [`to_data_uri`]: returns `(media_type, bytes)`.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), EncodeError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| EncodeError::InvalidDataUri(truncate(uri)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EncodeError::InvalidDataUri(truncate(uri)))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| EncodeError::InvalidDataUri(truncate(uri)))?;

    let bytes = STANDARD.decode(payload)?;
    Ok((media_type.to_string(), bytes))
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}

/// Encode raw bytes according to the declared media type.
pub fn encode_bytes(media_type: &str, bytes: &[u8]) -> EncodedArtifact {
    match MediaKind::from_media_type(media_type) {
        MediaKind::RasterImage => EncodedArtifact::DataUri {
            media_type: media_type.to_string(),
            uri: to_data_uri(media_type, bytes),
        },
        MediaKind::VectorOrText => {
            let text = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = text {
                warn!(
                    media_type = %media_type,
                    "artifact is not valid UTF-8; invalid sequences were replaced"
                );
            }
            EncodedArtifact::Text {
                media_type: media_type.to_string(),
                text: text.into_owned(),
            }
        }
    }
}

async fn read_bytes(source: &dyn ArtifactSource) -> Result<Vec<u8>, EncodeError> {
    source.read().await.map_err(|e| EncodeError::Read {
        name: source.name().to_string(),
        source: e,
    })
}

/// Read `source` once into an in-memory [`Submission`].
///
/// Encoding and hashing the snapshot both see the same bytes, however the
/// underlying file changes afterwards.
pub async fn snapshot_artifact(source: &dyn ArtifactSource) -> Result<Submission, EncodeError> {
    let bytes = read_bytes(source).await?;
    Ok(Submission::new(source.name(), source.media_type(), bytes))
}

/// Read an artifact and encode it.
///
/// A read failure or an empty raster image aborts the encode step; no
/// partial value is ever returned.
pub async fn encode_artifact(source: &dyn ArtifactSource) -> Result<EncodedArtifact, EncodeError> {
    let bytes = read_bytes(source).await?;

    if bytes.is_empty() && MediaKind::from_media_type(source.media_type()) == MediaKind::RasterImage {
        return Err(EncodeError::Empty {
            name: source.name().to_string(),
        });
    }

    let encoded = encode_bytes(source.media_type(), &bytes);
    debug!(
        artifact = %source.name(),
        media_kind = encoded.media_kind().as_str(),
        raw_bytes = bytes.len(),
        encoded_bytes = encoded.len(),
        "artifact encoded"
    );
    Ok(encoded)
}
