//! Portable raster snapshots: PNG bytes and `data:` URLs.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use tiny_skia::Pixmap;

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("not an image data URL")]
    NotAnImage,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid PNG: {0}")]
    Decode(String),
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

/// An encoded PNG of the canvas at one point in time. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    png: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl Snapshot {
    pub fn encode(pixmap: &Pixmap) -> Result<Self, SnapshotError> {
        let png = pixmap
            .encode_png()
            .map_err(|error| SnapshotError::Encode(error.to_string()))?;
        Ok(Self {
            png: png.into(),
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn to_data_url(&self) -> String {
        format!("{PNG_DATA_URL_PREFIX}{}", B64.encode(&self.png))
    }

    pub fn decode(&self) -> Result<Pixmap, SnapshotError> {
        decode_png(&self.png)
    }
}

pub fn is_image_data_url(text: &str) -> bool {
    text.trim_start().starts_with("data:image")
}

/// Extracts the image bytes from a base64 `data:image/...` URL.
pub fn data_url_bytes(text: &str) -> Result<Vec<u8>, SnapshotError> {
    let trimmed = text.trim();
    if !is_image_data_url(trimmed) {
        return Err(SnapshotError::NotAnImage);
    }
    let (header, payload) = trimmed.split_once(',').ok_or(SnapshotError::NotAnImage)?;
    if !header.ends_with(";base64") {
        return Err(SnapshotError::NotAnImage);
    }
    Ok(B64.decode(payload.as_bytes())?)
}

pub fn decode_png(bytes: &[u8]) -> Result<Pixmap, SnapshotError> {
    Pixmap::decode_png(bytes).map_err(|error| SnapshotError::Decode(error.to_string()))
}
