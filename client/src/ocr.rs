//! Handwriting recognition seam.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[cfg(test)]
#[path = "ocr_test.rs"]
mod ocr_test;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OcrLanguage {
    #[serde(rename = "rus")]
    Rus,
    #[serde(rename = "eng")]
    Eng,
    #[default]
    #[serde(rename = "rus+eng")]
    RusEng,
}

impl OcrLanguage {
    /// Tesseract language code.
    pub fn code(self) -> &'static str {
        match self {
            OcrLanguage::Rus => "rus",
            OcrLanguage::Eng => "eng",
            OcrLanguage::RusEng => "rus+eng",
        }
    }
}

impl std::str::FromStr for OcrLanguage {
    type Err = OcrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rus" => Ok(OcrLanguage::Rus),
            "eng" => Ok(OcrLanguage::Eng),
            "rus+eng" => Ok(OcrLanguage::RusEng),
            other => Err(OcrError::UnsupportedLanguage(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("unsupported OCR language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to run OCR engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("OCR engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognizes text in a PNG image.
    async fn recognize(&self, png: &[u8], language: OcrLanguage) -> Result<String, OcrError>;
}

/// Runs the `tesseract` CLI, piping the image through stdin/stdout.
#[derive(Clone, Debug)]
pub struct TesseractOcr {
    program: PathBuf,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractOcr {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, png: &[u8], language: OcrLanguage) -> Result<String, OcrError> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", language.code()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!(language = language.code(), chars = text.len(), "OCR finished");
        Ok(text)
    }
}
