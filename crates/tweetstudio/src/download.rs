//! Delivery collaborators: where finished bytes go.

use crate::result::ExportResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Single lossless frame
    Png,
    /// Palette-indexed animation
    Gif,
}

impl ExportFormat {
    /// MIME type
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Finished bytes plus their format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOutput {
    /// Encoded file content
    pub bytes: Vec<u8>,
    /// Container format
    pub format: ExportFormat,
}

impl EncodedOutput {
    /// Wrap encoded bytes
    #[must_use]
    pub const fn new(bytes: Vec<u8>, format: ExportFormat) -> Self {
        Self { bytes, format }
    }

    /// MIME type of the content
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// Receives completed exports. Only ever called with a whole file.
pub trait Downloader: Send + Sync {
    /// Hand off `output` under `filename`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the destination rejects the file
    fn deliver(&self, output: &EncodedOutput, filename: &str) -> ExportResult<()>;
}

impl<D: Downloader + ?Sized> Downloader for &D {
    fn deliver(&self, output: &EncodedOutput, filename: &str) -> ExportResult<()> {
        (**self).deliver(output, filename)
    }
}

impl<D: Downloader + ?Sized> Downloader for std::sync::Arc<D> {
    fn deliver(&self, output: &EncodedOutput, filename: &str) -> ExportResult<()> {
        (**self).deliver(output, filename)
    }
}

/// Writes deliveries into a directory
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    dir: PathBuf,
}

impl DirectoryDownloader {
    /// Deliver into `dir`, created on first use
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Destination directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Downloader for DirectoryDownloader {
    fn deliver(&self, output: &EncodedOutput, filename: &str) -> ExportResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, &output.bytes)?;
        info!(path = %path.display(), bytes = output.bytes.len(), mime = output.mime(), "export saved");
        Ok(())
    }
}

/// One recorded delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Filename the export was delivered under
    pub filename: String,
    /// The delivered output
    pub output: EncodedOutput,
}

/// Keeps deliveries in memory
#[derive(Debug, Default)]
pub struct MemoryDownloader {
    deliveries: Mutex<Vec<Delivery>>,
}

impl MemoryDownloader {
    /// Empty downloader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries so far
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of deliveries so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was delivered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Downloader for MemoryDownloader {
    fn deliver(&self, output: &EncodedOutput, filename: &str) -> ExportResult<()> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                filename: filename.to_string(),
                output: output.clone(),
            });
        Ok(())
    }
}
