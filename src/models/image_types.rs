use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Bmp,
    Gif,
    Tiff,
}

impl ImageFormat {
    /// Case-insensitive lookup against the supported extension list.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "bmp" => Some(ImageFormat::Bmp),
            "gif" => Some(ImageFormat::Gif),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    pub original_path: PathBuf,
    pub relative_path: PathBuf,
    pub format: ImageFormat,
    /// 1-based position in the sorted discovery sequence.
    pub discovery_order: usize,
}

impl ImageEntry {
    pub fn file_name(&self) -> String {
        self.original_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Extension exactly as it appears on disk, case preserved.
    pub fn extension(&self) -> String {
        self.original_path
            .extension()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Stable display name used in logs, summaries and the rename log.
    pub fn image_ref(&self) -> String {
        self.relative_path.to_string_lossy().replace('\\', "/")
    }
}
