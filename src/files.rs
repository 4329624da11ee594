//! Upload validation and temporary file lifecycle
//!
//! Every operation works on files saved under a private temp directory:
//! uploads are written as `<uuid><ext>`, outputs get a fresh unique path so
//! that inputs are never overwritten, and all paths are removed best-effort
//! once the response is built.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::FileConfig;
use crate::error::AppError;

/// Content types accepted by the images-to-pdf operation.
const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/tiff",
    "image/bmp",
];

#[derive(Clone)]
pub struct FileStore {
    temp_dir: PathBuf,
    max_file_size: u64,
    max_files: usize,
}

impl FileStore {
    pub fn new(config: &FileConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;
        Ok(FileStore {
            temp_dir: config.temp_dir.clone(),
            max_file_size: config.max_file_size_bytes(),
            max_files: config.max_files_count,
        })
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Allocate a unique path under the temp directory.
    pub fn temp_path(&self, extension: &str) -> PathBuf {
        self.temp_dir.join(format!("{}{}", Uuid::new_v4(), extension))
    }

    /// Persist uploaded bytes to a fresh temp path.
    pub async fn save_bytes(&self, data: &[u8], extension: &str) -> std::io::Result<PathBuf> {
        let path = self.temp_path(extension);
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), size = data.len(), "upload saved");
        Ok(path)
    }

    pub fn check_file_size(&self, size: u64) -> Result<(), AppError> {
        if size > self.max_file_size {
            return Err(AppError::FileTooLarge {
                max_mb: self.max_file_size / (1024 * 1024),
            });
        }
        Ok(())
    }

    pub fn check_files_count(&self, count: usize) -> Result<(), AppError> {
        if count == 0 {
            return Err(AppError::NoFiles);
        }
        if count > self.max_files {
            return Err(AppError::TooManyFiles(self.max_files));
        }
        Ok(())
    }

    /// Remove temp files, logging but not failing on errors.
    pub async fn cleanup(&self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "temp file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "temp cleanup failed")
                }
            }
        }
    }
}

/// A PDF upload must either declare `application/pdf` or carry a `.pdf`
/// filename; browsers are inconsistent about which one they send.
pub fn check_pdf_type(content_type: Option<&str>, filename: &str) -> Result<(), AppError> {
    if content_type == Some("application/pdf") || filename.to_lowercase().ends_with(".pdf") {
        return Ok(());
    }
    Err(AppError::UnsupportedFileType(
        content_type.unwrap_or("unknown").to_string(),
    ))
}

pub fn check_image_type(content_type: Option<&str>) -> Result<(), AppError> {
    match content_type {
        Some(ct) if ALLOWED_IMAGE_TYPES.contains(&ct) => Ok(()),
        other => Err(AppError::UnsupportedFileType(
            other.unwrap_or("unknown").to_string(),
        )),
    }
}

/// Reduce a caller-supplied output filename to a safe attachment name.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let safe = if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    };
    if safe.to_lowercase().ends_with(".pdf") {
        safe
    } else {
        format!("{}.pdf", safe)
    }
}

/// Filename stem of an upload, for deriving output names and bookmarks.
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}
