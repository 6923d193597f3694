use crate::error::{CompressioError, Result};
use std::path::{Path, PathBuf};

/// Declared MIME types accepted for compression
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "image/svg+xml",
    "text/plain",
    "text/csv",
    "text/html",
    "text/markdown",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "application/x-tar",
    "application/gzip",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/webm",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "application/json",
    "application/octet-stream",
];

/// Extensions accepted when the declared type is missing or unhelpful
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "svg", "txt", "csv", "html", "md", "pdf",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "tar", "gz", "7z", "rar", "mp4", "mov",
    "avi", "webm", "mp3", "wav", "ogg", "json", "bin",
];

/// A file offered for compression, as the user selected or dropped it
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    pub name: String,
    /// Declared MIME type; empty when nothing could be inferred
    pub mime_type: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileCandidate {
    /// Describe a local file. The declared type is inferred from the name,
    /// which is as much as a browser would report for it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            CompressioError::Validation(format!(
                "Failed to read file metadata for '{}': {}",
                path.display(),
                e
            ))
        })?;
        if !metadata.is_file() {
            return Err(CompressioError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            name,
            mime_type,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() && !self.name[1..].contains('.') {
            // ".bashrc" has no extension
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Accept when either the declared MIME type or the extension is allow-listed
pub fn is_valid_file(file: &FileCandidate) -> bool {
    let mime = file.mime_type.trim().to_lowercase();
    if !mime.is_empty() && ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return true;
    }
    file.extension()
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn validate_candidate(file: &FileCandidate, message: &str) -> Result<()> {
    if is_valid_file(file) {
        Ok(())
    } else {
        Err(CompressioError::Validation(format!("{} ({})", message, file.name)))
    }
}
