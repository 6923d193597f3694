//! Fetch stored artifacts and save them locally.

use crate::api::{CompressionApi, DownloadedArtifact};
use crate::config::ensure_private_dir;
use crate::error::{CompressioError, Result};
use crate::history::HistoryEntry;
use crate::i18n::Language;
use crate::notify::{NotificationLevel, Notifier};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct DownloadClient<A: CompressionApi> {
    api: Arc<A>,
    notifier: Arc<dyn Notifier>,
    download_dir: PathBuf,
    language: Language,
}

impl<A: CompressionApi> DownloadClient<A> {
    pub fn new(
        api: Arc<A>,
        notifier: Arc<dyn Notifier>,
        download_dir: PathBuf,
        language: Language,
    ) -> Self {
        Self {
            api,
            notifier,
            download_dir,
            language,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download the compressed artifact, or the original upload when `original` is set.
    ///
    /// Failures are reported to the user and returned; history is never touched.
    pub async fn download_file(&self, file_id: &str, original: bool) -> Result<PathBuf> {
        let saved = match self.api.download(file_id, original).await {
            Ok(artifact) => self.save(file_id, original, artifact),
            Err(e) => Err(e),
        };
        self.report(file_id, original, saved)
    }

    /// Like `download_file`, but a compressed download follows the link the
    /// server put in the entry's result record when there is one.
    pub async fn download_entry(&self, entry: &HistoryEntry, original: bool) -> Result<PathBuf> {
        let fetched = match entry.download_url.as_deref() {
            Some(link) if !original && !link.trim().is_empty() => {
                self.api.download_link(link).await
            }
            _ => self.api.download(&entry.file_id, original).await,
        };
        let saved = fetched.and_then(|artifact| self.save(&entry.file_id, original, artifact));
        self.report(&entry.file_id, original, saved)
    }

    fn save(&self, file_id: &str, original: bool, artifact: DownloadedArtifact) -> Result<PathBuf> {
        let filename = artifact
            .content_disposition
            .as_deref()
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| fallback_filename(file_id, original));
        save_artifact(&self.download_dir, &filename, &artifact.bytes)
    }

    fn report(&self, file_id: &str, original: bool, saved: Result<PathBuf>) -> Result<PathBuf> {
        match saved {
            Ok(path) => {
                info!(file_id = %file_id, original, path = %path.display(), "Download saved");
                self.notifier.notify(
                    NotificationLevel::Success,
                    &format!(
                        "{} {}",
                        self.language.messages().download_success,
                        path.display()
                    ),
                );
                Ok(path)
            }
            Err(e) => {
                warn!(file_id = %file_id, original, error = %e, "Download failed");
                let message = match &e {
                    CompressioError::Api { message, .. } => message.clone(),
                    other => format!("{} ({})", self.language.messages().download_failed, other),
                };
                self.notifier.notify(NotificationLevel::Error, &message);
                Err(e)
            }
        }
    }
}

pub fn fallback_filename(file_id: &str, original: bool) -> String {
    let safe_id = sanitize_filename(file_id).unwrap_or_else(|| "file".to_string());
    if original {
        format!("original_{}", safe_id)
    } else {
        format!("downloaded_{}", safe_id)
    }
}

/// Filename from a `Content-Disposition` header.
///
/// `filename*=UTF-8''…` wins over `filename=…`; quoted and bare values are
/// both accepted. Directory parts are stripped from whatever the server sent.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(header) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                    extended = Some(decoded.into_owned());
                }
            }
            "filename" => {
                plain = Some(unquote(value));
            }
            _ => {}
        }
    }

    extended
        .and_then(|name| sanitize_filename(&name))
        .or_else(|| plain.and_then(|name| sanitize_filename(&name)))
}

fn split_params(header: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in header.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => params.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    params.push(current);
    params
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        value.trim_matches('"').to_string()
    }
}

/// Keep only the final path component; reject names that would escape the directory
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned)
}

/// Write bytes under `dir` without clobbering an existing file.
///
/// The target name is claimed first, so concurrent saves of the same name
/// end up in different files. Data lands in a `.part` file and is renamed
/// over the claimed name once fully written.
pub fn save_artifact(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    ensure_private_dir(dir)?;
    let target = claim_unique_path(dir, filename)?;
    let part = target.with_file_name(format!(
        ".{}.part",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&part)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&part, &target)?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&part);
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    Ok(target)
}

/// Create an empty placeholder at the first free name: `name`, `name (1)`, ...
fn claim_unique_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (filename.to_string(), String::new()),
    };
    for n in 0..u32::MAX {
        let candidate = if n == 0 {
            dir.join(filename)
        } else {
            dir.join(format!("{} ({}){}", stem, n, ext))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(CompressioError::Other(format!(
        "No free file name for {} in {}",
        filename,
        dir.display()
    )))
}
