//! Upload, compress and record a single file.
//!
//! The remote protocol is three dependent calls: upload the bytes, ask for
//! an automatic compression, then re-read the server's result record. Only
//! that final record is written to history, and only when all three
//! succeed.

use crate::api::{CompressionApi, ResultMetadata, AI_METHOD};
use crate::error::CompressioError;
use crate::history::{now_timestamp, EntryStatus, HistoryEntry, HistoryStore};
use crate::i18n::Language;
use crate::notify::{NotificationLevel, Notifier};
use crate::quota::QuotaPolicy;
use crate::storage::run_blocking;
use crate::validation::FileCandidate;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Compress,
    Metadata,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Upload => write!(f, "upload"),
            Stage::Compress => write!(f, "compress"),
            Stage::Metadata => write!(f, "metadata"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
    /// HTTP status when the server answered
    pub status: Option<u16>,
}

impl StageError {
    fn from_error(stage: Stage, err: CompressioError) -> Self {
        let status = match &err {
            CompressioError::Api { status, .. } => Some(*status),
            CompressioError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        };
        let message = match err {
            CompressioError::Api { message, .. } => message,
            other => format!("{} failed: {}", stage_label(stage), other),
        };
        Self {
            stage,
            message,
            status,
        }
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Upload => "Upload",
        Stage::Compress => "Compression",
        Stage::Metadata => "Fetching the compression result",
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.message)
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq)]
pub enum CompressOutcome {
    Success(HistoryEntry),
    Upload(StageError),
    Compress(StageError),
    Metadata(StageError),
    QuotaExceeded,
}

impl CompressOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompressOutcome::Success(_))
    }

    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            CompressOutcome::Upload(e)
            | CompressOutcome::Compress(e)
            | CompressOutcome::Metadata(e) => Some(e),
            _ => None,
        }
    }
}

pub struct Orchestrator<A: CompressionApi> {
    api: Arc<A>,
    history: HistoryStore,
    notifier: Arc<dyn Notifier>,
    quota: Arc<dyn QuotaPolicy>,
    language: Language,
}

impl<A: CompressionApi> Orchestrator<A> {
    pub fn new(
        api: Arc<A>,
        history: HistoryStore,
        notifier: Arc<dyn Notifier>,
        quota: Arc<dyn QuotaPolicy>,
        language: Language,
    ) -> Self {
        Self {
            api,
            history,
            notifier,
            quota,
            language,
        }
    }

    /// Run the full protocol for one file and report the result to the user.
    ///
    /// The returned outcome is for callers that want it; the user has
    /// already been notified either way.
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn compress_file(&self, file: &FileCandidate) -> CompressOutcome {
        let messages = self.language.messages();

        let quota = self.quota.clone();
        let reserved = run_blocking(move || quota.try_acquire())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Quota check failed");
                false
            });
        if !reserved {
            warn!("Compression quota exhausted");
            self.notifier
                .notify(NotificationLevel::Warning, messages.limit_reached);
            return CompressOutcome::QuotaExceeded;
        }

        let outcome = self.run_protocol(file).await;

        match &outcome {
            CompressOutcome::Success(entry) => {
                self.notifier.notify(
                    NotificationLevel::Success,
                    &format!(
                        "{} {} ({}: {}, {:.1}%)",
                        messages.compression_success,
                        entry.file_name,
                        messages.method,
                        entry.compression_method,
                        entry.ratio
                    ),
                );
            }
            other => {
                let quota = self.quota.clone();
                if let Err(e) = run_blocking(move || quota.release()).await {
                    warn!(error = %e, "Failed to release quota");
                }
                if let Some(err) = other.stage_error() {
                    warn!(stage = %err.stage, status = ?err.status, "{}", err.message);
                    self.notifier.notify(NotificationLevel::Error, &err.message);
                }
            }
        }

        outcome
    }

    async fn run_protocol(&self, file: &FileCandidate) -> CompressOutcome {
        let upload = match self.api.upload(file).await {
            Ok(upload) => upload,
            Err(e) => return CompressOutcome::Upload(StageError::from_error(Stage::Upload, e)),
        };
        let file_id = upload.id;
        info!(file_id = %file_id, "Upload accepted");

        match self.api.compress(&file_id, AI_METHOD).await {
            Ok(response) => {
                info!(file_id = %file_id, method = ?response.method, "Compression finished");
            }
            Err(e) => {
                return CompressOutcome::Compress(StageError::from_error(Stage::Compress, e));
            }
        }

        let metadata = match self.api.result(&file_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                return CompressOutcome::Metadata(StageError::from_error(Stage::Metadata, e));
            }
        };

        let entry = entry_from_result(&file_id, file, metadata, self.language);
        let history = self.history.clone();
        match run_blocking(move || history.append(entry)).await.and_then(|r| r) {
            Ok(stored) => CompressOutcome::Success(stored),
            Err(e) => CompressOutcome::Metadata(StageError {
                stage: Stage::Metadata,
                message: e.user_message(),
                status: None,
            }),
        }
    }
}

/// Build the history record from the server's result, never from local guesses
pub fn entry_from_result(
    file_id: &str,
    file: &FileCandidate,
    metadata: ResultMetadata,
    language: Language,
) -> HistoryEntry {
    let method = metadata
        .compression_method
        .unwrap_or_else(|| AI_METHOD.to_string());
    HistoryEntry {
        file_id: metadata.id.unwrap_or_else(|| file_id.to_string()),
        file_name: metadata
            .original_filename
            .unwrap_or_else(|| file.name.clone()),
        original_size: metadata.size_before.unwrap_or(0),
        compressed_size: metadata.size_after.unwrap_or(0),
        ratio: metadata.ratio.unwrap_or(0.0),
        message: format!(
            "{} ({}: {})",
            language.messages().compression_success,
            language.messages().method,
            method
        ),
        compression_method: method,
        compressed_filename: metadata.compressed_filename.unwrap_or_default(),
        download_url: metadata.download_url,
        timestamp: now_timestamp(),
        status: EntryStatus::Success,
    }
}
