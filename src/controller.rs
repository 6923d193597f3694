//! Selection, busy state and dispatch for the command line front end.

use crate::api::CompressionApi;
use crate::context::AppContext;
use crate::error::{CompressioError, Result};
use crate::notify::NotificationLevel;
use crate::orchestrator::{CompressOutcome, Orchestrator};
use crate::render;
use crate::validation::{validate_candidate, FileCandidate};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct Controller<A: CompressionApi> {
    ctx: Arc<AppContext<A>>,
    orchestrator: Arc<Orchestrator<A>>,
    selection: Mutex<Vec<FileCandidate>>,
    busy: AtomicBool,
}

/// Clears the busy flag however the submission ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: CompressionApi> Controller<A> {
    pub fn new(ctx: Arc<AppContext<A>>) -> Self {
        let orchestrator = Arc::new(ctx.orchestrator());
        Self {
            ctx,
            orchestrator,
            selection: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// File picker: replaces the current selection with the valid files among `paths`
    pub fn select(&self, paths: &[PathBuf]) -> Result<usize> {
        let accepted = self.accept(paths);
        let count = accepted.len();
        *self.lock_selection()? = accepted;
        Ok(count)
    }

    /// Drag and drop: adds the valid files among `paths` to the selection
    pub fn drop_files(&self, paths: &[PathBuf]) -> Result<usize> {
        let accepted = self.accept(paths);
        let count = accepted.len();
        self.lock_selection()?.extend(accepted);
        Ok(count)
    }

    pub fn clear_selection(&self) -> Result<()> {
        self.lock_selection()?.clear();
        Ok(())
    }

    pub fn selection(&self) -> Vec<FileCandidate> {
        self.selection.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Submitting needs a selection and no submission already in flight
    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.selection().is_empty()
    }

    /// Compress every selected file, each through its own independent protocol run.
    ///
    /// Outcomes are returned in completion order. The selection is cleared
    /// once all runs have finished.
    pub async fn submit(&self) -> Result<Vec<CompressOutcome>> {
        let messages = self.ctx.language.messages();
        let files = self.selection();
        if files.is_empty() {
            self.ctx
                .notifier
                .notify(NotificationLevel::Warning, messages.no_file_selected);
            return Err(CompressioError::Validation(messages.no_file_selected.to_string()));
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.ctx
                .notifier
                .notify(NotificationLevel::Warning, messages.busy);
            return Err(CompressioError::Other(messages.busy.to_string()));
        }
        let _busy = BusyGuard(&self.busy);

        let mut tasks = JoinSet::new();
        for file in files {
            info!(file = %file.name, "{} {}...", messages.compressing, file.name);
            let orchestrator = self.orchestrator.clone();
            tasks.spawn(async move { orchestrator.compress_file(&file).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Compression task did not complete"),
            }
        }

        self.lock_selection()?.clear();
        Ok(outcomes)
    }

    pub fn history_table(&self) -> String {
        render::history_table(&self.ctx.history.all(), self.ctx.language)
    }

    pub fn delete(&self, timestamp: &str) -> Result<usize> {
        let removed = self.ctx.history.remove_by_timestamp(timestamp)?;
        if removed == 0 {
            warn!(timestamp = %timestamp, "No history entry with that timestamp");
        }
        Ok(removed)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.ctx.history.clear()
    }

    /// Download by file id, using the recorded result link when the id is in history
    pub async fn download(&self, file_id: &str, original: bool) -> Result<PathBuf> {
        let client = self.ctx.download_client();
        let entry = self
            .ctx
            .history
            .all()
            .into_iter()
            .find(|entry| entry.file_id == file_id);
        match entry {
            Some(entry) => client.download_entry(&entry, original).await,
            None => client.download_file(file_id, original).await,
        }
    }

    fn accept(&self, paths: &[PathBuf]) -> Vec<FileCandidate> {
        let messages = self.ctx.language.messages();
        let mut accepted = Vec::new();
        for path in paths {
            let checked = FileCandidate::from_path(path).and_then(|file| {
                validate_candidate(&file, messages.invalid_file_type)?;
                Ok(file)
            });
            match checked {
                Ok(file) => accepted.push(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Rejected file");
                    self.ctx
                        .notifier
                        .notify(NotificationLevel::Error, &e.user_message());
                }
            }
        }
        accepted
    }

    fn lock_selection(&self) -> Result<std::sync::MutexGuard<'_, Vec<FileCandidate>>> {
        self.selection
            .lock()
            .map_err(|e| CompressioError::LockPoisoned(e.to_string()))
    }
}
