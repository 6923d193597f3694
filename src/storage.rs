//! Local key-value store.
//!
//! String keys map to string values, persisted as a single JSON object.
//! Every mutation re-reads and rewrites the whole file while holding an
//! exclusive lock, so concurrent CLI invocations never interleave writes.

use crate::error::{CompressioError, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const HISTORY_KEY: &str = "compressionHistory";
pub const LANGUAGE_KEY: &str = "preferredLanguage";
pub const USER_KEY: &str = "user";
pub const COMPRESSION_COUNT_KEY: &str = "compressionCount";

type Items = BTreeMap<String, String>;

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    lock_path: PathBuf,
    // Serialises mutations from tasks in this process; the file lock covers other processes
    guard: Mutex<()>,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self {
            path,
            lock_path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        read_items(&self.path).remove(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.update(|items| {
            items.remove(key);
        })
    }

    /// Read-modify-write of a single key under the store lock.
    ///
    /// The closure sees the current value (if any) and returns the new one;
    /// returning `None` deletes the key.
    pub fn update_item<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&str>) -> (Option<String>, R),
    ) -> Result<R> {
        let mut result = None;
        self.update(|items| {
            let (next, r) = f(items.get(key).map(String::as_str));
            match next {
                Some(value) => {
                    items.insert(key.to_string(), value);
                }
                None => {
                    items.remove(key);
                }
            }
            result = Some(r);
        })?;
        result.ok_or_else(|| CompressioError::Storage("update did not run".to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut Items)) -> Result<()> {
        let _in_process = self
            .guard
            .lock()
            .map_err(|e| CompressioError::LockPoisoned(e.to_string()))?;

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        lock_file
            .lock_exclusive()
            .map_err(|e| CompressioError::Storage(format!("Failed to lock store: {}", e)))?;

        let mut items = read_items(&self.path);
        f(&mut items);
        let written = write_items(&self.path, &items);

        let _ = FileExt::unlock(&lock_file);
        written
    }
}

/// Run store work on the blocking pool.
///
/// Mutations wait on a cross-process file lock, which must not stall the
/// async worker threads.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CompressioError::Storage(format!("Store task failed: {}", e)))
}

/// Absent or corrupt files read as an empty store
fn read_items(path: &Path) -> Items {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Items::new(),
    };
    match serde_json::from_str(&content) {
        Ok(items) => items,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Local store is unreadable, starting empty");
            Items::new()
        }
    }
}

fn write_items(path: &Path, items: &Items) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(serde_json::to_string_pretty(items)?.as_bytes())?;
        file.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
