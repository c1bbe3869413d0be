// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the reconciler snapshot across daemon restarts. By default the file
// lives at `~/.lighthouse_cache`.
//
// ## Crash Recovery
//
// - Atomic writes: snapshot written to `<file>.tmp`, synced, then renamed
// - Backup: the previous good snapshot is copied to `<file>.backup`
// - Recovery: if the main file does not parse, the backup is loaded and
//   copied back over it
//
// The snapshot carries no version field; the format is the bare
// `{claimtrie, metadata, bad_uris}` object.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::model::ReconcilerState;
use crate::traits::state_store::StateStore;

/// File name of the cache in the user's home directory
pub const DEFAULT_CACHE_FILE_NAME: &str = ".lighthouse_cache";

/// Default cache location: `~/.lighthouse_cache`
pub fn default_cache_path() -> Result<PathBuf, Error> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CACHE_FILE_NAME))
        .ok_or_else(|| Error::config("Cannot determine home directory for the cache file"))
}

/// File-based state store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use lighthouse_core::state::FileStateStore;
/// use lighthouse_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/lighthouse/cache.json").await?;
///     let state = store.load().await?.unwrap_or_default();
///     store.save(&state).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store for `path`, creating parent directories if needed
    ///
    /// Nothing is read here; [`StateStore::load`] does that.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Read a snapshot; `Ok(None)` if the file does not exist
    ///
    /// A parse failure is reported as [`Error::Json`] so the caller can tell
    /// corruption apart from I/O trouble.
    async fn read_snapshot(path: &Path) -> Result<Option<ReconcilerState>, Error> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cache file does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Failed to read cache file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        // bytes, not a String: invalid UTF-8 is corruption like any other
        let state: ReconcilerState = serde_json::from_slice(&content)?;
        Ok(Some(state))
    }

    /// Load with fallback to the backup if the main file is corrupted
    async fn load_with_recovery(&self) -> Result<Option<ReconcilerState>, Error> {
        match Self::read_snapshot(&self.path).await {
            Err(Error::Json(parse_err)) => {
                tracing::warn!(
                    "Cache file {} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    parse_err
                );
            }
            other => return other,
        }

        let backup_path = self.backup_path();
        match Self::read_snapshot(&backup_path).await {
            Ok(Some(state)) => {
                tracing::info!(
                    "Recovered cache from backup: {} claims, {} quarantined",
                    state.claimtrie.len(),
                    state.bad_uris.len()
                );
                if let Err(e) = fs::copy(&backup_path, &self.path).await {
                    tracing::error!("Failed to restore cache file from backup: {}", e);
                }
                Ok(Some(state))
            }
            Ok(None) => {
                tracing::warn!("No backup file found. Rebuilding cache from scratch.");
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Backup also unusable: {}. Rebuilding cache from scratch.", e);
                Ok(None)
            }
        }
    }

    /// Write the snapshot atomically
    async fn write_snapshot(&self, state: &ReconcilerState) -> Result<(), Error> {
        let json = serde_json::to_vec(state)
            .map_err(|e| Error::persistence(format!("Failed to serialize cache: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(&json).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, self.backup_path()).await
        {
            tracing::warn!("Failed to create cache backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, "tmp")
    }

    fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, "backup")
    }
}

/// `~/.lighthouse_cache` -> `~/.lighthouse_cache.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<ReconcilerState>, Error> {
        self.load_with_recovery().await
    }

    async fn save(&self, state: &ReconcilerState) -> Result<(), Error> {
        self.write_snapshot(state).await
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
