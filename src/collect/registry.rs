// src/collect/registry.rs

//! Per-invocation shared state.
//!
//! A `Registry` is created by the caller and passed down explicitly; there
//! are no process-wide globals, so tests can run independent instances side
//! by side.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct Registry {
    machine_id: OnceCell<String>,
    temp_dirs: Mutex<Vec<TempDir>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine id, computed at most once per registry.
    ///
    /// A failed `init` is not cached; the next caller tries again.
    pub async fn machine_id<F, Fut>(&self, init: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        self.machine_id.get_or_try_init(init).await.cloned()
    }

    /// Create a fresh directory under `base` that lives until
    /// [`Registry::cleanup`] (or until the registry is dropped).
    pub fn make_temp_dir(&self, base: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(base)
            .with_context(|| format!("creating temp base directory {:?}", base))?;
        let dir = tempfile::Builder::new()
            .prefix("chore-")
            .tempdir_in(base)
            .with_context(|| format!("creating temp directory in {:?}", base))?;

        let path = dir.path().to_path_buf();
        debug!(path = ?path, "registered temp directory");
        self.temp_dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dir);
        Ok(path)
    }

    /// Remove every temp directory handed out so far.
    pub fn cleanup(&self) {
        let dirs = std::mem::take(
            &mut *self.temp_dirs.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for dir in dirs {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                warn!(path = ?path, error = %err, "failed to remove temp directory");
            } else {
                debug!(path = ?path, "removed temp directory");
            }
        }
    }
}
