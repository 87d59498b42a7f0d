//! Per-job temp file tracking.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Temp files and directories created for one job.
///
/// Clones share the same list, so the supervisor can clean up whatever a
/// panicked task registered before it died.
#[derive(Debug, Clone, Default)]
pub struct TempFiles {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal.
    pub fn track(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Ok(mut paths) = self.paths.lock() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().map(|p| p.is_empty()).unwrap_or(true)
    }

    /// Remove every tracked path. Missing paths are ignored; safe to call twice.
    pub async fn cleanup(&self) -> usize {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let mut removed = 0;
        for path in &paths {
            match remove(path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp path"),
            }
        }
        debug!(removed, tracked = paths.len(), "Cleaned up temp files");
        removed
    }
}

async fn remove(path: &Path) -> std::io::Result<bool> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await?;
    } else {
        tokio::fs::remove_file(path).await?;
    }
    Ok(true)
}
