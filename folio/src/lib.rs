use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use folio_core::project::{Error as ProjectError, SnapshotStore};
use tracing::debug;

pub mod cli;
pub mod commands;

pub struct AppContext {
    pub store: anyhow::Result<Arc<SnapshotStore>>,
}

impl AppContext {
    pub async fn new(store_flag: Option<PathBuf>) -> Self {
        let store = match store_flag {
            Some(path) => open_store(&path).await,
            None => match std::env::current_dir() {
                Ok(dir) => find_store(&dir).await,
                Err(e) => Err(e.into()),
            },
        };
        AppContext { store }
    }

    /// The opened store, or the error met while locating it.
    pub fn store(&self) -> anyhow::Result<Arc<SnapshotStore>> {
        match &self.store {
            Ok(store) => Ok(store.clone()),
            Err(e) => Err(anyhow::anyhow!("{e:#}")),
        }
    }
}

async fn open_store(path: &Path) -> anyhow::Result<Arc<SnapshotStore>> {
    let store = SnapshotStore::open(path)
        .await
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Opens the first store found in `start` or one of its parents.
pub async fn find_store(start: &Path) -> anyhow::Result<Arc<SnapshotStore>> {
    for dir in start.ancestors() {
        match SnapshotStore::open(dir).await {
            Ok(store) => return Ok(Arc::new(store)),
            Err(ProjectError::NotAStore(_)) => debug!(dir = %dir.display(), "No store here"),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open store at {}", dir.display()));
            }
        }
    }
    anyhow::bail!(
        "No store found in {} or its parents (use --store or FOLIO_STORE)",
        start.display()
    )
}
