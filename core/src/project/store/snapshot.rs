use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clap::crate_version;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{DocContent, DocumentStore, GetDocOptions, ProjectStore};
use crate::project::iterable::{iterable_docs, iterable_folders};
use crate::project::model::{EntityId, Folder, Project, ProjectId};
use crate::project::root_doc::DEFAULT_ROOT_DOC_EXTENSIONS;
use crate::project::{
    safe_path, Error, Result, INTERNAL_DIR_NAME, SNAPSHOT_EXTENSION, STORE_CONFIG_FILENAME,
};

/// Contents of `.folio/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub id: Uuid,
    /// Format version of the store, for future migrations.
    pub version: u32,
    /// Version of folio that created the store.
    #[serde(default)]
    pub folio_version: String,
    /// Extensions a root doc may have.
    #[serde(default = "default_root_doc_extensions")]
    pub root_doc_extensions: Vec<String>,
}

fn default_root_doc_extensions() -> Vec<String> {
    DEFAULT_ROOT_DOC_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

impl StoreConfig {
    pub fn new() -> Self {
        StoreConfig {
            id: Uuid::new_v4(),
            version: 1,
            folio_version: crate_version!().to_string(),
            root_doc_extensions: default_root_doc_extensions(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_store_config(path: &Path) -> Result<StoreConfig> {
    let content = fs::read(path).await.map_err(|e| {
        warn!("Failed to read store config file '{}': {}", path.display(), e);
        Error::InvalidConfig(path.to_path_buf())
    })?;

    serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse store config file '{}': {}", path.display(), e);
        Error::InvalidConfig(path.to_path_buf())
    })
}

async fn write_store_config(path: &Path, config: &StoreConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await.map_err(Error::Io)?;
    debug!("Store config written to {}", path.display());
    Ok(())
}

/// A directory of project snapshots, one `<project_id>.json` per project.
///
/// Doc contents are kept inline in the snapshots (`lines` and `rev` on each
/// doc), so the same store serves as both [`ProjectStore`] and
/// [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    absolute_path: PathBuf,
    config: StoreConfig,
}

impl SnapshotStore {
    /// Creates a new store.
    ///
    /// - If the path does not exist, creates it along with `.folio/`.
    /// - If the path is an empty directory, adds `.folio/` to it.
    /// - Fails if the path is a file, a non-empty directory, or already has
    ///   a `.folio` entry.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn create(path: &Path) -> Result<Self> {
        debug!("Attempting to create snapshot store");
        let internal_dir = path.join(INTERNAL_DIR_NAME);

        match fs::metadata(path).await {
            Ok(meta) => {
                if !meta.is_dir() {
                    return Err(Error::PathIsFile(path.to_path_buf()));
                }
                if fs::metadata(&internal_dir).await.is_ok() {
                    debug!("Store creation failed: '.folio' already exists");
                    return Err(Error::StoreCreationConflict(path.to_path_buf()));
                }
                let mut read_dir = fs::read_dir(path).await.map_err(Error::Io)?;
                if read_dir.next_entry().await.map_err(Error::Io)?.is_some() {
                    debug!("Store creation failed: directory is not empty");
                    return Err(Error::StoreCreationConflict(path.to_path_buf()));
                }
                fs::create_dir(&internal_dir).await.map_err(Error::Io)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&internal_dir).await.map_err(Error::Io)?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let config = StoreConfig::new();
        write_store_config(&internal_dir.join(STORE_CONFIG_FILENAME), &config).await?;

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        debug!("Snapshot store created at {}", absolute_path.display());
        Ok(SnapshotStore { absolute_path, config })
    }

    /// Opens an existing store, validating its config file.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        let internal_dir = absolute_path.join(INTERNAL_DIR_NAME);
        match fs::metadata(&internal_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::NotAStore(absolute_path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotAStore(absolute_path));
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let config = read_store_config(&internal_dir.join(STORE_CONFIG_FILENAME)).await?;
        debug!("Snapshot store opened");
        Ok(SnapshotStore { absolute_path, config })
    }

    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn snapshot_path(&self, project_id: &ProjectId) -> Result<PathBuf> {
        // Project ids become file names.
        let name = project_id.as_str();
        if !safe_path::is_clean_filename(name) || name.starts_with('.') {
            return Err(Error::InvalidPath(project_id.to_string()));
        }
        Ok(self
            .absolute_path
            .join(format!("{}.{}", project_id, SNAPSHOT_EXTENSION)))
    }

    pub async fn contains(&self, project_id: &ProjectId) -> Result<bool> {
        let path = self.snapshot_path(project_id)?;
        Ok(fs::try_exists(&path).await.map_err(Error::Io)?)
    }

    /// Writes (or overwrites) the snapshot of `project`.
    #[instrument(skip(self, project), fields(project_id = %project.id))]
    pub async fn save_project(&self, project: &Project) -> Result<()> {
        let path = self.snapshot_path(&project.id)?;
        let content = serde_json::to_vec_pretty(project)?;
        fs::write(&path, content).await.map_err(Error::Io)?;
        debug!("Project snapshot written to {}", path.display());
        Ok(())
    }

    /// Ids of all stored projects, sorted.
    pub async fn list_projects(&self) -> Result<Vec<ProjectId>> {
        let mut ids = Vec::new();
        let mut read_dir = fs::read_dir(&self.absolute_path).await.map_err(Error::Io)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(ProjectId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ProjectStore for SnapshotStore {
    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>> {
        let path = self.snapshot_path(project_id)?;
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }
}

fn collect_contents(folder: &Folder, out: &mut Vec<DocContent>) {
    for doc in iterable_docs(Some(folder)) {
        out.push(DocContent::new(
            doc.id.clone(),
            doc.lines.clone().unwrap_or_default(),
            doc.rev.unwrap_or(0),
        ));
    }
    for child in iterable_folders(Some(folder)) {
        collect_contents(child, out);
    }
}

#[async_trait]
impl DocumentStore for SnapshotStore {
    async fn get_doc(
        &self,
        project_id: &ProjectId,
        doc_id: &EntityId,
        _options: GetDocOptions,
    ) -> Result<DocContent> {
        // Snapshots only hold live docs and keep no access bookkeeping.
        self.get_all_docs(project_id)
            .await?
            .into_iter()
            .find(|content| content.id == *doc_id)
            .ok_or(Error::NotFound)
    }

    async fn get_all_docs(&self, project_id: &ProjectId) -> Result<Vec<DocContent>> {
        let project = self
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.clone()))?;
        let mut contents = Vec::new();
        for root in &project.root_folder {
            collect_contents(root, &mut contents);
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::Doc;
    use tempfile::tempdir;

    async fn create_dummy(path: &Path, is_dir: bool) {
        if is_dir {
            fs::create_dir_all(path).await.expect("Failed to create dummy dir");
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.expect("Failed to create parent dir");
            }
            fs::write(path, "").await.expect("Failed to create dummy file");
        }
    }

    fn sample_project() -> Project {
        let root = Folder::new("root", "").with_docs(vec![
            Doc::new("d1", "main.tex").with_lines(["\\documentclass{article}", "Hello"]),
        ]);
        Project::new("p1", root)
    }

    #[tokio::test]
    async fn test_store_create_new() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("new_store");

        let store = SnapshotStore::create(&store_path).await.unwrap();
        let config_path = store_path.join(INTERNAL_DIR_NAME).join(STORE_CONFIG_FILENAME);
        assert!(config_path.is_file());
        assert_eq!(store.config().version, 1);
        assert_eq!(store.config().root_doc_extensions, ["tex", "Rtex", "ltx", "Rnw"]);

        let content = fs::read_to_string(&config_path).await.unwrap();
        let meta: serde_json::Value =
            serde_json::from_str(&content).expect("Config file should be valid JSON");
        assert!(meta.get("id").is_some());
    }

    #[tokio::test]
    async fn test_store_create_in_empty_dir() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("empty");
        create_dummy(&store_path, true).await;
        assert!(SnapshotStore::create(&store_path).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_create_conflicts() {
        let dir = tempdir().unwrap();

        let file_path = dir.path().join("file");
        create_dummy(&file_path, false).await;
        assert!(matches!(SnapshotStore::create(&file_path).await, Err(Error::PathIsFile(_))));

        let non_empty = dir.path().join("non_empty");
        create_dummy(&non_empty.join("some_file.txt"), false).await;
        assert!(matches!(
            SnapshotStore::create(&non_empty).await,
            Err(Error::StoreCreationConflict(_))
        ));

        let existing = dir.path().join("existing");
        create_dummy(&existing.join(INTERNAL_DIR_NAME), true).await;
        assert!(matches!(
            SnapshotStore::create(&existing).await,
            Err(Error::StoreCreationConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_store_open_errors() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing");
        assert!(matches!(SnapshotStore::open(&missing).await, Err(Error::DirectoryNotFound(_))));

        let file_path = dir.path().join("file");
        create_dummy(&file_path, false).await;
        assert!(matches!(SnapshotStore::open(&file_path).await, Err(Error::NotADirectory(_))));

        let plain = dir.path().join("plain");
        create_dummy(&plain, true).await;
        assert!(matches!(SnapshotStore::open(&plain).await, Err(Error::NotAStore(_))));

        let bad_config = dir.path().join("bad_config");
        create_dummy(&bad_config.join(INTERNAL_DIR_NAME), true).await;
        fs::write(bad_config.join(INTERNAL_DIR_NAME).join(STORE_CONFIG_FILENAME), "{ not json")
            .await
            .unwrap();
        assert!(matches!(SnapshotStore::open(&bad_config).await, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_store_save_and_load() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("store");
        SnapshotStore::create(&store_path).await.unwrap();
        let store = SnapshotStore::open(&store_path).await.unwrap();

        let project = sample_project();
        store.save_project(&project).await.unwrap();
        assert!(store.contains(&project.id).await.unwrap());
        assert_eq!(store.list_projects().await.unwrap(), [ProjectId::from("p1")]);

        let loaded = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(loaded, project);
        assert!(store.get_project(&"other".into()).await.unwrap().is_none());

        let stripped = store.get_project_without_doc_lines(&project.id).await.unwrap().unwrap();
        assert!(stripped.root().unwrap().docs.slots()[0].as_ref().unwrap().lines.is_none());
    }

    #[tokio::test]
    async fn test_store_serves_doc_contents() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::create(&dir.path().join("store")).await.unwrap();
        store.save_project(&sample_project()).await.unwrap();

        let project_id = ProjectId::from("p1");
        let all = store.get_all_docs(&project_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].lines[1], "Hello");

        let doc = store.get_doc(&project_id, &"d1".into(), GetDocOptions::default()).await.unwrap();
        assert_eq!(doc.rev, 0);
        assert!(matches!(
            store.get_doc(&project_id, &"nope".into(), GetDocOptions::default()).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_store_rejects_unsafe_project_ids() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::create(&dir.path().join("store")).await.unwrap();
        for id in ["../escape", ".folio", "a/b", ""] {
            assert!(matches!(
                store.get_project(&ProjectId::from(id)).await,
                Err(Error::InvalidPath(_))
            ));
        }
    }
}
