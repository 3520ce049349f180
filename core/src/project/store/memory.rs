use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use crossbeam_skiplist::SkipMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DocContent, DocumentStore, GetDocOptions, ProjectStore};
use crate::project::model::{EntityId, Project, ProjectId};
use crate::project::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `project`, returning the snapshot it replaced.
    pub async fn insert(&self, project: Project) -> Option<Project> {
        self.projects.write().await.insert(project.id.clone(), project)
    }

    pub async fn remove(&self, project_id: &ProjectId) -> Option<Project> {
        self.projects.write().await.remove(project_id)
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(project_id).cloned())
    }
}

#[derive(Debug)]
struct StoredDoc {
    content: DocContent,
    deleted: bool,
}

/// Lock-free doc content store, ordered by (project, doc).
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: SkipMap<(ProjectId, EntityId), StoredDoc>,
    reads: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &ProjectId, content: DocContent) {
        let key = (project_id.clone(), content.id.clone());
        self.docs.insert(key, StoredDoc { content, deleted: false });
    }

    /// Keeps the content but hides it unless `include_deleted` is asked for.
    pub fn mark_deleted(&self, project_id: &ProjectId, doc_id: &EntityId) -> Result<()> {
        let key = (project_id.clone(), doc_id.clone());
        let content = self
            .docs
            .get(&key)
            .map(|entry| entry.value().content.clone())
            .ok_or(Error::NotFound)?;
        self.docs.insert(key, StoredDoc { content, deleted: true });
        Ok(())
    }

    /// Number of non-peek reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_doc(
        &self,
        project_id: &ProjectId,
        doc_id: &EntityId,
        options: GetDocOptions,
    ) -> Result<DocContent> {
        let entry = self
            .docs
            .get(&(project_id.clone(), doc_id.clone()))
            .ok_or(Error::NotFound)?;
        let stored = entry.value();
        if stored.deleted && !options.include_deleted {
            debug!(%project_id, %doc_id, "Doc is deleted");
            return Err(Error::NotFound);
        }
        if !options.peek {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
        Ok(stored.content.clone())
    }

    async fn get_all_docs(&self, project_id: &ProjectId) -> Result<Vec<DocContent>> {
        let start = (project_id.clone(), EntityId::new(String::new()));
        Ok(self
            .docs
            .range(start..)
            .take_while(|entry| entry.key().0 == *project_id)
            .filter(|entry| !entry.value().deleted)
            .map(|entry| entry.value().content.clone())
            .collect())
    }
}
