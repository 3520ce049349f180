//! Collaborators that hold project snapshots and doc contents.
//!
//! The tree algorithms never touch storage directly. Services such as
//! [`ProjectLocator`](super::ProjectLocator) and
//! [`ProjectEntityHandler`](super::ProjectEntityHandler) take these traits as
//! `Arc<dyn ...>` so that in-memory, on-disk and remote backends are
//! interchangeable.

mod memory;
mod snapshot;

pub use memory::{MemoryDocumentStore, MemoryProjectStore};
pub use snapshot::{SnapshotStore, StoreConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::{EntityId, Project, ProjectId};
use super::Result;

/// Supplies project snapshots by id.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Returns `Ok(None)` when no such project exists.
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>>;

    /// Same as [`get_project`](Self::get_project) with every doc's `lines` dropped.
    async fn get_project_without_doc_lines(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<Project>> {
        Ok(self
            .get_project(project_id)
            .await?
            .map(|project| project.without_doc_lines()))
    }
}

/// Text content and revision of one doc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocContent {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub lines: Vec<String>,
    pub rev: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<serde_json::Value>,
}

impl DocContent {
    pub fn new<I, S>(id: impl Into<EntityId>, lines: I, rev: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocContent {
            id: id.into(),
            lines: lines.into_iter().map(Into::into).collect(),
            rev,
            version: None,
            ranges: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetDocOptions {
    /// Also return docs that have been deleted from the project.
    pub include_deleted: bool,
    /// Read without recording an access.
    pub peek: bool,
}

/// Supplies doc contents, keyed by project and doc id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with [`Error::NotFound`](super::Error::NotFound) for unknown docs.
    async fn get_doc(
        &self,
        project_id: &ProjectId,
        doc_id: &EntityId,
        options: GetDocOptions,
    ) -> Result<DocContent>;

    /// Contents of every live doc in the project, in no particular order.
    async fn get_all_docs(&self, project_id: &ProjectId) -> Result<Vec<DocContent>>;
}
