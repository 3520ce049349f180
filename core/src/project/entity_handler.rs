//! Project-wide listings.
//!
//! Unlike the [`locator`](super::locator), every function here walks the whole
//! tree and refuses malformed input: a `null` folder list or an entity
//! without a name fails the entire call. A listing that silently drops part
//! of the tree would propagate as data loss into whatever consumes it, so
//! partial results are never returned. Null slots are still skipped.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::try_join;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::iterable::{iterable_docs, iterable_files, iterable_folders};
use super::locator::join_path;
use super::model::{Doc, EntityId, FileRef, Folder, Project, ProjectId};
use super::store::{DocContent, DocumentStore, GetDocOptions, ProjectStore};
use super::{Error, Result};

/// A folder together with its filesystem path.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderEntry<'a> {
    pub path: String,
    pub folder: &'a Folder,
}

/// Identifies the folder an entry was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRef {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub path: String,
}

impl FolderEntry<'_> {
    pub fn to_ref(&self) -> FolderRef {
        FolderRef {
            id: self.folder.id.clone(),
            name: self.folder.name.clone().unwrap_or_default(),
            path: self.path.clone(),
        }
    }
}

/// An entity with its filesystem path and containing folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEntry<T> {
    pub path: String,
    pub entity: T,
    pub folder: FolderRef,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EntityListing {
    pub docs: Vec<PathEntry<Doc>>,
    pub files: Vec<PathEntry<FileRef>>,
}

/// A doc joined with its stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocEntry {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub lines: Vec<String>,
    pub rev: u64,
    pub folder: FolderRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    #[serde(flatten)]
    pub file: FileRef,
    pub folder: FolderRef,
}

fn required_name<'a>(name: Option<&'a str>, what: &str, id: &EntityId) -> Result<&'a str> {
    name.ok_or_else(|| {
        warn!(%id, "Malformed file tree: {what} has no name");
        Error::malformed(format!("{what} {id} has no name"))
    })
}

/// Every folder in the tree, root first, in pre-order.
pub fn get_all_folders(project: &Project) -> Result<Vec<FolderEntry<'_>>> {
    let root = project
        .root()
        .ok_or_else(|| Error::malformed(format!("project {} has no root folder", project.id)))?;
    let mut folders = Vec::new();
    collect_folders(root, "/".to_string(), &mut folders)?;
    Ok(folders)
}

fn collect_folders<'a>(
    folder: &'a Folder,
    path: String,
    out: &mut Vec<FolderEntry<'a>>,
) -> Result<()> {
    if folder.folders.is_null() {
        warn!(folder_id = %folder.id, "Malformed file tree: null folders list");
        return Err(Error::malformed(format!("folder {} has a null folders list", folder.id)));
    }
    out.push(FolderEntry {
        path: path.clone(),
        folder,
    });
    for child in iterable_folders(Some(folder)) {
        let name = required_name(child.name.as_deref(), "folder", &child.id)?;
        collect_folders(child, join_path(&path, name), out)?;
    }
    Ok(())
}

/// All docs and files with their paths.
pub fn get_all_entities_from_project(project: &Project) -> Result<EntityListing> {
    let mut listing = EntityListing::default();
    for entry in get_all_folders(project)? {
        let folder_ref = entry.to_ref();
        for doc in iterable_docs(Some(entry.folder)) {
            let name = required_name(doc.name.as_deref(), "doc", &doc.id)?;
            listing.docs.push(PathEntry {
                path: join_path(&entry.path, name),
                entity: doc.clone(),
                folder: folder_ref.clone(),
            });
        }
        for file in iterable_files(Some(entry.folder)) {
            let name = required_name(file.name.as_deref(), "file", &file.id)?;
            listing.files.push(PathEntry {
                path: join_path(&entry.path, name),
                entity: file.clone(),
                folder: folder_ref.clone(),
            });
        }
    }
    Ok(listing)
}

/// Doc id to path, without touching doc contents.
pub fn get_all_doc_paths_from_project(project: &Project) -> Result<BTreeMap<EntityId, String>> {
    Ok(get_all_entities_from_project(project)?
        .docs
        .into_iter()
        .map(|entry| (entry.entity.id, entry.path))
        .collect())
}

/// Path of one doc. `Ok(None)` when the id is not a doc in this tree.
pub fn get_doc_path_from_project_by_doc_id(
    project: &Project,
    doc_id: &EntityId,
) -> Result<Option<String>> {
    Ok(get_all_entities_from_project(project)?
        .docs
        .into_iter()
        .find(|entry| entry.entity.id == *doc_id)
        .map(|entry| entry.path))
}

/// Inserts under a fresh path; two entities sharing a path make the tree malformed.
fn insert_unique<T>(map: &mut BTreeMap<String, T>, path: String, value: T) -> Result<()> {
    match map.entry(path) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(slot) => {
            warn!(path = %slot.key(), "Malformed file tree: path used twice");
            Err(Error::malformed(format!("more than one entity at {}", slot.key())))
        }
    }
}

pub fn get_all_files_from_project(project: &Project) -> Result<BTreeMap<String, FileEntry>> {
    let mut files = BTreeMap::new();
    for entry in get_all_entities_from_project(project)?.files {
        let file = FileEntry {
            file: entry.entity,
            folder: entry.folder,
        };
        insert_unique(&mut files, entry.path, file)?;
    }
    Ok(files)
}

/// Joins the tree's docs with their stored contents, keyed by path.
///
/// Every doc in the tree must have content; a missing one fails with
/// [`Error::MissingDocContent`]. Two docs at one path fail with
/// [`Error::MalformedTree`].
pub fn join_doc_contents(
    project: &Project,
    contents: Vec<DocContent>,
) -> Result<BTreeMap<String, DocEntry>> {
    let contents: HashMap<EntityId, DocContent> = contents
        .into_iter()
        .map(|content| (content.id.clone(), content))
        .collect();

    let mut docs = BTreeMap::new();
    for entry in get_all_entities_from_project(project)?.docs {
        let content = contents
            .get(&entry.entity.id)
            .ok_or_else(|| Error::MissingDocContent(entry.entity.id.clone()))?;
        let doc = DocEntry {
            id: entry.entity.id,
            name: entry.entity.name.unwrap_or_default(),
            lines: content.lines.clone(),
            rev: content.rev,
            folder: entry.folder,
        };
        insert_unique(&mut docs, entry.path, doc)?;
    }
    Ok(docs)
}

/// Listings for callers that hold a project id.
///
/// Snapshots are loaded without doc lines; contents come from the
/// [`DocumentStore`].
#[derive(Clone)]
pub struct ProjectEntityHandler {
    projects: Arc<dyn ProjectStore>,
    docs: Arc<dyn DocumentStore>,
}

impl ProjectEntityHandler {
    pub fn new(projects: Arc<dyn ProjectStore>, docs: Arc<dyn DocumentStore>) -> Self {
        ProjectEntityHandler { projects, docs }
    }

    async fn load(&self, project_id: &ProjectId) -> Result<Project> {
        self.projects
            .get_project_without_doc_lines(project_id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.clone()))
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_all_folders(&self, project_id: &ProjectId) -> Result<Vec<FolderRef>> {
        let project = self.load(project_id).await?;
        Ok(get_all_folders(&project)?.iter().map(FolderEntry::to_ref).collect())
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_all_entities(&self, project_id: &ProjectId) -> Result<EntityListing> {
        let project = self.load(project_id).await?;
        get_all_entities_from_project(&project)
    }

    /// Every doc keyed by path, with `lines` and `rev` from the document store.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_all_docs(&self, project_id: &ProjectId) -> Result<BTreeMap<String, DocEntry>> {
        let (project, contents) =
            try_join!(self.load(project_id), self.docs.get_all_docs(project_id))?;
        debug!(contents = contents.len(), "Fetched doc contents");
        join_doc_contents(&project, contents)
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_all_files(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeMap<String, FileEntry>> {
        let project = self.load(project_id).await?;
        get_all_files_from_project(&project)
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_all_doc_paths_from_project_by_id(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeMap<EntityId, String>> {
        let project = self.load(project_id).await?;
        get_all_doc_paths_from_project(&project)
    }

    /// Fails with [`Error::NotFound`] unless `doc_id` is a doc in the tree.
    #[instrument(skip(self), fields(project_id = %project_id, doc_id = %doc_id))]
    pub async fn get_doc_path_by_project_id_and_doc_id(
        &self,
        project_id: &ProjectId,
        doc_id: &EntityId,
    ) -> Result<String> {
        let project = self.load(project_id).await?;
        get_doc_path_from_project_by_doc_id(&project, doc_id)?.ok_or(Error::NotFound)
    }

    pub async fn get_doc(
        &self,
        project_id: &ProjectId,
        doc_id: &EntityId,
        options: GetDocOptions,
    ) -> Result<DocContent> {
        self.docs.get_doc(project_id, doc_id, options).await
    }
}
