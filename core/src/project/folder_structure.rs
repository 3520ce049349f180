use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::model::{Children, Doc, EntityId, FileRef, Folder};
use super::{Error, Result};

/// Name given to the root folder of a freshly built tree.
pub const ROOT_FOLDER_NAME: &str = "rootFolder";

#[derive(Debug, Clone)]
pub struct DocUpload {
    pub path: String,
    pub doc: Doc,
}

impl DocUpload {
    pub fn new(path: impl Into<String>, doc: Doc) -> Self {
        DocUpload { path: path.into(), doc }
    }
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub path: String,
    pub file: FileRef,
}

impl FileUpload {
    pub fn new(path: impl Into<String>, file: FileRef) -> Self {
        FileUpload { path: path.into(), file }
    }
}

#[derive(Debug)]
struct FolderRecord {
    id: EntityId,
    name: String,
    docs: Vec<Doc>,
    files: Vec<FileRef>,
    children: Vec<usize>,
}

/// Builds a rooted folder tree from flat lists of uploads.
///
/// Folders live in an arena keyed by their path from the root while the
/// build runs, so two uploads under the same directory share one folder.
/// The nested [`Folder`] is only assembled by [`finish`](Self::finish).
///
/// The upload path locates the parent directory; the doc's or file's own
/// `name` is what ends up in the tree. Both the upload path and the named
/// path are claimed, so any two entities (docs, files or created folders)
/// meeting at either one fail the build with [`Error::DuplicatePath`]. Ids
/// must be unique across docs and files ([`Error::DuplicateId`]).
pub struct FolderStructureBuilder<F> {
    next_id: F,
    records: Vec<FolderRecord>,
    folders_by_path: HashMap<String, usize>,
    entity_paths: HashSet<String>,
    entity_ids: HashSet<EntityId>,
}

impl FolderStructureBuilder<fn() -> EntityId> {
    /// Builds a tree in one go, with random folder ids.
    pub fn build(docs: Vec<DocUpload>, files: Vec<FileUpload>) -> Result<Folder> {
        let mut builder =
            FolderStructureBuilder::with_id_allocator(EntityId::generate as fn() -> EntityId);
        for upload in docs {
            builder.add_doc(upload)?;
        }
        for upload in files {
            builder.add_file(upload)?;
        }
        Ok(builder.finish())
    }
}

impl<F> FolderStructureBuilder<F>
where
    F: FnMut() -> EntityId,
{
    /// Creates a builder that asks `next_id` for the id of every folder it
    /// creates, the root included.
    pub fn with_id_allocator(mut next_id: F) -> Self {
        let root = FolderRecord {
            id: next_id(),
            name: ROOT_FOLDER_NAME.to_string(),
            docs: Vec::new(),
            files: Vec::new(),
            children: Vec::new(),
        };
        FolderStructureBuilder {
            next_id,
            records: vec![root],
            folders_by_path: HashMap::from([("/".to_string(), 0)]),
            entity_paths: HashSet::from(["/".to_string()]),
            entity_ids: HashSet::new(),
        }
    }

    pub fn add_doc(&mut self, upload: DocUpload) -> Result<()> {
        let DocUpload { path, mut doc } = upload;
        let (dir, basename) = split_upload_path(&path)?;
        let name = doc.name.get_or_insert_with(|| basename.to_string()).clone();

        let folder = self.place(&doc.id, &dir, basename, &name)?;
        self.records[folder].docs.push(doc);
        Ok(())
    }

    pub fn add_file(&mut self, upload: FileUpload) -> Result<()> {
        let FileUpload { path, mut file } = upload;
        let (dir, basename) = split_upload_path(&path)?;
        let name = file.name.get_or_insert_with(|| basename.to_string()).clone();

        let folder = self.place(&file.id, &dir, basename, &name)?;
        self.records[folder].files.push(file);
        Ok(())
    }

    /// Assembles the nested tree. Child folders are ordered by name.
    pub fn finish(mut self) -> Folder {
        debug!(
            folders = self.records.len(),
            entities = self.entity_ids.len(),
            "Built folder structure"
        );
        materialize(&mut self.records, 0)
    }

    /// Claims the id, the upload path and the named path of a new entity,
    /// and returns the index of the folder it goes into.
    fn place(&mut self, id: &EntityId, dir: &str, basename: &str, name: &str) -> Result<usize> {
        if !self.entity_ids.insert(id.clone()) {
            return Err(Error::DuplicateId(id.clone()));
        }
        let folder = self.mkdirp(dir)?;
        self.record_entity_path(join(dir, basename))?;
        if name != basename {
            self.record_entity_path(join(dir, name))?;
        }
        Ok(folder)
    }

    fn record_entity_path(&mut self, path: String) -> Result<()> {
        if self.entity_paths.contains(&path) {
            return Err(Error::DuplicatePath(path));
        }
        self.entity_paths.insert(path);
        Ok(())
    }

    fn mkdirp(&mut self, path: &str) -> Result<usize> {
        if let Some(&index) = self.folders_by_path.get(path) {
            return Ok(index);
        }

        let (parent_path, name) = match path.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((parent, name)) => (parent, name),
            None => ("/", path),
        };
        let parent = self.mkdirp(parent_path)?;
        self.record_entity_path(path.to_string())?;

        let index = self.records.len();
        self.records.push(FolderRecord {
            id: (self.next_id)(),
            name: name.to_string(),
            docs: Vec::new(),
            files: Vec::new(),
            children: Vec::new(),
        });
        self.records[parent].children.push(index);
        self.folders_by_path.insert(path.to_string(), index);
        Ok(index)
    }
}

/// Splits `/a/b/c.tex` into (`/a/b`, `c.tex`). Empty segments are dropped.
fn split_upload_path(path: &str) -> Result<(String, &str)> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let basename = segments
        .pop()
        .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
    Ok((format!("/{}", segments.join("/")), basename))
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn materialize(records: &mut [FolderRecord], index: usize) -> Folder {
    let mut children = std::mem::take(&mut records[index].children);
    children.sort_by(|a, b| records[*a].name.cmp(&records[*b].name));
    let folders: Vec<Folder> = children
        .into_iter()
        .map(|child| materialize(records, child))
        .collect();

    let record = &mut records[index];
    Folder {
        id: record.id.clone(),
        name: Some(record.name.clone()),
        docs: std::mem::take(&mut record.docs).into(),
        file_refs: std::mem::take(&mut record.files).into(),
        folders: Children::from(folders),
    }
}
