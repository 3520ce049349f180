use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::iterable;
use super::{Error, Result};

/// Opaque identifier of a doc, file, or folder. Persisted as `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    /// Allocates a fresh random identifier (UUID v4, simple form).
    pub fn generate() -> Self {
        EntityId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ProjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        ProjectId(id.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(id: String) -> Self {
        ProjectId(id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A child list as it appears in a stored tree.
///
/// Stored snapshots are not always tidy: a list may be missing entirely,
/// may be explicitly `null`, and may contain `null` slots left behind by
/// partial writes. All three shapes are kept so that strict listings can tell
/// them apart and so that a snapshot serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Children<T> {
    #[default]
    Absent,
    Null,
    List(Vec<Option<T>>),
}

impl<T> Children<T> {
    pub fn empty() -> Self {
        Children::List(Vec::new())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Children::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Children::Null)
    }

    /// Raw slots including tombstones. Missing and null lists have no slots.
    pub fn slots(&self) -> &[Option<T>] {
        match self {
            Children::List(slots) => slots,
            Children::Absent | Children::Null => &[],
        }
    }

    /// Appends an item, turning a missing or null list into a real one.
    pub fn push(&mut self, item: T) {
        match self {
            Children::List(slots) => slots.push(Some(item)),
            Children::Absent | Children::Null => *self = Children::List(vec![Some(item)]),
        }
    }
}

impl<T> From<Vec<T>> for Children<T> {
    fn from(items: Vec<T>) -> Self {
        Children::List(items.into_iter().map(Some).collect())
    }
}

impl<T: Serialize> Serialize for Children<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Children::List(slots) => slots.serialize(serializer),
            Children::Absent | Children::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Children<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // A missing field never reaches here; `#[serde(default)]` yields `Absent`.
        Ok(match Option::<Vec<Option<T>>>::deserialize(deserializer)? {
            Some(slots) => Children::List(slots),
            None => Children::Null,
        })
    }
}

/// An editable, line-oriented text document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doc {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl Doc {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Doc {
            id: id.into(),
            name: Some(name.into()),
            lines: None,
            rev: None,
        }
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = Some(lines.into_iter().map(Into::into).collect());
        self
    }
}

/// Reference to binary content held in an external blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(
        rename = "linkedFileData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_file_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl FileRef {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        FileRef {
            id: id.into(),
            name: Some(name.into()),
            hash: None,
            linked_file_data: None,
            created: None,
            rev: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Children::is_absent")]
    pub docs: Children<Doc>,
    #[serde(
        rename = "fileRefs",
        default,
        skip_serializing_if = "Children::is_absent"
    )]
    pub file_refs: Children<FileRef>,
    #[serde(default, skip_serializing_if = "Children::is_absent")]
    pub folders: Children<Folder>,
}

impl Folder {
    /// Creates a folder with empty (present) child lists.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Folder {
            id: id.into(),
            name: Some(name.into()),
            docs: Children::empty(),
            file_refs: Children::empty(),
            folders: Children::empty(),
        }
    }

    pub fn with_docs(mut self, docs: Vec<Doc>) -> Self {
        self.docs = docs.into();
        self
    }

    pub fn with_files(mut self, files: Vec<FileRef>) -> Self {
        self.file_refs = files.into();
        self
    }

    pub fn with_folders(mut self, folders: Vec<Folder>) -> Self {
        self.folders = folders.into();
        self
    }
}

/// Root aggregate of a project snapshot.
///
/// The root folder is stored as a one-element list under `rootFolder`, which
/// is why positional addresses start with `rootFolder.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "rootFolder", default)]
    pub root_folder: Vec<Folder>,
    #[serde(rename = "rootDoc_id", default)]
    pub root_doc_id: Option<EntityId>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, root: Folder) -> Self {
        Project {
            id: id.into(),
            name: None,
            root_folder: vec![root],
            root_doc_id: None,
        }
    }

    pub fn with_root_doc(mut self, doc_id: impl Into<EntityId>) -> Self {
        self.root_doc_id = Some(doc_id.into());
        self
    }

    pub fn root(&self) -> Option<&Folder> {
        self.root_folder.first()
    }

    /// Copy of the project with every doc's `lines` dropped.
    pub fn without_doc_lines(&self) -> Project {
        fn strip(folder: &mut Folder) {
            if let Children::List(slots) = &mut folder.docs {
                for doc in slots.iter_mut().flatten() {
                    doc.lines = None;
                }
            }
            if let Children::List(slots) = &mut folder.folders {
                for child in slots.iter_mut().flatten() {
                    strip(child);
                }
            }
        }

        let mut project = self.clone();
        for root in project.root_folder.iter_mut() {
            strip(root);
        }
        project
    }
}

/// Kind of tree element. Parsed once from any accepted spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Doc,
    File,
    Folder,
}

impl EntityKind {
    /// Name of the folder field holding elements of this kind.
    pub fn field_name(self) -> &'static str {
        match self {
            EntityKind::Doc => "docs",
            EntityKind::File => "fileRefs",
            EntityKind::Folder => "folders",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Doc => "doc",
            EntityKind::File => "file",
            EntityKind::Folder => "folder",
        }
    }

    fn from_field_name(field: &str) -> Option<Self> {
        match field {
            "docs" => Some(EntityKind::Doc),
            "fileRefs" => Some(EntityKind::File),
            "folders" => Some(EntityKind::Folder),
            _ => None,
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "doc" | "docs" => Ok(EntityKind::Doc),
            "file" | "files" | "fileRefs" => Ok(EntityKind::File),
            "folder" | "folders" => Ok(EntityKind::Folder),
            other => Err(Error::UnknownEntityType(other.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Borrowed view of a tree element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementRef<'a> {
    Doc(&'a Doc),
    File(&'a FileRef),
    Folder(&'a Folder),
}

impl<'a> ElementRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            ElementRef::Doc(_) => EntityKind::Doc,
            ElementRef::File(_) => EntityKind::File,
            ElementRef::Folder(_) => EntityKind::Folder,
        }
    }

    pub fn id(&self) -> &'a EntityId {
        match self {
            ElementRef::Doc(doc) => &doc.id,
            ElementRef::File(file) => &file.id,
            ElementRef::Folder(folder) => &folder.id,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        match self {
            ElementRef::Doc(doc) => doc.name.as_deref(),
            ElementRef::File(file) => file.name.as_deref(),
            ElementRef::Folder(folder) => folder.name.as_deref(),
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            ElementRef::Doc(doc) => Element::Doc((*doc).clone()),
            ElementRef::File(file) => Element::File((*file).clone()),
            ElementRef::Folder(folder) => Element::Folder((*folder).clone()),
        }
    }
}

/// Owned tree element, as returned by the async services.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Doc(Doc),
    File(FileRef),
    Folder(Folder),
}

impl Element {
    pub fn as_ref(&self) -> ElementRef<'_> {
        match self {
            Element::Doc(doc) => ElementRef::Doc(doc),
            Element::File(file) => ElementRef::File(file),
            Element::Folder(folder) => ElementRef::Folder(folder),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.as_ref().kind()
    }

    pub fn id(&self) -> &EntityId {
        self.as_ref().id()
    }

    pub fn name(&self) -> Option<&str> {
        self.as_ref().name()
    }
}

/// One `<field>.<index>` step of a [`MongoPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MongoStep {
    pub kind: EntityKind,
    pub index: usize,
}

/// Positional address of a node, e.g. `rootFolder.0.folders.1.docs.0`.
///
/// Indices are raw array positions, so null slots before a node count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MongoPath {
    root: usize,
    steps: Vec<MongoStep>,
}

impl MongoPath {
    /// Address of the root folder, `rootFolder.0`.
    pub fn root() -> Self {
        MongoPath {
            root: 0,
            steps: Vec::new(),
        }
    }

    pub fn child(&self, kind: EntityKind, index: usize) -> Self {
        let mut path = self.clone();
        path.steps.push(MongoStep { kind, index });
        path
    }

    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn steps(&self) -> &[MongoStep] {
        &self.steps
    }

    /// Follows the address through `project`.
    ///
    /// Fails with [`Error::InvalidMongoPath`] when any position is out of
    /// range, lands on a null slot, or descends through a doc or file.
    pub fn resolve<'a>(&self, project: &'a Project) -> Result<ElementRef<'a>> {
        let invalid = || Error::InvalidMongoPath(self.to_string());

        let root = project.root_folder.get(self.root).ok_or_else(invalid)?;
        let mut current = ElementRef::Folder(root);
        for step in &self.steps {
            let ElementRef::Folder(folder) = current else {
                return Err(invalid());
            };
            current = iterable::element_at(folder, step.kind, step.index).ok_or_else(invalid)?;
        }
        Ok(current)
    }
}

impl fmt::Display for MongoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rootFolder.{}", self.root)?;
        for step in &self.steps {
            write!(f, ".{}.{}", step.kind.field_name(), step.index)?;
        }
        Ok(())
    }
}

impl FromStr for MongoPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMongoPath(s.to_string());
        let mut parts = s.split('.');

        if parts.next() != Some("rootFolder") {
            return Err(invalid());
        }
        let root = parts
            .next()
            .and_then(|index| index.parse().ok())
            .ok_or_else(invalid)?;

        let mut steps = Vec::new();
        while let Some(field) = parts.next() {
            let kind = EntityKind::from_field_name(field).ok_or_else(invalid)?;
            let index = parts
                .next()
                .and_then(|index| index.parse().ok())
                .ok_or_else(invalid)?;
            steps.push(MongoStep { kind, index });
        }
        Ok(MongoPath { root, steps })
    }
}

impl Serialize for MongoPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
