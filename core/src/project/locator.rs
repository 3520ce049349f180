//! Search over a loaded project tree.
//!
//! The free functions work on a borrowed [`Project`] and never allocate
//! beyond the returned paths. [`ProjectLocator`] wraps them for callers that
//! only hold a project id: it loads the snapshot from a [`ProjectStore`] and
//! hands back owned results.
//!
//! Search is tolerant. Null slots, missing lists and unnamed nodes off the
//! search path are skipped; only the bulk listings in
//! [`entity_handler`](super::entity_handler) treat them as errors.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use super::iterable::{iterable_folders, iterable_of_kind};
use super::model::{
    Element, ElementRef, EntityId, EntityKind, Folder, MongoPath, Project, ProjectId,
};
use super::store::ProjectStore;
use super::{Error, Result};

/// Where an element lives, as a display path and as a positional address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementPath {
    #[serde(rename = "fileSystem")]
    pub file_system: String,
    pub mongo: MongoPath,
}

impl ElementPath {
    fn root() -> Self {
        ElementPath {
            file_system: "/".to_string(),
            mongo: MongoPath::root(),
        }
    }

    fn child(&self, name: Option<&str>, kind: EntityKind, index: usize) -> Self {
        ElementPath {
            file_system: join_path(&self.file_system, name.unwrap_or("")),
            mongo: self.mongo.child(kind, index),
        }
    }
}

/// A search hit borrowed from the project.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<'a> {
    pub element: ElementRef<'a>,
    pub path: ElementPath,
    /// Parent folder. `None` only for the root folder.
    pub folder: Option<&'a Folder>,
}

impl Located<'_> {
    pub fn kind(&self) -> EntityKind {
        self.element.kind()
    }
}

/// Owned counterpart of [`Located`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedEntity {
    pub element: Element,
    pub path: ElementPath,
    pub folder: Option<Folder>,
}

impl LocatedEntity {
    pub fn kind(&self) -> EntityKind {
        self.element.kind()
    }
}

impl From<Located<'_>> for LocatedEntity {
    fn from(located: Located<'_>) -> Self {
        LocatedEntity {
            element: located.element.to_element(),
            path: located.path,
            folder: located.folder.cloned(),
        }
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn root_of(project: &Project) -> Result<&Folder> {
    project
        .root()
        .ok_or_else(|| Error::malformed(format!("project {} has no root folder", project.id)))
}

/// Finds the element of `kind` with id `element_id`, anywhere in the tree.
///
/// The root folder is only a match when searching for folders. Fails with
/// [`Error::NotFound`] when nothing matches.
pub fn find_element<'a>(
    project: &'a Project,
    element_id: &EntityId,
    kind: EntityKind,
) -> Result<Located<'a>> {
    let root = root_of(project)?;
    if kind == EntityKind::Folder && root.id == *element_id {
        return Ok(Located {
            element: ElementRef::Folder(root),
            path: ElementPath::root(),
            folder: None,
        });
    }
    search(root, &ElementPath::root(), element_id, kind).ok_or(Error::NotFound)
}

// Pre-order: a folder's own list is checked before descending into children.
fn search<'a>(
    folder: &'a Folder,
    path: &ElementPath,
    element_id: &EntityId,
    kind: EntityKind,
) -> Option<Located<'a>> {
    for (index, element) in iterable_of_kind(Some(folder), kind) {
        if element.id() == element_id {
            return Some(Located {
                element,
                path: path.child(element.name(), kind, index),
                folder: Some(folder),
            });
        }
    }
    iterable_folders(Some(folder))
        .indexed()
        .find_map(|(index, child)| {
            let child_path = path.child(child.name.as_deref(), EntityKind::Folder, index);
            search(child, &child_path, element_id, kind)
        })
}

fn names_match(name: Option<&str>, wanted: &str, exact_case: bool) -> bool {
    match name {
        Some(name) if exact_case => name == wanted,
        Some(name) => name.to_lowercase() == wanted.to_lowercase(),
        None => false,
    }
}

fn find_named<'a>(
    folder: &'a Folder,
    kind: EntityKind,
    name: &str,
    exact_case: bool,
) -> Option<(usize, ElementRef<'a>)> {
    iterable_of_kind(Some(folder), kind)
        .find(|(_, element)| names_match(element.name(), name, exact_case))
}

/// Resolves a `/`-separated path to an element.
///
/// The leading slash is optional and an empty path (or `/`) is the root
/// folder. Intermediate segments only match folders; the last segment may
/// name a folder, a doc or a file, tried in that order. With duplicate
/// sibling names the first one wins. Names compare case-insensitively
/// unless `exact_case` is set.
pub fn find_element_by_path<'a>(
    project: &'a Project,
    path: &str,
    exact_case: bool,
) -> Result<Located<'a>> {
    let root = root_of(project)?;
    let relative = path.strip_prefix('/').unwrap_or(path);
    if relative.is_empty() {
        return Ok(Located {
            element: ElementRef::Folder(root),
            path: ElementPath::root(),
            folder: None,
        });
    }

    let mut segments: Vec<&str> = relative.split('/').collect();
    let terminal = segments.pop().unwrap_or_default();

    let mut folder = root;
    let mut location = ElementPath::root();
    for segment in segments {
        let (index, element) =
            find_named(folder, EntityKind::Folder, segment, exact_case).ok_or(Error::NotFound)?;
        let ElementRef::Folder(next) = element else {
            return Err(Error::NotFound);
        };
        location = location.child(next.name.as_deref(), EntityKind::Folder, index);
        folder = next;
    }

    [EntityKind::Folder, EntityKind::Doc, EntityKind::File]
        .into_iter()
        .find_map(|kind| {
            find_named(folder, kind, terminal, exact_case).map(|(index, element)| Located {
                element,
                path: location.child(element.name(), kind, index),
                folder: Some(folder),
            })
        })
        .ok_or(Error::NotFound)
}

/// Looks up the project's designated root doc.
///
/// An unset or stale `rootDoc_id` yields `Ok(None)`; only a malformed
/// project is an error.
pub fn find_root_doc(project: &Project) -> Result<Option<Located<'_>>> {
    let Some(root_doc_id) = &project.root_doc_id else {
        return Ok(None);
    };
    match find_element(project, root_doc_id, EntityKind::Doc) {
        Ok(located) => Ok(Some(located)),
        Err(Error::NotFound) => {
            debug!(
                project_id = %project.id,
                root_doc_id = %root_doc_id,
                "Root doc is not in the tree"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Follows a dotted positional address such as `rootFolder.0.folders.1.docs.0`.
///
/// Callers are expected to pass an address produced earlier by
/// [`find_element`]; anything that does not resolve is an error.
pub fn find_element_by_mongo_path<'a>(
    project: &'a Project,
    mongo_path: &str,
) -> Result<ElementRef<'a>> {
    mongo_path.parse::<MongoPath>()?.resolve(project)
}

/// Locator for callers that hold a project id rather than a loaded project.
#[derive(Clone)]
pub struct ProjectLocator {
    projects: Arc<dyn ProjectStore>,
}

impl ProjectLocator {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        ProjectLocator { projects }
    }

    async fn load(&self, project_id: &ProjectId) -> Result<Project> {
        self.projects
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.clone()))
    }

    #[instrument(
        skip(self),
        fields(project_id = %project_id, element_id = %element_id, kind = %kind)
    )]
    pub async fn find_element(
        &self,
        project_id: &ProjectId,
        element_id: &EntityId,
        kind: EntityKind,
    ) -> Result<LocatedEntity> {
        let project = self
            .projects
            .get_project_without_doc_lines(project_id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.clone()))?;
        find_element(&project, element_id, kind).map(LocatedEntity::from)
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn find_element_by_path(
        &self,
        project_id: &ProjectId,
        path: &str,
        exact_case: bool,
    ) -> Result<LocatedEntity> {
        let project = self.load(project_id).await?;
        find_element_by_path(&project, path, exact_case).map(LocatedEntity::from)
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn find_root_doc(&self, project_id: &ProjectId) -> Result<Option<LocatedEntity>> {
        let project = self.load(project_id).await?;
        Ok(find_root_doc(&project)?.map(LocatedEntity::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::{Children, Doc, FileRef};
    use crate::project::store::MemoryProjectStore;

    fn fixture() -> Project {
        let first_sub_folder = Folder::new("rweq43", "firstSubFolder");
        let second_sub_folder = Folder::new("dsa3e23", "secondSubFolder")
            .with_docs(vec![Doc::new("321dmdwi", "subdoc.txt")])
            .with_files(vec![FileRef::new("d1d2dk", "subSubFile")]);

        let mut sub_folder = Folder::new("dsadsa93", "subFolder");
        sub_folder.folders = Children::List(vec![Some(second_sub_folder), None]);

        let mut sub_folder1 = Folder::new("123asdjoij", "subFolder1");
        sub_folder1.docs = Children::Absent;
        sub_folder1.file_refs = Children::Absent;
        sub_folder1.folders = vec![first_sub_folder].into();

        let mut root = Folder::new("123sdskd", "");
        root.name = None;
        root.docs = Children::List(vec![
            Some(Doc::new("dsad2ddd", "otherDoc.txt")),
            Some(Doc::new("dsad2ddddd", "docname.txt")),
            None,
            Some(Doc::new("das239djd", "rootDoc")),
        ]);
        root.file_refs = vec![FileRef::new("dsa9lkdsad", "file1")].into();
        root.folders = vec![sub_folder1, sub_folder].into();

        Project::new("1234566", root).with_root_doc("das239djd")
    }

    #[test]
    fn test_find_doc_at_root() {
        let project = fixture();
        let found = find_element(&project, &"dsad2ddddd".into(), EntityKind::Doc).unwrap();
        assert_eq!(found.element.id().as_str(), "dsad2ddddd");
        assert_eq!(found.path.file_system, "/docname.txt");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.docs.1");
        assert_eq!(found.folder.unwrap().id.as_str(), "123sdskd");
    }

    #[test]
    fn test_find_doc_counts_null_slots_in_mongo_index() {
        let project = fixture();
        let found = find_element(&project, &"das239djd".into(), EntityKind::Doc).unwrap();
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.docs.3");
    }

    #[test]
    fn test_find_nested_doc() {
        let project = fixture();
        let found = find_element(&project, &"321dmdwi".into(), "doc".parse().unwrap()).unwrap();
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder/subdoc.txt");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.1.folders.0.docs.0");
        assert_eq!(found.folder.unwrap().id.as_str(), "dsa3e23");
    }

    #[test]
    fn test_find_missing_element_is_not_found() {
        let project = fixture();
        let err = find_element(&project, &"ddsd432nj42".into(), EntityKind::Doc).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "entity not found");
    }

    #[test]
    fn test_root_folder_only_matches_folder_kind() {
        let project = fixture();
        let root_id = EntityId::from("123sdskd");

        let found = find_element(&project, &root_id, EntityKind::Folder).unwrap();
        assert_eq!(found.element.id(), &root_id);
        assert!(found.folder.is_none());
        assert_eq!(found.path.file_system, "/");

        assert!(matches!(find_element(&project, &root_id, EntityKind::Doc), Err(Error::NotFound)));
        assert!(matches!(find_element(&project, &root_id, EntityKind::File), Err(Error::NotFound)));
    }

    #[test]
    fn test_find_folders() {
        let project = fixture();

        let found = find_element(&project, &"dsadsa93".into(), EntityKind::Folder).unwrap();
        assert_eq!(found.path.file_system, "/subFolder");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.1");
        assert_eq!(found.folder.unwrap().id.as_str(), "123sdskd");

        let found = find_element(&project, &"dsa3e23".into(), EntityKind::Folder).unwrap();
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.1.folders.0");
        assert_eq!(found.folder.unwrap().id.as_str(), "dsadsa93");
    }

    #[test]
    fn test_find_files() {
        let project = fixture();

        let kind = "fileRefs".parse().unwrap();
        let found = find_element(&project, &"dsa9lkdsad".into(), kind).unwrap();
        assert_eq!(found.path.file_system, "/file1");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.fileRefs.0");

        let found = find_element(&project, &"d1d2dk".into(), "file".parse().unwrap()).unwrap();
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder/subSubFile");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.1.folders.0.fileRefs.0");
        assert_eq!(found.folder.unwrap().id.as_str(), "dsa3e23");
    }

    #[test]
    fn test_find_ignores_kind_mismatch() {
        let project = fixture();
        assert!(matches!(
            find_element(&project, &"dsadsa93".into(), EntityKind::Doc),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_find_element_tolerates_malformed_nodes_off_path() {
        let mut project = fixture();
        let mut broken = Folder::new("broken", "");
        broken.name = None;
        broken.folders = Children::Null;
        project.root_folder[0].folders.push(broken);

        let found = find_element(&project, &"321dmdwi".into(), EntityKind::Doc).unwrap();
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder/subdoc.txt");
    }

    #[test]
    fn test_mongo_path_round_trip() {
        let project = fixture();
        let found = find_element(&project, &"d1d2dk".into(), EntityKind::File).unwrap();
        let resolved = find_element_by_mongo_path(&project, &found.path.mongo.to_string()).unwrap();
        assert_eq!(resolved, found.element);

        assert!(matches!(
            find_element_by_mongo_path(&project, "rootFolder.0.docs.2"),
            Err(Error::InvalidMongoPath(_))
        ));
    }

    #[test]
    fn test_find_root_doc() {
        let mut project = fixture();
        let found = find_root_doc(&project).unwrap().unwrap();
        assert_eq!(found.element.id().as_str(), "das239djd");
        assert_eq!(found.path.file_system, "/rootDoc");

        project.root_doc_id = None;
        assert!(find_root_doc(&project).unwrap().is_none());

        project.root_doc_id = Some("doesntexist".into());
        assert!(find_root_doc(&project).unwrap().is_none());
    }

    #[test]
    fn test_find_by_path_root_level() {
        let project = fixture();
        for path in ["otherDoc.txt", "/otherDoc.txt"] {
            let found = find_element_by_path(&project, path, false).unwrap();
            assert_eq!(found.element.id().as_str(), "dsad2ddd");
            assert_eq!(found.kind(), EntityKind::Doc);
            assert_eq!(found.folder.unwrap().id.as_str(), "123sdskd");
        }

        let found = find_element_by_path(&project, "file1", false).unwrap();
        assert_eq!(found.kind(), EntityKind::File);
    }

    #[test]
    fn test_find_by_path_nested() {
        let project = fixture();

        let found =
            find_element_by_path(&project, "subFolder/secondSubFolder/subdoc.txt", false).unwrap();
        assert_eq!(found.element.id().as_str(), "321dmdwi");
        assert_eq!(found.kind(), EntityKind::Doc);
        assert_eq!(found.folder.unwrap().id.as_str(), "dsa3e23");
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.1.folders.0.docs.0");

        let found =
            find_element_by_path(&project, "subFolder/secondSubFolder/subSubFile", false).unwrap();
        assert_eq!(found.kind(), EntityKind::File);

        let found = find_element_by_path(&project, "subFolder/secondSubFolder", false).unwrap();
        assert_eq!(found.kind(), EntityKind::Folder);
        assert_eq!(found.folder.unwrap().id.as_str(), "dsadsa93");
    }

    #[test]
    fn test_find_by_path_case_sensitivity() {
        let project = fixture();
        let path = "SUBFOLDER/SECONDSUBFOLDER/SUBSUBFILE";

        let found = find_element_by_path(&project, path, false).unwrap();
        assert_eq!(found.element.id().as_str(), "d1d2dk");
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder/subSubFile");

        assert!(find_element_by_path(&project, path, true).is_err());
    }

    #[test]
    fn test_find_by_path_root() {
        let project = fixture();
        for path in ["/", ""] {
            let found = find_element_by_path(&project, path, false).unwrap();
            assert_eq!(found.element.id().as_str(), "123sdskd");
            assert_eq!(found.kind(), EntityKind::Folder);
            assert!(found.folder.is_none());
        }
    }

    #[test]
    fn test_find_by_path_missing() {
        let project = fixture();
        assert!(
            find_element_by_path(&project, "subFolder/secondSubFolder/exist.txt", false).is_err()
        );
        assert!(find_element_by_path(&project, "this/does/not/exist.txt", false).is_err());
    }

    #[test]
    fn test_find_by_path_with_duplicate_folders_takes_first() {
        let nested = Folder::new("n1", "1").with_docs(vec![Doc::new("456", "main.tex")]);
        let duplicate = Folder::new("1234", "duplicate1")
            .with_docs(vec![Doc::new("456", "main.tex")])
            .with_folders(vec![nested]);
        let root = Folder::new("root", "").with_folders(vec![duplicate.clone(), duplicate]);
        let project = Project::new("p", root);

        let found = find_element_by_path(&project, "duplicate1/main.tex", false).unwrap();
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.0.docs.0");

        let found = find_element_by_path(&project, "duplicate1/1/main.tex", false).unwrap();
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.0.folders.0.docs.0");
    }

    #[test]
    fn test_find_by_path_skips_null_docs() {
        let mut root = Folder::new("root", "");
        root.docs = Children::List(vec![
            Some(Doc::new("a", "main.tex")),
            None,
            Some(Doc::new("b", "other.tex")),
        ]);
        let project = Project::new("p", root);

        let found = find_element_by_path(&project, "/other.tex", false).unwrap();
        assert_eq!(found.element.name(), Some("other.tex"));
        assert_eq!(found.path.mongo.to_string(), "rootFolder.0.docs.2");
    }

    #[test]
    fn test_find_by_path_prefers_folder_over_doc() {
        let root = Folder::new("root", "")
            .with_docs(vec![Doc::new("d", "chapter")])
            .with_files(vec![FileRef::new("f", "chapter")])
            .with_folders(vec![Folder::new("c", "chapter")]);
        let project = Project::new("p", root);
        let found = find_element_by_path(&project, "chapter", false).unwrap();
        assert_eq!(found.kind(), EntityKind::Folder);

        let root = Folder::new("root", "")
            .with_docs(vec![Doc::new("d", "chapter")])
            .with_files(vec![FileRef::new("f", "chapter")]);
        let project = Project::new("p", root);
        let found = find_element_by_path(&project, "chapter", false).unwrap();
        assert_eq!(found.kind(), EntityKind::Doc);
    }

    #[tokio::test]
    async fn test_locator_service_loads_by_id() {
        let store = Arc::new(MemoryProjectStore::new());
        store.insert(fixture()).await;
        let locator = ProjectLocator::new(store);
        let project_id = ProjectId::from("1234566");

        let found = locator
            .find_element(&project_id, &"321dmdwi".into(), EntityKind::Doc)
            .await
            .unwrap();
        assert_eq!(found.path.file_system, "/subFolder/secondSubFolder/subdoc.txt");
        assert_eq!(found.folder.unwrap().id.as_str(), "dsa3e23");

        let found = locator.find_element_by_path(&project_id, "otherDoc.txt", false).await.unwrap();
        assert_eq!(found.element.id().as_str(), "dsad2ddd");

        let root_doc = locator.find_root_doc(&project_id).await.unwrap().unwrap();
        assert_eq!(root_doc.element.id().as_str(), "das239djd");
    }

    #[tokio::test]
    async fn test_locator_service_fails_for_unknown_project() {
        let locator = ProjectLocator::new(Arc::new(MemoryProjectStore::new()));
        let result = locator.find_element_by_path(&"missing".into(), "/other.tex", false).await;
        assert!(matches!(result, Err(Error::ProjectNotFound(_))));
    }
}
