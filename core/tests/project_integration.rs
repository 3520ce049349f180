use std::sync::Arc;

use tempfile::tempdir;

use folio_core::project::entity_handler::get_all_entities_from_project;
use folio_core::project::locator::{find_element, find_element_by_path};
use folio_core::project::{
    Doc, DocUpload, EntityKind, Error, FileRef, FileUpload, FolderStructureBuilder, Project,
    ProjectEntityHandler, ProjectId, ProjectLocator, ProjectStore, RootDocDetector, SnapshotStore,
    INTERNAL_DIR_NAME,
};

fn sample_uploads() -> (Vec<DocUpload>, Vec<FileUpload>) {
    let docs = vec![
        DocUpload::new(
            "/main.tex",
            Doc::new("d-main", "main.tex")
                .with_lines(["\\documentclass{article}", "\\input{chapters/intro}"]),
        ),
        DocUpload::new(
            "/chapters/intro.tex",
            Doc::new("d-intro", "intro.tex").with_lines(["Intro"]),
        ),
        DocUpload::new(
            "/chapters/appendix/a.tex",
            Doc::new("d-appendix", "a.tex").with_lines(["Appendix"]),
        ),
    ];
    let files = vec![
        FileUpload::new("/figures/plot.png", FileRef::new("f-plot", "plot.png").with_hash("abc")),
        FileUpload::new("/refs.bib", FileRef::new("f-refs", "refs.bib")),
    ];
    (docs, files)
}

#[tokio::test]
async fn integration_build_save_and_query_project() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("store");

    // 1. Create the store and save a freshly built project
    SnapshotStore::create(&store_path).await.expect("Failed to create store");
    assert!(store_path.join(INTERNAL_DIR_NAME).is_dir());

    let (docs, files) = sample_uploads();
    let root = FolderStructureBuilder::build(docs, files).expect("Failed to build tree");
    let project = Project::new("paper", root);
    let store = Arc::new(SnapshotStore::open(&store_path).await.expect("Failed to open store"));
    store.save_project(&project).await.unwrap();

    // 2. Locate by id and by path through the stored snapshot
    let project_id = ProjectId::from("paper");
    let locator = ProjectLocator::new(store.clone());
    let found = locator
        .find_element(&project_id, &"d-appendix".into(), EntityKind::Doc)
        .await
        .unwrap();
    assert_eq!(found.path.file_system, "/chapters/appendix/a.tex");
    assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.0.folders.0.docs.0");

    let by_path = locator
        .find_element_by_path(&project_id, "/FIGURES/plot.png", false)
        .await
        .unwrap();
    assert_eq!(by_path.element.id().as_str(), "f-plot");
    assert_eq!(by_path.kind(), EntityKind::File);

    // 3. Listings join doc contents held in the same snapshots
    let handler = ProjectEntityHandler::new(store.clone(), store.clone());
    let all_docs = handler.get_all_docs(&project_id).await.unwrap();
    let paths: Vec<_> = all_docs.keys().map(String::as_str).collect();
    assert_eq!(paths, ["/chapters/appendix/a.tex", "/chapters/intro.tex", "/main.tex"]);
    assert_eq!(all_docs["/chapters/intro.tex"].lines, ["Intro"]);

    let all_files = handler.get_all_files(&project_id).await.unwrap();
    assert_eq!(all_files["/figures/plot.png"].file.hash.as_deref(), Some("abc"));
    assert!(all_files.contains_key("/refs.bib"));

    // 4. Root doc detection
    let detector = RootDocDetector::new(handler, store.config().root_doc_extensions.clone());
    assert_eq!(detector.detect(&project_id).await.unwrap(), Some("d-main".into()));
}

#[tokio::test]
async fn integration_locator_symmetry_on_built_tree() {
    let (docs, files) = sample_uploads();
    let root = FolderStructureBuilder::build(docs, files).unwrap();
    let project = Project::new("paper", root);

    let listing = get_all_entities_from_project(&project).unwrap();
    assert_eq!(listing.docs.len(), 3);
    assert_eq!(listing.files.len(), 2);

    for entry in &listing.docs {
        let by_path = find_element_by_path(&project, &entry.path, true).unwrap();
        assert_eq!(by_path.element.id(), &entry.entity.id);

        let by_id = find_element(&project, &entry.entity.id, EntityKind::Doc).unwrap();
        assert_eq!(by_id.path.file_system, entry.path);
        assert_eq!(by_id.path, by_path.path);
    }
    for entry in &listing.files {
        let by_path = find_element_by_path(&project, &entry.path, true).unwrap();
        assert_eq!(by_path.element.id(), &entry.entity.id);

        let by_id = find_element(&project, &entry.entity.id, EntityKind::File).unwrap();
        assert_eq!(by_id.path.file_system, entry.path);
    }
}

#[tokio::test]
async fn integration_missing_project() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SnapshotStore::create(&dir.path().join("store")).await.unwrap());
    assert!(store.get_project(&"nope".into()).await.unwrap().is_none());

    let locator = ProjectLocator::new(store.clone());
    let result = locator.find_root_doc(&"nope".into()).await;
    assert!(matches!(result, Err(Error::ProjectNotFound(_))));

    let handler = ProjectEntityHandler::new(store.clone(), store);
    let result = handler.get_all_docs(&"nope".into()).await;
    assert!(matches!(result, Err(Error::ProjectNotFound(_))));
}
