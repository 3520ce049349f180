//! In-memory model of a project's file tree and the algorithms that build,
//! search, and validate it.
//!
//! A project owns exactly one root [`Folder`]. Folders hold ordered lists of
//! [`Doc`]s (editable text, line oriented), [`FileRef`]s (references to
//! binary content held in an external blob store), and child folders. The
//! tree is loaded from a snapshot provider ([`ProjectStore`]) and is never
//! mutated by this module: it builds trees once and answers queries against
//! them.
//!
//! # Core Concepts
//!
//! *   **[`safe_path`]:** Validation and sanitization of filenames and full
//!     paths. All validators return booleans; [`safe_path::clean`] is total.
//! *   **[`iterable`]:** The shared child iterator. Child lists may contain
//!     null slots (tombstones left by partial writes) and may be missing
//!     entirely; every tree walk goes through this helper so that null
//!     tolerance is enforced in one place.
//! *   **[`FolderStructureBuilder`]:** Builds a rooted tree from flat lists of
//!     doc and file uploads, creating intermediate folders on demand.
//! *   **[`locator`]:** Resolves an element id or a path string to the element,
//!     its parent folder, and an [`ElementPath`] holding both a filesystem
//!     path and a positional [`MongoPath`].
//! *   **[`ProjectEntityHandler`]:** Flattened project-wide listings (all
//!     folders, docs, files) joined with content from a [`DocumentStore`].
//! *   **[`root_doc`]:** Detection of the main document of a project.
//!
//! # Error Model
//!
//! Two kinds of failure are kept apart. [`Error::NotFound`] means a
//! well-formed tree simply does not contain what was asked for; callers can
//! test for it with [`Error::is_not_found`]. Everything else describing the
//! tree itself ([`Error::MalformedTree`], [`Error::DuplicatePath`]) is a
//! data-integrity failure. Bulk listings fail as a whole on malformed input
//! rather than returning partial results.
//!
//! # Example Usage
//!
//! ```rust
//! use folio_core::project::{
//!     locator, Doc, DocUpload, EntityKind, FolderStructureBuilder, Project, ProjectId,
//! };
//!
//! let root = FolderStructureBuilder::build(
//!     vec![
//!         DocUpload::new("/main.tex", Doc::new("d1", "main.tex")),
//!         DocUpload::new("/chapters/intro.tex", Doc::new("d2", "intro.tex")),
//!     ],
//!     vec![],
//! )
//! .unwrap();
//! let project = Project::new(ProjectId::from("p1"), root);
//!
//! let found = locator::find_element(&project, &"d2".into(), EntityKind::Doc).unwrap();
//! assert_eq!(found.path.file_system, "/chapters/intro.tex");
//! assert_eq!(found.path.mongo.to_string(), "rootFolder.0.folders.0.docs.0");
//! ```

pub use self::entity_handler::{
    DocEntry, EntityListing, FileEntry, FolderEntry, FolderRef, PathEntry, ProjectEntityHandler,
};
pub use self::folder_structure::{DocUpload, FileUpload, FolderStructureBuilder};
pub use self::locator::{ElementPath, Located, LocatedEntity, ProjectLocator};
pub use self::model::{
    Children, Doc, Element, ElementRef, EntityId, EntityKind, FileRef, Folder, MongoPath,
    MongoStep, Project, ProjectId,
};
pub use self::root_doc::{RootDocDetector, RootDocFile};
pub use self::store::{
    DocContent, DocumentStore, GetDocOptions, MemoryDocumentStore, MemoryProjectStore,
    ProjectStore, SnapshotStore, StoreConfig,
};

pub mod entity_handler;
pub mod folder_structure;
pub mod iterable;
pub mod locator;
mod model;
pub mod root_doc;
pub mod safe_path;
pub mod store;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the internal directory inside a snapshot store.
pub const INTERNAL_DIR_NAME: &str = ".folio";
/// Name of the store configuration file inside [`INTERNAL_DIR_NAME`].
pub const STORE_CONFIG_FILENAME: &str = "config.json";
/// Extension of project snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum Error {
    #[error("entity not found")]
    NotFound,

    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("malformed file tree: {0}")]
    MalformedTree(String),

    #[error("entity already exists: {0}")]
    DuplicatePath(String),

    #[error("entity id used more than once: {0}")]
    DuplicateId(EntityId),

    #[error("no element at mongo path: {0}")]
    InvalidMongoPath(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("doc {0} is in the file tree but missing from the document store")]
    MissingDocContent(EntityId),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("Store configuration file is missing or invalid: {0}")]
    InvalidConfig(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Path exists and is a file: {0}")]
    PathIsFile(PathBuf),

    #[error("Not a snapshot store (missing .folio directory): {0}")]
    NotAStore(PathBuf),

    #[error("Cannot create store: path exists and is not an empty directory: {0}")]
    StoreCreationConflict(PathBuf),

    #[error("Snapshot serialization/deserialization error")]
    Snapshot(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for the recoverable "well-formed tree, no such element" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound | Error::ProjectNotFound(_))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedTree(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
