//! Choosing the main document of a project.
//!
//! A root doc is a doc with an allowed extension (see
//! [`DEFAULT_ROOT_DOC_EXTENSIONS`]) containing a line that starts with
//! `\documentclass`. Detection works either on a stored project, through the
//! [`ProjectEntityHandler`], or on a directory about to be imported.
//! Persisting the choice is left to the caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::{debug, instrument};

use super::entity_handler::{DocEntry, ProjectEntityHandler};
use super::model::{EntityId, ProjectId};
use super::{Error, Result};

pub const DEFAULT_ROOT_DOC_EXTENSIONS: &[&str] = &["tex", "Rtex", "ltx", "Rnw"];

const MAIN_FILE_NAME: &str = "main.tex";

static DOCUMENTCLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\\documentclass").expect("documentclass pattern is valid"));

/// Whether `path` has one of `extensions` (compared case-insensitively).
pub fn is_valid_root_doc_path<S: AsRef<str>>(path: &str, extensions: &[S]) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    match basename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => extensions
            .iter()
            .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

pub fn has_documentclass<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().any(|line| DOCUMENTCLASS.is_match(line.as_ref()))
}

/// First doc, in path order, that qualifies as a root doc.
pub fn find_root_doc_candidate<'a, S: AsRef<str>>(
    docs: &'a BTreeMap<String, DocEntry>,
    extensions: &[S],
) -> Option<&'a DocEntry> {
    docs.iter()
        .find(|(path, doc)| {
            is_valid_root_doc_path(path, extensions) && has_documentclass(&doc.lines)
        })
        .map(|(_, doc)| doc)
}

/// Resolves a user-supplied root doc name against the project's doc paths.
///
/// Surrounding quotes are ignored and the leading `/` is optional. An exact
/// path wins; otherwise a basename that matches exactly one doc is used.
pub fn root_doc_id_from_name(
    doc_paths: &BTreeMap<EntityId, String>,
    name: &str,
) -> Option<EntityId> {
    let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
    let wanted = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    };

    if let Some((id, _)) = doc_paths.iter().find(|(_, path)| **path == wanted) {
        return Some(id.clone());
    }

    let basename = wanted.rsplit('/').next().unwrap_or_default();
    let mut matches = doc_paths
        .iter()
        .filter(|(_, path)| path.rsplit('/').next() == Some(basename));
    match (matches.next(), matches.next()) {
        (Some((id, _)), None) => Some(id.clone()),
        _ => None,
    }
}

/// A file chosen by [`find_root_doc_file_in_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDocFile {
    /// Path relative to the searched directory, `/`-separated.
    pub path: String,
    pub content: String,
}

#[derive(Debug)]
struct Candidate {
    relative: String,
    absolute: PathBuf,
    depth: usize,
    size: u64,
}

async fn collect_candidates<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), String::new(), 0)];

    while let Some((current, prefix, depth)) = pending.pop() {
        let mut read_dir = fs::read_dir(&current).await.map_err(Error::Io)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let relative = format!("{prefix}{name}");
            let meta = entry.metadata().await.map_err(Error::Io)?;
            if meta.is_dir() {
                pending.push((entry.path(), format!("{relative}/"), depth + 1));
            } else if meta.is_file() && is_valid_root_doc_path(&relative, extensions) {
                candidates.push(Candidate {
                    relative,
                    absolute: entry.path(),
                    depth,
                    size: meta.len(),
                });
            }
        }
    }

    candidates.sort_by(|a, b| {
        let a_main = a.depth == 0 && a.relative == MAIN_FILE_NAME;
        let b_main = b.depth == 0 && b.relative == MAIN_FILE_NAME;
        b_main
            .cmp(&a_main)
            .then(a.depth.cmp(&b.depth))
            .then(a.size.cmp(&b.size))
            .then_with(|| a.relative.cmp(&b.relative))
    });
    Ok(candidates)
}

/// Picks the root doc among the files under `dir`.
///
/// Files are read root-level `main.tex` first, then by depth, size and name,
/// stopping at the first one with a `\documentclass` line. Without such a
/// line the root-level `main.tex` is chosen, then the first root-level
/// candidate. Read errors are returned as is.
#[instrument(skip(extensions), fields(dir = %dir.display()))]
pub async fn find_root_doc_file_in_directory<S: AsRef<str>>(
    dir: &Path,
    extensions: &[S],
) -> Result<Option<RootDocFile>> {
    let candidates = collect_candidates(dir, extensions).await?;
    debug!(candidates = candidates.len(), "Searching for root doc");

    let mut fallback: Option<RootDocFile> = None;
    for candidate in candidates {
        let bytes = fs::read(&candidate.absolute).await.map_err(Error::Io)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if content.lines().any(|line| DOCUMENTCLASS.is_match(line)) {
            return Ok(Some(RootDocFile {
                path: candidate.relative,
                content,
            }));
        }
        // Sorting puts root-level main.tex first, so the first root-level file is the fallback.
        if fallback.is_none() && candidate.depth == 0 {
            fallback = Some(RootDocFile {
                path: candidate.relative,
                content,
            });
        }
    }
    Ok(fallback)
}

/// Root doc selection for stored projects.
#[derive(Clone)]
pub struct RootDocDetector {
    entities: ProjectEntityHandler,
    extensions: Vec<String>,
}

impl RootDocDetector {
    pub fn new(entities: ProjectEntityHandler, extensions: Vec<String>) -> Self {
        RootDocDetector { entities, extensions }
    }

    pub fn is_valid_root_doc_path(&self, path: &str) -> bool {
        is_valid_root_doc_path(path, &self.extensions)
    }

    /// Id of the doc that should become the root doc, if any qualifies.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn detect(&self, project_id: &ProjectId) -> Result<Option<EntityId>> {
        let docs = self.entities.get_all_docs(project_id).await?;
        let found = find_root_doc_candidate(&docs, &self.extensions).map(|doc| doc.id.clone());
        debug!(found = ?found, "Automatic root doc detection finished");
        Ok(found)
    }

    /// Id of the doc named by `name`, if it exists.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn from_name(&self, project_id: &ProjectId, name: &str) -> Result<Option<EntityId>> {
        let doc_paths = self.entities.get_all_doc_paths_from_project_by_id(project_id).await?;
        Ok(root_doc_id_from_name(&doc_paths, name))
    }
}
