use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use folio_core::project::entity_handler::get_all_entities_from_project;
use folio_core::project::locator::find_root_doc;
use folio_core::project::root_doc::find_root_doc_file_in_directory;
use folio_core::project::{
    safe_path, Doc, DocUpload, EntityId, EntityKind, FileRef, FileUpload, FolderStructureBuilder,
    LocatedEntity, Project, ProjectEntityHandler, ProjectId, ProjectLocator, RootDocDetector,
    SnapshotStore,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::AppContext;
use crate::cli::{CheckArgs, FindArgs, ImportArgs, InitArgs, ResolveArgs, RootDocArgs, TreeArgs};

/// Extensions imported as editable docs; everything else becomes a file ref.
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "tex", "latex", "sty", "cls", "bst", "bib", "bibtex", "txt", "tikz", "mtx", "rtex", "md",
    "asy", "lbx", "bbx", "cbx", "m", "lco", "dtx", "ins", "ist", "def", "clo", "ldf", "rmd", "lua",
    "gv", "mf", "yml", "yaml", "lhs", "mk", "xmpdata", "cfg", "rnw", "ltx", "inc",
];

/// Extensionless file names that are still editable.
const TEXT_FILENAMES: &[&str] = &["latexmkrc", ".latexmkrc", "makefile", "gnumakefile"];

// --- Handler Functions ---

pub async fn handle_init(args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let store = SnapshotStore::create(&path)
        .await
        .with_context(|| format!("Failed to create store at {}", path.display()))?;
    println!(
        "{} store {} at {}",
        style("Created").green().bold(),
        store.config().id,
        store.path().display()
    );
    Ok(())
}

pub async fn handle_import(args: ImportArgs, cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let project_id = ProjectId::from(args.project.as_str());

    if !args.force && store.contains(&project_id).await? {
        let overwrite = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Project '{project_id}' already exists. Overwrite it?"))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Import cancelled.");
            return Ok(());
        }
    }

    let text_extensions: Vec<String> = DEFAULT_TEXT_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .chain(args.text_extensions.iter().map(|ext| ext.trim().to_lowercase()))
        .filter(|ext| !ext.is_empty())
        .collect();

    let project = import_directory(
        &args.dir,
        project_id,
        &text_extensions,
        &store.config().root_doc_extensions,
    )
    .await?;
    store.save_project(&project).await?;

    let listing = get_all_entities_from_project(&project)?;
    println!(
        "{} {} docs and {} files into project {}",
        style("Imported").green().bold(),
        listing.docs.len(),
        listing.files.len(),
        style(&project.id).cyan()
    );
    match find_root_doc(&project)? {
        Some(root_doc) => println!("  Root doc: {}", root_doc.path.file_system),
        None => println!("  No root doc found"),
    }
    Ok(())
}

pub async fn handle_projects(cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    for project_id in store.list_projects().await? {
        println!("{project_id}");
    }
    Ok(())
}

pub async fn handle_tree(args: TreeArgs, cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let handler = ProjectEntityHandler::new(store.clone(), store);
    let project_id = ProjectId::from(args.project.as_str());

    let folders = handler.get_all_folders(&project_id).await?;
    let entities = handler.get_all_entities(&project_id).await?;

    let mut rows: Vec<(&str, EntityKind, &EntityId)> = folders
        .iter()
        .map(|folder| (folder.path.as_str(), EntityKind::Folder, &folder.id))
        .chain(
            entities
                .docs
                .iter()
                .map(|doc| (doc.path.as_str(), EntityKind::Doc, &doc.entity.id)),
        )
        .chain(
            entities
                .files
                .iter()
                .map(|file| (file.path.as_str(), EntityKind::File, &file.entity.id)),
        )
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    for (path, kind, id) in rows {
        let label = match kind {
            EntityKind::Folder => style(format!("{:<6}", kind.as_str())).blue(),
            EntityKind::Doc => style(format!("{:<6}", kind.as_str())).green(),
            EntityKind::File => style(format!("{:<6}", kind.as_str())).yellow(),
        };
        println!("{label} {path}  {}", style(id).dim());
    }
    Ok(())
}

pub async fn handle_find(args: FindArgs, cx: AppContext) -> Result<()> {
    let locator = ProjectLocator::new(cx.store()?);
    let project_id = ProjectId::from(args.project.as_str());
    let kind = EntityKind::from(args.kind);

    let found = locator
        .find_element(&project_id, &EntityId::from(args.element_id.as_str()), kind)
        .await
        .with_context(|| format!("No {kind} with id {} in project {project_id}", args.element_id))?;
    print_located(&found);
    Ok(())
}

pub async fn handle_resolve(args: ResolveArgs, cx: AppContext) -> Result<()> {
    let locator = ProjectLocator::new(cx.store()?);
    let project_id = ProjectId::from(args.project.as_str());

    let found = locator
        .find_element_by_path(&project_id, &args.path, args.exact_case)
        .await
        .with_context(|| format!("Nothing at {} in project {project_id}", args.path))?;
    print_located(&found);
    Ok(())
}

pub async fn handle_root_doc(args: RootDocArgs, cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let locator = ProjectLocator::new(store.clone());
    let project_id = ProjectId::from(args.project.as_str());

    if !args.detect {
        match locator.find_root_doc(&project_id).await? {
            Some(found) => print_located(&found),
            None => println!("Project {project_id} has no root doc"),
        }
        return Ok(());
    }

    let extensions = store.config().root_doc_extensions.clone();
    let handler = ProjectEntityHandler::new(store.clone(), store);
    let detector = RootDocDetector::new(handler, extensions);
    match detector.detect(&project_id).await? {
        Some(doc_id) => {
            let found = locator.find_element(&project_id, &doc_id, EntityKind::Doc).await?;
            println!("{}", style("Detected root doc").green().bold());
            print_located(&found);
        }
        None => println!("No doc in project {project_id} qualifies as root doc"),
    }
    Ok(())
}

pub async fn handle_check(args: CheckArgs) -> Result<()> {
    let path = args.path.as_str();
    let verdict = |ok: bool| if ok { style("ok").green() } else { style("rejected").red() };

    println!("clean path:     {}", verdict(safe_path::is_clean_path(path)));
    println!(
        "allowed length: {} ({} of {} characters)",
        verdict(safe_path::is_allowed_length(path)),
        path.chars().count(),
        safe_path::MAX_PATH_LENGTH
    );

    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    for segment in &segments {
        let mut notes = Vec::new();
        if !safe_path::is_clean_filename(segment) {
            notes.push("unclean");
        }
        if safe_path::is_blocked_filename(segment.trim()) {
            notes.push("blocked");
        }
        if notes.is_empty() {
            println!("  {segment:?}: {}", verdict(true));
        } else {
            println!(
                "  {segment:?}: {} -> {:?}",
                style(notes.join(", ")).red(),
                safe_path::clean(segment)
            );
        }
    }

    let cleaned: Vec<String> = segments.iter().map(|segment| safe_path::clean(segment)).collect();
    println!("cleaned:        /{}", cleaned.join("/"));
    Ok(())
}

fn print_located(found: &LocatedEntity) {
    println!(
        "{} {} ({})",
        style(found.kind()).bold(),
        found.element.name().unwrap_or("<unnamed>"),
        found.element.id()
    );
    println!("  fileSystem: {}", found.path.file_system);
    println!("  mongo:      {}", found.path.mongo);
    if let Some(folder) = &found.folder {
        println!("  folder:     {} ({})", folder.name.as_deref().unwrap_or("<unnamed>"), folder.id);
    }
}

// --- Import ---

fn is_text_file(name: &str, text_extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    if TEXT_FILENAMES.contains(&lower.as_str()) {
        return true;
    }
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            text_extensions.iter().any(|known| known.eq_ignore_ascii_case(ext))
        }
        _ => false,
    }
}

/// Project path of a file below the imported directory, each segment cleaned.
fn project_path(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .map(|component| safe_path::clean(&component.as_os_str().to_string_lossy()))
        .collect();
    format!("/{}", segments.join("/"))
}

/// Builds a project from the files under `dir`.
///
/// Hidden entries are skipped. Text files that decode as UTF-8 become docs,
/// everything else a file ref carrying the SHA-256 of its content. The root
/// doc is picked from the files on disk.
pub async fn import_directory(
    dir: &Path,
    project_id: ProjectId,
    text_extensions: &[String],
    root_doc_extensions: &[String],
) -> Result<Project> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let mut docs = Vec::new();
    let mut files = Vec::new();
    let mut doc_ids: HashMap<String, EntityId> = HashMap::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative: PathBuf = entry.path().strip_prefix(dir)?.to_path_buf();
        let path = project_path(&relative);
        if !safe_path::is_allowed_length(&path) {
            warn!(path = %path, "Skipping file with a path that is too long");
            continue;
        }
        let name = path.rsplit('/').next().unwrap_or_default().to_string();

        let bytes = tokio::fs::read(entry.path())
            .await
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        if is_text_file(&name, text_extensions) {
            if let Ok(text) = String::from_utf8(bytes.clone()) {
                let id = EntityId::generate();
                debug!(path = %path, %id, "Importing doc");
                doc_ids.insert(path.clone(), id.clone());
                docs.push(DocUpload::new(path, Doc::new(id, name).with_lines(text.lines())));
                continue;
            }
            info!(path = %path, "Not valid UTF-8, importing as file");
        }
        let hash = format!("{:x}", Sha256::digest(&bytes));
        debug!(path = %path, hash = %hash, "Importing file");
        files.push(FileUpload::new(path, FileRef::new(EntityId::generate(), name).with_hash(hash)));
    }

    let root = FolderStructureBuilder::build(docs, files)?;
    let mut project = Project::new(project_id, root);
    project.name = dir
        .canonicalize()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()));

    if let Some(root_doc) = find_root_doc_file_in_directory(dir, root_doc_extensions).await? {
        let path = project_path(Path::new(&root_doc.path));
        match doc_ids.get(&path) {
            Some(id) => project.root_doc_id = Some(id.clone()),
            None => warn!(path = %path, "Root doc candidate was not imported as a doc"),
        }
    }
    Ok(project)
}
