use clap::{Args, Parser, Subcommand, ValueEnum};
use folio_core::project::EntityKind;
use std::path::PathBuf;

/// Folio: build, inspect and query project file trees.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Snapshot store to use instead of searching the current directory and its parents.
    #[arg(long, global = true, env = "FOLIO_STORE")]
    pub store: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new snapshot store.
    Init(InitArgs),
    /// Import a directory as a project snapshot.
    Import(ImportArgs),
    /// List the projects held in the store.
    Projects,
    /// List every folder, doc and file path of a project.
    Tree(TreeArgs),
    /// Locate an element by id.
    Find(FindArgs),
    /// Resolve a path to an element.
    Resolve(ResolveArgs),
    /// Show or detect the root doc of a project.
    RootDoc(RootDocArgs),
    /// Check a path against the safe path rules.
    Check(CheckArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to create the store in (defaults to the current directory).
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory holding the project files.
    pub dir: PathBuf,

    /// Id of the project snapshot to write.
    #[arg(long)]
    pub project: String,

    /// Overwrite an existing snapshot without asking.
    #[arg(long)]
    pub force: bool,

    /// Extra extensions (comma separated) to import as editable docs.
    #[arg(long, env = "FOLIO_ADDITIONAL_TEXT_EXTENSIONS", value_delimiter = ',')]
    pub text_extensions: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    pub project: String,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    pub project: String,

    pub element_id: String,

    /// Kind of element to look for.
    #[arg(long = "type", value_enum, default_value_t = KindArg::Doc)]
    pub kind: KindArg,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub project: String,

    /// Path of the element, e.g. /chapters/intro.tex.
    pub path: String,

    /// Compare path segments case-sensitively.
    #[arg(long)]
    pub exact_case: bool,
}

#[derive(Args, Debug)]
pub struct RootDocArgs {
    pub project: String,

    /// Detect the root doc from doc contents instead of reading the stored one.
    #[arg(long)]
    pub detect: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    pub path: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Doc,
    File,
    Folder,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Doc => EntityKind::Doc,
            KindArg::File => EntityKind::File,
            KindArg::Folder => EntityKind::Folder,
        }
    }
}
