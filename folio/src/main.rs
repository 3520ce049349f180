use anyhow::Result;
use clap::Parser;
use folio::cli::{Cli, Commands};
use folio::{commands, AppContext};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise the level follows `-q` and `-v`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let store = cli.store;
    match cli.command {
        Commands::Init(args) => commands::handle_init(args).await?,
        Commands::Check(args) => commands::handle_check(args).await?,
        Commands::Import(args) => {
            commands::handle_import(args, AppContext::new(store).await).await?
        }
        Commands::Projects => commands::handle_projects(AppContext::new(store).await).await?,
        Commands::Tree(args) => commands::handle_tree(args, AppContext::new(store).await).await?,
        Commands::Find(args) => commands::handle_find(args, AppContext::new(store).await).await?,
        Commands::Resolve(args) => {
            commands::handle_resolve(args, AppContext::new(store).await).await?
        }
        Commands::RootDoc(args) => {
            commands::handle_root_doc(args, AppContext::new(store).await).await?
        }
    }

    Ok(())
}
