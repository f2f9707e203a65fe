use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod api;
mod cli;
mod config;
mod error;
mod index;
mod indexer;
mod parsers;
mod query;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(version)]
#[command(about = "Persistent symbol index for interactive code tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a workspace
    Index {
        /// Workspace root to index
        #[arg(default_value = ".")]
        root: String,

        /// Reprocess every file regardless of change detection
        #[arg(short, long)]
        force: bool,

        /// Suppress the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Search symbols by name substring
    Search {
        /// Name substring to look for
        query: String,

        /// Filter by symbol kind: function, class, method
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by language tag
        #[arg(short, long)]
        language: Option<String>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 25)]
        limit: usize,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: String,
    },

    /// Query the index
    Query {
        /// Query type: search, references, dependencies, dependents, symbols
        query_type: String,

        /// Target symbol, file, or module
        target: String,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: String,
    },

    /// Show the symbol enclosing a file location
    At {
        /// File path relative to the workspace root
        file: String,

        /// 1-based line number
        line: u32,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: String,
    },

    /// Show index statistics
    Stats {
        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: String,
    },

    /// Delete the index
    Clear {
        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: String,
    },
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.verbose);

    info!("symdex v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Index { root, force, quiet } => {
            cli::index::index_workspace(root, force, quiet).await?;
        }

        Commands::Search {
            query,
            kind,
            language,
            limit,
            root,
        } => {
            cli::query::search(query, kind, language, limit, root).await?;
        }

        Commands::Query {
            query_type,
            target,
            root,
        } => {
            cli::query::query_index(query_type, target, root).await?;
        }

        Commands::At { file, line, root } => {
            cli::query::symbol_at(file, line, root).await?;
        }

        Commands::Stats { root } => {
            cli::stats::show_stats(root).await?;
        }

        Commands::Clear { root } => {
            cli::stats::clear_index(root).await?;
        }
    }

    Ok(())
}
