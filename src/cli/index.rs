use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::Config;
use crate::indexer::{IndexCoordinator, IndexOptions, ProgressFn, PROGRESS_DONE};

pub async fn index_workspace(root: String, force: bool, quiet: bool) -> Result<()> {
    info!("Indexing workspace: {}", root);

    let config = Config::from_project_dir(&root);
    let coordinator = IndexCoordinator::new(&root, config)?;

    println!("symdex indexer v{}", env!("CARGO_PKG_VERSION"));
    println!("Workspace: {}", root);
    println!("Force: {}", force);

    let estimate = coordinator.estimate_files();
    println!("Estimated files: {}", estimate);

    let progress = if quiet {
        None
    } else {
        let bar = ProgressBar::new(estimate as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let callback: ProgressFn = Arc::new(move |processed, total, current| {
            bar.set_length(total as u64);
            bar.set_position(processed as u64);
            if current == PROGRESS_DONE {
                bar.finish_with_message("done");
            } else {
                bar.set_message(current.to_string());
            }
        });
        Some(callback)
    };

    let opts = IndexOptions {
        force,
        ..Default::default()
    };
    let outcome = coordinator.index_workspace(opts, progress).await?;

    println!("\nIndexing complete!");
    println!("Files seen: {}", outcome.files_seen);
    println!("Files indexed: {}", outcome.files_indexed);
    println!("Files unchanged: {}", outcome.files_unchanged);
    println!("Files failed: {}", outcome.files_failed);
    println!("Symbols: {}", outcome.symbols_indexed);
    println!("Duration: {}ms", outcome.duration_ms);

    Ok(())
}
