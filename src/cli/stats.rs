use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::indexer::IndexCoordinator;

/// Show aggregate index state for a workspace.
pub async fn show_stats(root: String) -> Result<()> {
    let config = Config::from_project_dir(&root);
    let coordinator = IndexCoordinator::new(&root, config)?;

    let status = coordinator.status()?;

    println!("Index status for {}", root);
    println!("  Files: {}", status.file_count);
    println!("  Symbols: {}", status.symbol_count);
    match status.last_indexed {
        Some(ts) => match Utc.timestamp_opt(ts, 0).single() {
            Some(when) => println!("  Last indexed: {}", when.to_rfc3339()),
            None => println!("  Last indexed: {}", ts),
        },
        None => println!("  Last indexed: never"),
    }
    println!(
        "  Run in progress: {}",
        if status.indexing_in_progress { "yes" } else { "no" }
    );

    Ok(())
}

/// Delete the whole index for a workspace.
pub async fn clear_index(root: String) -> Result<()> {
    let config = Config::from_project_dir(&root);
    let coordinator = IndexCoordinator::new(&root, config)?;

    coordinator.clear_index()?;
    println!("Index cleared for {}", root);

    Ok(())
}
