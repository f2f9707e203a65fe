use anyhow::Result;

use crate::config::Config;
use crate::index::db::SymbolRecord;
use crate::index::SymbolKind;
use crate::indexer::IndexCoordinator;
use crate::query::engine::QueryEngine;

fn engine_for(root: &str) -> Result<QueryEngine> {
    let config = Config::from_project_dir(root);
    let coordinator = IndexCoordinator::new(root, config)?;
    Ok(QueryEngine::new(coordinator.db().clone()))
}

/// Run one query against a workspace index and print the results.
pub async fn query_index(query_type: String, target: String, root: String) -> Result<()> {
    let engine = engine_for(&root)?;

    match query_type.as_str() {
        "search" => {
            let results = engine.search_symbols(&target, None, None, 25);
            print_symbols(&format!("symbols matching '{}'", target), &results);
        }
        "references" => {
            let results = engine.find_references(&target, None);
            print_symbols(&format!("declarations of '{}'", target), &results);
        }
        "dependencies" => {
            let targets = engine.get_dependencies(&target);
            print_strings(&format!("dependencies of '{}'", target), &targets);
        }
        "dependents" => {
            let files = engine.get_dependents(&target);
            print_strings(&format!("dependents of '{}'", target), &files);
        }
        "symbols" => {
            let results = engine.get_file_symbols(&target);
            print_symbols(&format!("symbols in '{}'", target), &results);
        }
        other => {
            anyhow::bail!(
                "unknown query type '{}' (expected search, references, dependencies, dependents, symbols)",
                other
            );
        }
    }

    Ok(())
}

/// Print the symbol enclosing a file location.
pub async fn symbol_at(file: String, line: u32, root: String) -> Result<()> {
    let engine = engine_for(&root)?;

    match engine.get_symbol_at_location(&file, line) {
        Some(symbol) => {
            println!(
                "{}:{}-{} {} ({}){}",
                symbol.file,
                symbol.line_start,
                symbol.line_end,
                symbol.name,
                symbol.kind.as_str(),
                symbol
                    .parent
                    .as_deref()
                    .map(|p| format!(" in {}", p))
                    .unwrap_or_default()
            );
        }
        None => println!("No symbol contains {}:{}", file, line),
    }

    Ok(())
}

/// Search with optional kind and language filters.
pub async fn search(
    query: String,
    kind: Option<String>,
    language: Option<String>,
    limit: usize,
    root: String,
) -> Result<()> {
    let engine = engine_for(&root)?;

    let kind = match kind {
        Some(k) => Some(SymbolKind::parse(&k).map_err(|e| anyhow::anyhow!(e.to_string()))?),
        None => None,
    };
    let results = engine.search_symbols(&query, kind, language.as_deref(), limit);
    print_symbols(&format!("symbols matching '{}'", query), &results);

    Ok(())
}

fn print_symbols(label: &str, results: &[SymbolRecord]) {
    if results.is_empty() {
        println!("No {}", label);
        return;
    }
    println!("Found {} {}:", results.len(), label);
    for symbol in results {
        println!(
            "  {}:{} - {} ({})",
            symbol.file,
            symbol.line_start,
            symbol.name,
            symbol.kind.as_str()
        );
    }
}

fn print_strings(label: &str, items: &[String]) {
    if items.is_empty() {
        println!("No {}", label);
        return;
    }
    println!("Found {} {}:", items.len(), label);
    for item in items {
        println!("  {}", item);
    }
}
