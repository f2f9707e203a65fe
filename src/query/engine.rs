// Read-only queries over the committed index
//
// Safe to call while a run is in flight; results reflect whatever has
// committed so far. Storage errors on reads are logged and turned into
// empty results.

use tracing::error;

use crate::index::db::{IndexDatabase, SymbolRecord};
use crate::index::SymbolKind;

/// Query engine
pub struct QueryEngine {
    db: IndexDatabase,
}

impl QueryEngine {
    pub fn new(db: IndexDatabase) -> Self {
        Self { db }
    }

    /// Substring search on symbol names with optional kind and language
    /// filters, ordered by name.
    pub fn search_symbols(
        &self,
        query: &str,
        kind: Option<SymbolKind>,
        language: Option<&str>,
        limit: usize,
    ) -> Vec<SymbolRecord> {
        self.db
            .search_symbols(query, kind, language, limit)
            .unwrap_or_else(|e| {
                error!(error = %e, query, "symbol search failed");
                Vec::new()
            })
    }

    /// Declarations matching a symbol name, optionally scoped to one file.
    pub fn find_references(&self, name: &str, file: Option<&str>) -> Vec<SymbolRecord> {
        self.db.declarations(name, file).unwrap_or_else(|e| {
            error!(error = %e, name, "reference lookup failed");
            Vec::new()
        })
    }

    /// Raw import targets recorded for a file.
    pub fn get_dependencies(&self, file: &str) -> Vec<String> {
        self.db.dependencies_of(file).unwrap_or_else(|e| {
            error!(error = %e, file, "dependency lookup failed");
            Vec::new()
        })
    }

    /// Files whose import targets contain the given module string.
    pub fn get_dependents(&self, module: &str) -> Vec<String> {
        self.db.dependents_of(module).unwrap_or_else(|e| {
            error!(error = %e, module, "dependent lookup failed");
            Vec::new()
        })
    }

    /// All symbols of a file, ordered by start line.
    pub fn get_file_symbols(&self, file: &str) -> Vec<SymbolRecord> {
        self.db.file_symbols(file).unwrap_or_else(|e| {
            error!(error = %e, file, "file symbol lookup failed");
            Vec::new()
        })
    }

    /// The smallest symbol whose line range contains the given line.
    pub fn get_symbol_at_location(&self, file: &str, line: u32) -> Option<SymbolRecord> {
        self.db.symbol_at(file, line).unwrap_or_else(|e| {
            error!(error = %e, file, line, "symbol-at-location lookup failed");
            None
        })
    }
}
