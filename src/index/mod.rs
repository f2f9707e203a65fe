// Index storage and schema

pub mod db;
pub mod schema;

/// A declaration extracted from source text (function, class, method).
///
/// Lines are 1-based and inclusive, columns are 0-based best-effort.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub col_start: u32,
    pub col_end: u32,
    pub signature: Option<String>,
    pub doc: Option<String>,
    /// Enclosing class name for methods, None for top-level symbols.
    pub parent: Option<String>,
    pub snippet: String,
}

/// Symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "function" => Ok(SymbolKind::Function),
            "class" => Ok(SymbolKind::Class),
            "method" => Ok(SymbolKind::Method),
            _ => Err(crate::error::Error::internal(format!(
                "unknown symbol kind: {}",
                s
            ))),
        }
    }
}

/// Directed edge from a source file to a raw textual module reference.
///
/// The target is never resolved to a file row, so indexing order between
/// files can never matter for correctness.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dependency {
    pub target: String,
    pub kind: DependencyKind,
}

/// Dependency edge kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Import,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
        }
    }
}

/// One row per indexed file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    /// Path relative to the workspace root, forward slashes.
    pub path: String,
    pub language: String,
    pub size_bytes: u64,
    /// Source filesystem modification time, unix seconds.
    pub mtime: i64,
    /// blake3 hex digest of the file bytes.
    pub content_hash: String,
    pub last_indexed: i64,
}

/// Aggregate index state reported by `status`.
///
/// File and symbol counts are always re-derived from storage aggregates,
/// never trusted from in-memory counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStatus {
    pub last_indexed: Option<i64>,
    pub file_count: u64,
    pub symbol_count: u64,
    pub indexing_in_progress: bool,
}
