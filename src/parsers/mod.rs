// Language parsers

pub mod javascript;
pub mod python;

use std::path::Path;

use crate::error::Result;
use crate::index::{Dependency, DependencyKind, Symbol};

/// Everything a parser extracts from one file.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub symbols: Vec<Symbol>,
    /// Raw textual module references, recorded as dependency edges.
    pub imports: Vec<String>,
}

impl ParseOutcome {
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.imports
            .iter()
            .map(|target| Dependency {
                target: target.clone(),
                kind: DependencyKind::Import,
            })
            .collect()
    }
}

/// Supported language families.
///
/// A closed set so dispatch and tests stay exhaustive. Files that map to
/// `Unsupported` parse to empty output instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Unsupported,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::from_extension(ext),
            None => Language::Unsupported,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Language::Python,
            "js" | "jsx" | "mjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            _ => Language::Unsupported,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Unsupported => "unknown",
        }
    }

    pub fn is_supported(self) -> bool {
        self != Language::Unsupported
    }

    /// Parse file content into symbols and import targets.
    pub fn parse(self, content: &str, path: &str) -> Result<ParseOutcome> {
        match self {
            Language::Python => python::parse(content, path),
            // TypeScript goes through the same pattern scan as JavaScript
            Language::JavaScript | Language::TypeScript => Ok(javascript::parse(content)),
            Language::Unsupported => Ok(ParseOutcome::default()),
        }
    }
}
