// Action dispatch for external callers
//
// Every operation returns a structured envelope instead of raising to the
// boundary; the transport layer wrapping this service decides how to
// present envelope errors.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::Error;
use crate::index::SymbolKind;
use crate::indexer::{IndexCoordinator, IndexOptions, ProgressFn};
use crate::query::engine::QueryEngine;

/// Request-handling facade over the coordinator and query engine.
pub struct IndexService {
    coordinator: Arc<IndexCoordinator>,
    query: QueryEngine,
}

impl IndexService {
    pub fn new(coordinator: Arc<IndexCoordinator>) -> Self {
        let query = QueryEngine::new(coordinator.db().clone());
        Self { coordinator, query }
    }

    /// Handle an action without progress delivery.
    pub async fn handle(&self, action: &str, params: &HashMap<String, Value>) -> Value {
        self.handle_with_progress(action, params, None).await
    }

    /// Handle an action. The progress callback is forwarded to indexing runs
    /// only when the request asks for it with `with_progress`.
    pub async fn handle_with_progress(
        &self,
        action: &str,
        params: &HashMap<String, Value>,
        progress: Option<ProgressFn>,
    ) -> Value {
        match action {
            "estimate_files" => json!({
                "status": "success",
                "file_count": self.coordinator.estimate_files(),
            }),

            "index" => {
                let opts = IndexOptions {
                    force: bool_param(params, "force"),
                    max_file_size: params.get("max_file_size").and_then(Value::as_u64),
                };
                let progress = if bool_param(params, "with_progress") {
                    progress
                } else {
                    None
                };
                match self.coordinator.index_workspace(opts, progress).await {
                    Ok(outcome) => json!({
                        "status": "success",
                        "files_seen": outcome.files_seen,
                        "files_indexed": outcome.files_indexed,
                        "files_unchanged": outcome.files_unchanged,
                        "files_failed": outcome.files_failed,
                        "symbols_indexed": outcome.symbols_indexed,
                        "duration_ms": outcome.duration_ms,
                    }),
                    Err(e) => error_envelope(&e),
                }
            }

            "search" => {
                let Some(query) = str_param(params, "query") else {
                    return missing_param("query");
                };
                let kind = match str_param(params, "symbol_type") {
                    Some(s) => match SymbolKind::parse(s) {
                        Ok(kind) => Some(kind),
                        Err(_) => {
                            return json!({
                                "status": "error",
                                "error": format!("unknown symbol type '{}'", s),
                            })
                        }
                    },
                    None => None,
                };
                let language = str_param(params, "language");
                let limit = params
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(25) as usize;

                let results = self.query.search_symbols(query, kind, language, limit);
                json!({ "status": "success", "results": results })
            }

            "find_references" => {
                let Some(name) = str_param(params, "symbol_name") else {
                    return missing_param("symbol_name");
                };
                let file = str_param(params, "file_path");
                let references = self.query.find_references(name, file);
                json!({ "status": "success", "references": references })
            }

            "get_dependencies" => {
                let Some(file) = str_param(params, "file_path") else {
                    return missing_param("file_path");
                };
                json!({
                    "status": "success",
                    "dependencies": self.query.get_dependencies(file),
                })
            }

            "get_dependents" => {
                let Some(module) = str_param(params, "module_name") else {
                    return missing_param("module_name");
                };
                json!({
                    "status": "success",
                    "dependents": self.query.get_dependents(module),
                })
            }

            "get_file_symbols" => {
                let Some(file) = str_param(params, "file_path") else {
                    return missing_param("file_path");
                };
                json!({
                    "status": "success",
                    "symbols": self.query.get_file_symbols(file),
                })
            }

            "get_symbol_by_location" => {
                let Some(file) = str_param(params, "file_path") else {
                    return missing_param("file_path");
                };
                let Some(line) = params.get("line").and_then(Value::as_u64) else {
                    return missing_param("line");
                };
                let symbol = self.query.get_symbol_at_location(file, line as u32);
                json!({ "status": "success", "symbol": symbol })
            }

            "clear_index" => match self.coordinator.clear_index() {
                Ok(()) => json!({ "status": "success", "cleared": true }),
                Err(e) => error_envelope(&e),
            },

            "status" => match self.coordinator.status() {
                Ok(status) => json!({
                    "status": "success",
                    "last_indexed": status.last_indexed,
                    "file_count": status.file_count,
                    "symbol_count": status.symbol_count,
                    "indexing_in_progress": status.indexing_in_progress,
                }),
                Err(e) => error_envelope(&e),
            },

            other => json!({
                "status": "error",
                "error": format!("unknown action '{}'", other),
            }),
        }
    }
}

fn str_param<'a>(params: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn bool_param(params: &HashMap<String, Value>, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn missing_param(name: &str) -> Value {
    json!({
        "status": "error",
        "error": format!("missing required parameter '{}'", name),
    })
}

fn error_envelope(e: &Error) -> Value {
    json!({ "status": "error", "error": e.to_string() })
}
