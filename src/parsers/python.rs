// Python parser using tree-sitter

use tree_sitter::{Node, Parser as TreeParser, Tree};

use super::ParseOutcome;
use crate::error::{Error, Result};
use crate::index::{Symbol, SymbolKind};

/// Parse Python source into top-level functions, classes, methods nested in
/// classes, and import targets.
pub fn parse(content: &str, path: &str) -> Result<ParseOutcome> {
    let tree = parse_tree(content).map_err(|reason| Error::parse(path, reason))?;
    let lines: Vec<&str> = content.lines().collect();
    let mut out = ParseOutcome::default();

    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        collect_top_level(child, content, &lines, &mut out);
    }

    Ok(out)
}

fn parse_tree(content: &str) -> std::result::Result<Tree, String> {
    let mut parser = TreeParser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| e.to_string())?;
    parser
        .parse(content, None)
        .ok_or_else(|| "tree-sitter produced no tree".to_string())
}

fn collect_top_level(node: Node, content: &str, lines: &[&str], out: &mut ParseOutcome) {
    match node.kind() {
        "function_definition" => {
            if let Some(symbol) = extract_callable(node, content, lines, None) {
                out.symbols.push(symbol);
            }
        }
        "class_definition" => extract_class(node, content, lines, out),
        "import_statement" | "import_from_statement" => collect_imports(node, content, out),
        "decorated_definition" => {
            if let Some(inner) = node.child_by_field_name("definition") {
                collect_top_level(inner, content, lines, out);
            }
        }
        _ => {}
    }
}

/// Extract a function or, when `parent` is set, a method.
fn extract_callable(
    node: Node,
    content: &str,
    lines: &[&str],
    parent: Option<&str>,
) -> Option<Symbol> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, content)?.to_string();

    let params = node
        .child_by_field_name("parameters")
        .and_then(|p| node_text(p, content))
        .unwrap_or("()");
    let signature = format!("def {}{}", name, params);

    let (line_start, line_end, col_start, col_end) = node_range(node, lines);
    let doc = docstring(node, content);

    Some(Symbol {
        name,
        kind: if parent.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        },
        line_start,
        line_end,
        col_start,
        col_end,
        signature: Some(signature),
        doc,
        parent: parent.map(str::to_string),
        snippet: snippet(lines, line_start, line_end),
    })
}

fn extract_class(node: Node, content: &str, lines: &[&str], out: &mut ParseOutcome) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let Some(class_name) = node_text(name_node, content).map(str::to_string) else {
        return;
    };

    let (line_start, line_end, col_start, col_end) = node_range(node, lines);

    out.symbols.push(Symbol {
        name: class_name.clone(),
        kind: SymbolKind::Class,
        line_start,
        line_end,
        col_start,
        col_end,
        signature: None,
        doc: docstring(node, content),
        parent: None,
        snippet: snippet(lines, line_start, line_end),
    });

    // Methods are function definitions directly inside the class body
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        let definition = if child.kind() == "decorated_definition" {
            child.child_by_field_name("definition")
        } else {
            Some(child)
        };
        if let Some(def) = definition {
            if def.kind() == "function_definition" {
                if let Some(symbol) = extract_callable(def, content, lines, Some(&class_name)) {
                    out.symbols.push(symbol);
                }
            }
        }
    }
}

/// Record both `import x` and `from x import y` targets.
fn collect_imports(node: Node, content: &str, out: &mut ParseOutcome) {
    if node.kind() == "import_statement" {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let target = match child.kind() {
                "dotted_name" => node_text(child, content),
                "aliased_import" => child
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, content)),
                _ => None,
            };
            if let Some(target) = target {
                out.imports.push(target.to_string());
            }
        }
    } else if let Some(module) = node.child_by_field_name("module_name") {
        if let Some(target) = node_text(module, content) {
            out.imports.push(target.to_string());
        }
    }
}

/// 1-based inclusive line range plus best-effort columns for a node.
///
/// Tree end positions are used as-is; when the tree is error-recovered the
/// end can stop short of the real block, so the indentation boundary scan
/// extends it.
fn node_range(node: Node, lines: &[&str]) -> (u32, u32, u32, u32) {
    let start_row = node.start_position().row;
    let line_start = start_row as u32 + 1;
    let mut line_end = (node.end_position().row as u32 + 1).max(line_start);

    if node.has_error() {
        let indent = lines
            .get(start_row)
            .map(|l| indent_of(l))
            .unwrap_or_default();
        line_end = line_end.max(indentation_end(lines, start_row, indent));
    }

    (
        line_start,
        line_end,
        node.start_position().column as u32,
        node.end_position().column as u32,
    )
}

/// Scan forward until a nonblank line at or below the declaration's indent
/// level, or end of file. Blank and comment tails may be over- or
/// under-counted; callers treat the result as approximate.
fn indentation_end(lines: &[&str], start_row: usize, indent: usize) -> u32 {
    let mut last = start_row;
    for (row, line) in lines.iter().enumerate().skip(start_row + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= indent {
            break;
        }
        last = row;
    }
    last as u32 + 1
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Leading docstring of a function or class body, quotes stripped.
fn docstring(node: Node, content: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = node_text(string, content)?;
    Some(clean_doc(raw))
}

fn clean_doc(raw: &str) -> String {
    let stripped = raw
        .trim_start_matches(|c| c == 'r' || c == 'b' || c == 'u' || c == 'f')
        .trim_matches(|c| c == '"' || c == '\'');
    stripped.trim().to_string()
}

fn node_text<'a>(node: Node, content: &'a str) -> Option<&'a str> {
    content.get(node.byte_range())
}

fn snippet(lines: &[&str], line_start: u32, line_end: u32) -> String {
    let start = (line_start as usize).saturating_sub(1);
    let end = (line_end as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os
from collections import defaultdict

def add(x, y):
    """Add two numbers."""
    return x + y

class Calculator:
    """Simple accumulator."""

    def multiply(self, a, b):
        return a * b

    def divide(self, a, b):
        return a / b
"#;

    #[test]
    fn test_extracts_functions_classes_methods() {
        let out = parse(SAMPLE, "calc.py").unwrap();

        let names: Vec<&str> = out.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["add", "Calculator", "multiply", "divide"]);

        let add = &out.symbols[0];
        assert_eq!(add.kind, SymbolKind::Function);
        assert_eq!(add.line_start, 4);
        assert_eq!(add.line_end, 6);
        assert_eq!(add.signature.as_deref(), Some("def add(x, y)"));
        assert_eq!(add.doc.as_deref(), Some("Add two numbers."));
        assert!(add.parent.is_none());

        let class = &out.symbols[1];
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.line_start, 8);
        assert_eq!(class.line_end, 15);
        assert_eq!(class.doc.as_deref(), Some("Simple accumulator."));

        let multiply = &out.symbols[2];
        assert_eq!(multiply.kind, SymbolKind::Method);
        assert_eq!(multiply.parent.as_deref(), Some("Calculator"));
        assert_eq!(multiply.line_start, 11);
        assert_eq!(multiply.line_end, 12);
    }

    #[test]
    fn test_extracts_both_import_forms() {
        let out = parse(SAMPLE, "calc.py").unwrap();
        assert_eq!(out.imports, vec!["os", "collections"]);
    }

    #[test]
    fn test_aliased_and_dotted_imports() {
        let out = parse("import os.path as p\nimport sys, json\n", "x.py").unwrap();
        assert!(out.imports.contains(&"os.path".to_string()));
        assert!(out.imports.contains(&"sys".to_string()));
        assert!(out.imports.contains(&"json".to_string()));
    }

    #[test]
    fn test_decorated_function() {
        let src = "@cached\ndef memoized(key):\n    return key\n";
        let out = parse(src, "m.py").unwrap();
        assert_eq!(out.symbols.len(), 1);
        assert_eq!(out.symbols[0].name, "memoized");
        assert_eq!(out.symbols[0].line_start, 2);
    }

    #[test]
    fn test_two_line_function_scenario() {
        let out = parse("def add(x, y):\n    return x + y\n", "a.py").unwrap();
        assert_eq!(out.symbols.len(), 1);
        let add = &out.symbols[0];
        assert_eq!(add.name, "add");
        assert_eq!((add.line_start, add.line_end), (1, 2));
    }

    #[test]
    fn test_indentation_end_boundary() {
        let lines: Vec<&str> = vec![
            "def f():",      // row 0
            "    a = 1",     // row 1
            "",              // row 2
            "    return a",  // row 3
            "x = 2",         // row 4
        ];
        assert_eq!(indentation_end(&lines, 0, 0), 4);

        // Runs to end of file when nothing dedents
        let lines: Vec<&str> = vec!["def g():", "    pass"];
        assert_eq!(indentation_end(&lines, 0, 0), 2);
    }

    #[test]
    fn test_snippet_covers_symbol_lines() {
        let out = parse(SAMPLE, "calc.py").unwrap();
        let add = &out.symbols[0];
        assert!(add.snippet.starts_with("def add(x, y):"));
        assert!(add.snippet.ends_with("return x + y"));
    }
}
