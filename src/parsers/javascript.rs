// Pattern-based parser for JavaScript and TypeScript
//
// Regex scans degrade to empty matches on malformed input, so this path
// never errors. Brace counting can be fooled by braces inside strings or
// comments; symbol ends are approximate.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ParseOutcome;
use crate::index::{Symbol, SymbolKind};

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*import\s+(?:[\w$*{},\s]+?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap()
});

static REQUIRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .unwrap()
});

static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(([^)]*)",
    )
    .unwrap()
});

static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)[^=]*=\s*(?:async\s+)?\(([^)]*)\)")
        .unwrap()
});

/// Scan source line by line for imports, classes, functions, and arrow
/// function bindings.
pub fn parse(content: &str) -> ParseOutcome {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = ParseOutcome::default();

    for (row, line) in lines.iter().enumerate() {
        if let Some(caps) = IMPORT_RE.captures(line) {
            out.imports.push(caps[1].to_string());
        }
        for caps in REQUIRE_RE.captures_iter(line) {
            out.imports.push(caps[1].to_string());
        }

        if let Some(caps) = CLASS_RE.captures(line) {
            out.symbols
                .push(make_symbol(&lines, row, &caps[1], SymbolKind::Class, None));
        } else if let Some(caps) = FUNCTION_RE.captures(line) {
            let signature = format!("function {}({})", &caps[1], caps[2].trim());
            out.symbols.push(make_symbol(
                &lines,
                row,
                &caps[1],
                SymbolKind::Function,
                Some(signature),
            ));
        } else if let Some(caps) = ARROW_RE.captures(line) {
            if line.contains("=>") {
                let signature = format!("const {} = ({}) =>", &caps[1], caps[2].trim());
                out.symbols.push(make_symbol(
                    &lines,
                    row,
                    &caps[1],
                    SymbolKind::Function,
                    Some(signature),
                ));
            }
        }
    }

    out
}

fn make_symbol(
    lines: &[&str],
    row: usize,
    name: &str,
    kind: SymbolKind,
    signature: Option<String>,
) -> Symbol {
    let end_row = block_end(lines, row);
    let line = lines[row];
    Symbol {
        name: name.to_string(),
        kind,
        line_start: row as u32 + 1,
        line_end: end_row as u32 + 1,
        col_start: (line.len() - line.trim_start().len()) as u32,
        col_end: lines[end_row].trim_end().len() as u32,
        signature,
        doc: None,
        parent: None,
        snippet: lines[row..=end_row].join("\n"),
    }
}

/// Count braces from the first `{` at or after the declaration row. When no
/// brace ever opens, fall back to the first statement terminator.
fn block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i32 = 0;
    let mut opened = false;

    for (row, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if opened => {
                    depth -= 1;
                    if depth == 0 {
                        return row;
                    }
                }
                _ => {}
            }
        }
        if !opened && line.trim_end().ends_with(';') {
            return row;
        }
    }

    if opened {
        lines.len().saturating_sub(1)
    } else {
        start
    }
}
