//! Helpers over runs of lines that belong to one key.

use super::parser::{Document, Line, LineWriter, Node};

/// Exclusive end of the subtree owned by the key at `start`.
///
/// Covers deeper-indented lines and sequence items at the key's own indent;
/// trailing blank and comment lines are left outside.
pub fn key_extent(lines: &[Line], start: usize) -> usize {
    let key_indent = lines[start].indent;
    let mut last = start;
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        if line.block_scalar {
            last = j;
            continue;
        }
        if line.blank_or_comment || line.is_directive() {
            continue;
        }
        if line.indent > key_indent || (line.list_item && line.indent == key_indent) {
            last = j;
            continue;
        }
        break;
    }
    last + 1
}

/// Parse the YAML content of a subtree, ignoring comments and template directives.
pub fn parse_subtree(lines: &[Line]) -> Option<Node> {
    let content: Vec<&Line> = lines
        .iter()
        .filter(|l| l.block_scalar || l.is_content())
        .collect();
    let min = content
        .iter()
        .filter(|l| !l.block_scalar)
        .map(|l| l.indent)
        .min()?;
    let text = content
        .iter()
        .map(|l| l.raw.get(min..).unwrap_or_else(|| l.raw.trim_start()))
        .collect::<Vec<_>>()
        .join("\n");
    match Node::parse(&text) {
        Ok(node) => Some(node),
        Err(e) => {
            log::debug!("Subtree did not parse as YAML: {}", e);
            None
        }
    }
}

/// Indentation of the first `- ` marker in a run of lines.
pub fn first_item_indent(lines: &[Line]) -> Option<usize> {
    lines
        .iter()
        .find(|l| l.list_item && !l.block_scalar)
        .map(|l| l.indent)
}

/// Insert a new section before line `at`, separated from preceding content by one blank line.
pub fn insert_section(doc: &Document, at: usize, section: Vec<String>) -> Document {
    let lines = doc.lines();
    let at = at.min(lines.len());
    let mut writer = LineWriter::for_document(doc);
    writer.copy_all(&lines[..at]);
    if !writer.is_empty() && !writer.ends_blank() {
        writer.emit("");
    }
    writer.emit_all(section);
    writer.copy_all(&lines[at..]);
    writer.finish(doc.trailing_newline() || doc.is_empty())
}

/// Replace lines `start..end` with `replacement`.
pub fn replace_range(doc: &Document, start: usize, end: usize, replacement: Vec<String>) -> Document {
    let lines = doc.lines();
    let mut writer = LineWriter::for_document(doc);
    writer.copy_all(&lines[..start]);
    writer.emit_all(replacement);
    writer.copy_all(&lines[end..]);
    writer.finish(doc.trailing_newline())
}
