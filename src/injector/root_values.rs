//! Root-level deep merge of new values.
//!
//! `newValues` fragments are merged into the root of the values file (inside
//! the wrapper, if any) whether or not any template references them. Only the
//! merged key's own line range is re-serialized; the rest of the file is left
//! as written.

use super::catalog::InjectionBlock;
use super::parser::{Document, Node, render_entry};
use super::subtree::{insert_section, key_extent, parse_subtree, replace_range};
use super::values::Wrapper;
use crate::config::InjectionConfig;

/// Result of merging new values into a document.
#[derive(Debug, Clone, Default)]
pub struct RootValuesReport {
    pub content: String,
    pub changed: bool,
    /// Keys that were merged into an existing section
    pub merged: Vec<String>,
    /// Keys appended as new sections
    pub added: Vec<String>,
}

/// Recursively merge `incoming` into `base`.
///
/// Mappings merge key by key; for anything else the incoming value wins and
/// lists are replaced whole.
pub fn deep_merge(base: Node, incoming: Node) -> Node {
    match (base, incoming) {
        (Node::Mapping(mut base), Node::Mapping(incoming)) => {
            for (key, value) in incoming {
                match base.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::replace(existing, Node::null());
                        *existing = deep_merge(current, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Node::Mapping(base)
        }
        (_, incoming) => incoming,
    }
}

/// Line range `[start, end)` of a root key, respecting the wrapper offset.
pub fn find_root_key(doc: &Document, key: &str, wrapper: &Wrapper) -> Option<(usize, usize)> {
    let lines = doc.lines();
    let start = lines.iter().enumerate().position(|(idx, line)| {
        !wrapper.is_marker(idx)
            && line.is_content()
            && !line.list_item
            && line.indent == wrapper.offset
            && line.key() == Some(key)
    })?;
    Some((start, key_extent(lines, start)))
}

/// Deep-merge every block into the root of `content`.
pub fn inject_root_values(
    content: &str,
    blocks: &[&InjectionBlock],
    config: &InjectionConfig,
) -> RootValuesReport {
    let mut doc = Document::parse(content);
    let mut report = RootValuesReport::default();

    for block in blocks {
        let wrapper = Wrapper::detect(&doc, config);
        match find_root_key(&doc, &block.key, &wrapper) {
            Some((start, end)) => {
                let Some(existing) = parse_subtree(&doc.lines()[start..end]) else {
                    log::warn!(
                        "Existing '{}' in values could not be parsed, leaving it unchanged",
                        block.key
                    );
                    continue;
                };
                let current = existing.get(&block.key).cloned().unwrap_or_else(Node::null);
                let merged = deep_merge(current, block.value.clone());
                let replacement = render_entry(&block.key, &merged, wrapper.offset);
                doc = replace_range(&doc, start, end, replacement);
                report.merged.push(block.key.clone());
            }
            None => {
                let section = render_entry(&block.key, &block.value, wrapper.offset);
                let at = wrapper.region_end(&doc);
                doc = insert_section(&doc, at, section);
                report.added.push(block.key.clone());
            }
        }
    }

    report.content = doc.render();
    report.changed = report.content != content;
    if report.changed {
        log::info!(
            "Merged new values into root: {}",
            report
                .merged
                .iter()
                .chain(report.added.iter())
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    report
}
