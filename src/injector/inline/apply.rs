//! Planning and applying injections into template scopes.

use super::scope::{Scope, anchor_point, find_child_key, scope_end};
use crate::config::InjectionConfig;
use crate::injector::catalog::{InjectionBlock, MergeKind, group_by_key};
use crate::injector::equivalence::{dedupe_items, missing_items};
use crate::injector::parser::template::nindent_of;
use crate::injector::parser::{Document, Line, LineWriter, Node, render_entry, render_items};
use crate::injector::subtree::{first_item_indent, parse_subtree};
use crate::injector::values::{MergeMode, merged_candidate};

/// Replace lines `start..end` with `lines`; an insertion has `start == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    lines: Vec<String>,
}

impl Edit {
    fn insert(at: usize, lines: Vec<String>) -> Self {
        Self {
            start: at,
            end: at,
            lines,
        }
    }
}

/// Inject `blocks` into every scope and return the new document plus injected keys.
pub(crate) fn inject_scopes(
    doc: &Document,
    scopes: &[Scope],
    blocks: &[&InjectionBlock],
    anchors: &[&str],
    mode: MergeMode,
    config: &InjectionConfig,
) -> (Document, Vec<String>) {
    let groups = group_by_key(blocks);
    let mut edits = Vec::new();
    let mut injected: Vec<String> = Vec::new();

    for scope in scopes {
        let (scope_edits, keys) = plan_scope(doc.lines(), scope, &groups, anchors, mode, config);
        edits.extend(scope_edits);
        for key in keys {
            if !injected.contains(&key) {
                injected.push(key);
            }
        }
    }

    (apply_edits(doc, edits), injected)
}

fn plan_scope(
    lines: &[Line],
    scope: &Scope,
    groups: &[(String, Vec<&InjectionBlock>)],
    anchors: &[&str],
    mode: MergeMode,
    config: &InjectionConfig,
) -> (Vec<Edit>, Vec<String>) {
    let mut edits = Vec::new();
    let mut fresh: Vec<String> = Vec::new();
    let mut keys = Vec::new();
    let pad = " ".repeat(scope.child_indent);

    for (key, group) in groups {
        let kind = MergeKind::infer(key, group, config);
        let found = find_child_key(lines, scope, key);

        match kind {
            MergeKind::List => {
                let candidates: Vec<Node> = group.iter().flat_map(|b| b.items()).collect();
                match found {
                    Some(m) if m.idx == scope.header => {}
                    Some(m) => {
                        if let Some(edit) = merge_existing_list(lines, m.idx, key, &candidates, config) {
                            edits.push(edit);
                            keys.push(key.clone());
                        }
                    }
                    None => {
                        fresh.push(format!("{}{}:", pad, key));
                        fresh.extend(render_items(
                            &dedupe_items(key, &candidates, config),
                            fresh_item_indent(key, scope.child_indent, config),
                        ));
                        keys.push(key.clone());
                    }
                }
            }
            MergeKind::NestedMap | MergeKind::Scalar => {
                let candidate = merged_candidate(group, kind);
                match found {
                    Some(m) if !m.conditional => {
                        if mode == MergeMode::Assert && m.idx != scope.header {
                            let line = &lines[m.idx];
                            let end = scope_end(lines, m.idx, line.indent, false);
                            edits.push(Edit {
                                start: m.idx,
                                end,
                                lines: render_entry(key, &candidate, line.indent),
                            });
                            keys.push(key.clone());
                        }
                    }
                    _ => {
                        fresh.extend(render_entry(key, &candidate, scope.child_indent));
                        keys.push(key.clone());
                    }
                }
            }
        }
    }

    if !fresh.is_empty() {
        edits.push(Edit::insert(anchor_point(lines, scope, anchors), fresh));
    }
    (edits, keys)
}

/// Append missing items under an existing list key, before any closing directive.
fn merge_existing_list(
    lines: &[Line],
    idx: usize,
    key: &str,
    candidates: &[Node],
    config: &InjectionConfig,
) -> Option<Edit> {
    let key_line = &lines[idx];
    let end = scope_end(lines, idx, key_line.indent, true);
    let subtree = &lines[idx + 1..end];
    let has_children = subtree.iter().any(|l| l.is_content());
    let fresh_indent = fresh_item_indent(key, key_line.indent, config);

    if !has_children && !key_line.value_str().is_empty() {
        if !key_line.has_empty_value() {
            log::debug!("'{}' has an inline template value, leaving it alone", key);
            return None;
        }
        let mut replacement = vec![format!("{}{}:", " ".repeat(key_line.indent), key)];
        replacement.extend(render_items(&dedupe_items(key, candidates, config), fresh_indent));
        return Some(Edit {
            start: idx,
            end: idx + 1,
            lines: replacement,
        });
    }

    let existing = match parse_subtree(subtree) {
        Some(Node::Sequence(items)) => items,
        None => Vec::new(),
        Some(_) => {
            log::warn!("Existing '{}' is not a list, leaving it unchanged", key);
            return None;
        }
    };
    let missing = missing_items(key, &existing, candidates, config);
    if missing.is_empty() {
        return None;
    }

    let indent = first_item_indent(subtree)
        .or_else(|| subtree.iter().filter(|l| l.is_directive()).find_map(nindent_of))
        .unwrap_or(fresh_indent);
    Some(Edit::insert(end, render_items(&missing, indent)))
}

fn fresh_item_indent(key: &str, key_indent: usize, config: &InjectionConfig) -> usize {
    if config.is_aligned_list(key) {
        key_indent
    } else {
        key_indent + 2
    }
}

fn apply_edits(doc: &Document, mut edits: Vec<Edit>) -> Document {
    if edits.is_empty() {
        return doc.clone();
    }
    edits.sort_by_key(|e| e.start);

    let lines = doc.lines();
    let mut writer = LineWriter::for_document(doc);
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            log::warn!("Skipping overlapping edit at line {}", edit.start + 1);
            continue;
        }
        writer.copy_all(&lines[cursor..edit.start]);
        writer.emit_all(edit.lines);
        cursor = edit.end;
    }
    writer.copy_all(&lines[cursor..]);
    writer.finish(doc.trailing_newline())
}
