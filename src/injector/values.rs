//! Format-preserving values file patch engine.
//!
//! Walks a values document line by line, tracks the logical key path of every
//! line, and when a target path is found applies the merge policy of the
//! target's [`MergeKind`]. Everything outside the target subtree is copied
//! verbatim, so patching twice yields the same bytes as patching once.

use serde::{Deserialize, Serialize};

use super::catalog::{InjectionBlock, MergeKind};
use super::equivalence::{dedupe_items, missing_items};
use super::parser::{Document, Line, LineWriter, Node, PathStack, TargetReference};
use super::parser::{render_entry, render_items};
use super::root_values::deep_merge;
use super::subtree::{first_item_indent, insert_section, key_extent, parse_subtree};
use crate::config::InjectionConfig;

/// Whether an existing nested map blocks injection or is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Leave existing nested maps alone
    Preserve,
    /// Replace existing nested maps with the candidate
    Assert,
}

/// Virtual-root wrapper key detected at the top of a values file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wrapper {
    pub key: Option<String>,
    /// Line index of the wrapper key
    pub line: Option<usize>,
    /// Indentation of the wrapper's children
    pub offset: usize,
}

impl Wrapper {
    /// Detect a wrapper from the first zero-indent key of the document.
    pub fn detect(doc: &Document, config: &InjectionConfig) -> Self {
        let lines = doc.lines();
        let Some(idx) = lines
            .iter()
            .position(|l| l.is_content() && !l.block_scalar && l.indent == 0 && !l.list_item)
        else {
            return Self::default();
        };
        let Some(key) = lines[idx].key() else {
            return Self::default();
        };
        if !config.is_wrapper_key(key) {
            return Self::default();
        }

        let offset = lines[idx + 1..]
            .iter()
            .find(|l| l.is_content())
            .map(|l| l.indent)
            .filter(|&indent| indent > 0)
            .unwrap_or(2);

        log::debug!("Detected wrapper key '{}' with offset {}", key, offset);
        Self {
            key: Some(key.to_string()),
            line: Some(idx),
            offset,
        }
    }

    pub fn is_marker(&self, idx: usize) -> bool {
        self.line == Some(idx)
    }

    /// Indentation as seen by target paths.
    pub fn logical_indent(&self, indent: usize) -> usize {
        indent.saturating_sub(self.offset)
    }

    /// Line index where new root-level sections are appended.
    pub fn region_end(&self, doc: &Document) -> usize {
        match self.line {
            Some(idx) => key_extent(doc.lines(), idx),
            None => doc.len(),
        }
    }
}

/// Result of patching one target.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub document: Document,
    /// Output differs from input
    pub changed: bool,
    /// The target path exists in the output
    pub satisfied: bool,
}

/// A target path with the blocks that should land there.
#[derive(Debug, Clone)]
pub struct ValuesPatch<'a> {
    pub target: TargetReference,
    pub blocks: Vec<&'a InjectionBlock>,
}

/// Summary of patching a whole values file.
#[derive(Debug, Clone, Default)]
pub struct ValuesReport {
    pub content: String,
    pub changed: bool,
    /// Dotted paths that now hold the injected content
    pub satisfied: Vec<String>,
    /// Dotted paths that were not found and could not be created
    pub unresolved: Vec<String>,
}

/// Apply every patch in order to `content`.
pub fn patch_values(
    content: &str,
    patches: &[ValuesPatch<'_>],
    mode: MergeMode,
    config: &InjectionConfig,
) -> ValuesReport {
    let mut doc = Document::parse(content);
    let mut report = ValuesReport::default();

    for patch in patches {
        if patch.blocks.is_empty() {
            continue;
        }
        let wrapper = Wrapper::detect(&doc, config);
        let outcome = patch_target(&doc, &wrapper, &patch.target, &patch.blocks, mode, config);
        let dotted = patch.target.dotted();
        if outcome.changed {
            log::info!("Injected '{}' into values", dotted);
        }
        if outcome.satisfied {
            report.satisfied.push(dotted);
        } else {
            log::debug!("Target '{}' not present in values, skipping", dotted);
            report.unresolved.push(dotted);
        }
        doc = outcome.document;
    }

    report.content = doc.render();
    report.changed = report.content != content;
    report
}

/// Patch a single target path.
pub fn patch_target(
    doc: &Document,
    wrapper: &Wrapper,
    target: &TargetReference,
    blocks: &[&InjectionBlock],
    mode: MergeMode,
    config: &InjectionConfig,
) -> PatchOutcome {
    let lines = doc.lines();
    let kind = MergeKind::infer(&target.key, blocks, config);
    let mut writer = LineWriter::for_document(doc);
    let mut stack = PathStack::new();
    let mut satisfied = false;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if satisfied || !line.is_content() || line.block_scalar || wrapper.is_marker(i) {
            writer.copy(line);
            i += 1;
            continue;
        }

        let indent = wrapper.logical_indent(line.indent);
        if line.list_item {
            stack.push_list_item(indent);
            writer.copy(line);
            i += 1;
            continue;
        }
        let Some(key) = line.key() else {
            writer.copy(line);
            i += 1;
            continue;
        };

        stack.push(indent, key);
        if !stack.matches(&target.path) {
            writer.copy(line);
            i += 1;
            continue;
        }

        let end = key_extent(lines, i);
        log::debug!("Found '{}' at line {} ({:?})", target.dotted(), i + 1, kind);
        merge_into(&mut writer, &lines[i], &lines[i + 1..end], &target.key, kind, blocks, mode, config);
        satisfied = true;
        i = end;
    }

    if !satisfied && target.path.len() == 1 && !blocks.is_empty() {
        let section = render_new_key(&target.key, kind, blocks, wrapper.offset, config);
        let document = insert_section(doc, wrapper.region_end(doc), section);
        return PatchOutcome {
            changed: document.render() != doc.render(),
            document,
            satisfied: true,
        };
    }

    let document = writer.finish(doc.trailing_newline());
    PatchOutcome {
        changed: document.render() != doc.render(),
        document,
        satisfied,
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_into(
    writer: &mut LineWriter,
    line: &Line,
    subtree: &[Line],
    key: &str,
    kind: MergeKind,
    blocks: &[&InjectionBlock],
    mode: MergeMode,
    config: &InjectionConfig,
) {
    let has_children = subtree.iter().any(|l| l.is_content());
    let empty = !has_children && line.has_empty_value();
    let pad = " ".repeat(line.indent);

    match kind {
        MergeKind::Scalar => {
            if mode == MergeMode::Preserve && !empty {
                writer.copy(line);
                writer.copy_all(subtree);
                return;
            }
            let candidate = merged_candidate(blocks, kind);
            writer.emit_all(render_entry(key, &candidate, line.indent));
        }
        MergeKind::NestedMap => {
            if !empty && mode == MergeMode::Preserve {
                writer.copy(line);
                writer.copy_all(subtree);
                return;
            }
            let candidate = merged_candidate(blocks, kind);
            writer.emit_all(render_entry(key, &candidate, line.indent));
            if empty {
                writer.copy_all(subtree);
            }
        }
        MergeKind::List => {
            let candidates: Vec<Node> = blocks.iter().flat_map(|b| b.items()).collect();
            let fresh_indent = list_item_indent(key, line.indent, config);

            if empty {
                writer.emit(format!("{}{}:", pad, key));
                writer.emit_all(render_items(&dedupe_items(key, &candidates, config), fresh_indent));
                writer.copy_all(subtree);
            } else if has_children {
                writer.copy(line);
                writer.copy_all(subtree);
                match parse_subtree(subtree) {
                    Some(Node::Sequence(existing)) => {
                        let missing = missing_items(key, &existing, &candidates, config);
                        let indent = first_item_indent(subtree).unwrap_or(fresh_indent);
                        writer.emit_all(render_items(&missing, indent));
                    }
                    _ => log::warn!("Existing '{}' is not a list, leaving it unchanged", key),
                }
            } else {
                match Node::parse(line.value_str()) {
                    Ok(Node::Sequence(existing)) => {
                        let missing = missing_items(key, &existing, &candidates, config);
                        if missing.is_empty() {
                            writer.copy(line);
                        } else {
                            let mut items = existing;
                            items.extend(missing);
                            writer.emit(format!("{}{}:", pad, key));
                            writer.emit_all(render_items(&items, fresh_indent));
                        }
                    }
                    _ => {
                        log::warn!("Inline value of '{}' is not a list, leaving it unchanged", key);
                        writer.copy(line);
                    }
                }
            }
        }
    }
}

/// Indentation of `- ` markers for a freshly written list.
fn list_item_indent(key: &str, key_indent: usize, config: &InjectionConfig) -> usize {
    if config.is_aligned_list(key) {
        key_indent
    } else {
        key_indent + 2
    }
}

/// Combine candidate blocks: maps are deep-merged in order, scalars take the last one.
pub fn merged_candidate(blocks: &[&InjectionBlock], kind: MergeKind) -> Node {
    match kind {
        MergeKind::NestedMap => blocks
            .iter()
            .map(|b| b.value.clone())
            .reduce(deep_merge)
            .unwrap_or_else(Node::null),
        _ => blocks
            .last()
            .map(|b| b.value.clone())
            .unwrap_or_else(Node::null),
    }
}

/// Render a brand-new `key` section at `indent`.
pub fn render_new_key(
    key: &str,
    kind: MergeKind,
    blocks: &[&InjectionBlock],
    indent: usize,
    config: &InjectionConfig,
) -> Vec<String> {
    match kind {
        MergeKind::List => {
            let candidates: Vec<Node> = blocks.iter().flat_map(|b| b.items()).collect();
            let mut section = vec![format!("{}{}:", " ".repeat(indent), key)];
            section.extend(render_items(
                &dedupe_items(key, &candidates, config),
                list_item_indent(key, indent, config),
            ));
            section
        }
        _ => render_entry(key, &merged_candidate(blocks, kind), indent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::catalog::BlockCategory;

    fn block(key: &str, yaml: &str) -> InjectionBlock {
        InjectionBlock {
            category: BlockCategory::AllPods,
            key: key.to_string(),
            value: Node::parse(yaml).unwrap(),
        }
    }

    fn toleration() -> InjectionBlock {
        block(
            "tolerations",
            "- key: node-role.kubernetes.io/control-plane\n  operator: Exists\n  effect: NoSchedule",
        )
    }

    fn patch(content: &str, path: &str, blocks: &[InjectionBlock], mode: MergeMode) -> PatchOutcome {
        let config = InjectionConfig::default();
        let doc = Document::parse(content);
        let wrapper = Wrapper::detect(&doc, &config);
        let target = TargetReference::from_dotted(path).unwrap();
        let refs: Vec<&InjectionBlock> = blocks.iter().collect();
        patch_target(&doc, &wrapper, &target, &refs, mode, &config)
    }

    #[test]
    fn test_empty_flow_list_gets_aligned_items() {
        let content = "replicaCount: 1\ntolerations: []\nnodeSelector: {}\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert!(out.changed);
        assert!(out.satisfied);
        assert_eq!(
            out.document.render(),
            "replicaCount: 1\ntolerations:\n- key: node-role.kubernetes.io/control-plane\n  operator: Exists\n  effect: NoSchedule\nnodeSelector: {}\n"
        );
    }

    #[test]
    fn test_identical_toleration_is_not_duplicated() {
        let content = "tolerations:\n  - key: node-role.kubernetes.io/control-plane\n    operator: Exists\n    effect: NoSchedule\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert!(!out.changed);
        assert!(out.satisfied);
        assert_eq!(out.document.render(), content);
    }

    #[test]
    fn test_new_toleration_appended_at_existing_indent() {
        let content = "# comment\ntolerations:\n  - key: other\n    operator: Exists\n\nimage: x\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert!(out.changed);
        assert_eq!(
            out.document.render(),
            "# comment\ntolerations:\n  - key: other\n    operator: Exists\n  - key: node-role.kubernetes.io/control-plane\n    operator: Exists\n    effect: NoSchedule\n\nimage: x\n"
        );
    }

    #[test]
    fn test_nested_target_path() {
        let content = "webhook:\n  enabled: true\n  tolerations: []\ncontroller:\n  tolerations: []\n";
        let out = patch(content, "webhook.tolerations", &[toleration()], MergeMode::Assert);
        let rendered = out.document.render();
        assert!(rendered.starts_with("webhook:\n  enabled: true\n  tolerations:\n  - key: node-role"));
        assert!(rendered.ends_with("controller:\n  tolerations: []\n"));
    }

    #[test]
    fn test_wrapper_offsets_paths_and_indent() {
        let content = "_internal_defaults_do_not_set:\n  global:\n    hub: docker.io\n  tolerations: []\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert_eq!(
            out.document.render(),
            "_internal_defaults_do_not_set:\n  global:\n    hub: docker.io\n  tolerations:\n  - key: node-role.kubernetes.io/control-plane\n    operator: Exists\n    effect: NoSchedule\n"
        );
    }

    #[test]
    fn test_wrapper_root_append_stays_inside_wrapper() {
        let content = "_internal_defaults_do_not_set:\n  global:\n    hub: docker.io\n\n# end\n";
        let affinity = block("priorityClassName", "system-cluster-critical");
        let out = patch(content, "priorityClassName", &[affinity], MergeMode::Assert);
        assert_eq!(
            out.document.render(),
            "_internal_defaults_do_not_set:\n  global:\n    hub: docker.io\n\n  priorityClassName: system-cluster-critical\n\n# end\n"
        );
    }

    #[test]
    fn test_nested_map_preserve_and_assert() {
        let content = "affinity:\n  # hand tuned\n  podAntiAffinity:\n    preferred: true\nimage: x\n";
        let candidate = block("affinity", "nodeAffinity:\n  required: true");

        let preserved = patch(content, "affinity", &[candidate.clone()], MergeMode::Preserve);
        assert!(!preserved.changed);
        assert!(preserved.satisfied);
        assert_eq!(preserved.document.render(), content);

        let asserted = patch(content, "affinity", &[candidate], MergeMode::Assert);
        assert_eq!(
            asserted.document.render(),
            "affinity:\n  nodeAffinity:\n    required: true\nimage: x\n"
        );
    }

    #[test]
    fn test_nested_map_into_empty_value() {
        let content = "resources: {}\n";
        let candidate = block("resources", "requests:\n  cpu: 10m");
        let out = patch(content, "resources", &[candidate], MergeMode::Preserve);
        assert_eq!(out.document.render(), "resources:\n  requests:\n    cpu: 10m\n");
    }

    #[test]
    fn test_scalar_replaces_line() {
        let content = "priorityClassName: \"\"\nimage: x\n";
        let candidate = block("priorityClassName", "system-node-critical");
        let out = patch(content, "priorityClassName", &[candidate], MergeMode::Assert);
        assert_eq!(
            out.document.render(),
            "priorityClassName: system-node-critical\nimage: x\n"
        );
    }

    #[test]
    fn test_preserve_fills_quoted_empty_scalar() {
        let candidate = block("priorityClassName", "system-node-critical");
        for content in ["priorityClassName: \"\"\nimage: x\n", "priorityClassName: ''\nimage: x\n"] {
            let out = patch(content, "priorityClassName", &[candidate.clone()], MergeMode::Preserve);
            assert!(out.changed);
            assert_eq!(
                out.document.render(),
                "priorityClassName: system-node-critical\nimage: x\n"
            );
        }

        let content = "priorityClassName: custom\n";
        let out = patch(content, "priorityClassName", &[candidate], MergeMode::Preserve);
        assert!(!out.changed);
    }

    #[test]
    fn test_crlf_line_endings_are_kept() {
        let item = block("tolerations", "- key: a\n  operator: Exists");
        let content = "tolerations: []\r\nimage: x\r\n";
        let out = patch(content, "tolerations", &[item.clone()], MergeMode::Assert);
        let rendered = out.document.render();
        assert_eq!(rendered, "tolerations:\r\n- key: a\r\n  operator: Exists\r\nimage: x\r\n");

        let again = patch(&rendered, "tolerations", &[item.clone()], MergeMode::Assert);
        assert!(!again.changed);

        let appended = patch("image: x\r\n", "tolerations", &[item], MergeMode::Assert);
        assert_eq!(
            appended.document.render(),
            "image: x\r\n\r\ntolerations:\r\n- key: a\r\n  operator: Exists\r\n"
        );
    }

    #[test]
    fn test_missing_root_key_appended_once() {
        let content = "image: x\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        let first = out.document.render();
        assert_eq!(
            first,
            "image: x\n\ntolerations:\n- key: node-role.kubernetes.io/control-plane\n  operator: Exists\n  effect: NoSchedule\n"
        );

        let again = patch(&first, "tolerations", &[toleration()], MergeMode::Assert);
        assert!(!again.changed);
        assert_eq!(again.document.render(), first);
    }

    #[test]
    fn test_missing_nested_path_is_unresolved() {
        let content = "image: x\n";
        let out = patch(content, "webhook.tolerations", &[toleration()], MergeMode::Assert);
        assert!(!out.satisfied);
        assert!(!out.changed);
    }

    #[test]
    fn test_inline_flow_list_is_merged() {
        let content = "tolerations: [{key: other, operator: Exists}]\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert_eq!(
            out.document.render(),
            "tolerations:\n- key: other\n  operator: Exists\n- key: node-role.kubernetes.io/control-plane\n  operator: Exists\n  effect: NoSchedule\n"
        );
    }

    #[test]
    fn test_non_list_content_left_alone() {
        let content = "tolerations:\n  key: a\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        assert!(!out.changed);
        assert!(out.satisfied);
    }

    #[test]
    fn test_keys_inside_list_items_do_not_match() {
        let content = "items:\n- name: a\n  tolerations: []\n";
        let out = patch(content, "tolerations", &[toleration()], MergeMode::Assert);
        // Not found at root, so appended as a new root key
        assert!(out.document.render().starts_with("items:\n- name: a\n  tolerations: []\n\ntolerations:\n"));
    }

    #[test]
    fn test_patch_values_reports_paths() {
        let config = InjectionConfig::default();
        let tol = toleration();
        let patches = vec![
            ValuesPatch {
                target: TargetReference::from_dotted("tolerations").unwrap(),
                blocks: vec![&tol],
            },
            ValuesPatch {
                target: TargetReference::from_dotted("webhook.tolerations").unwrap(),
                blocks: vec![&tol],
            },
        ];
        let report = patch_values("tolerations: []\n", &patches, MergeMode::Assert, &config);
        assert!(report.changed);
        assert_eq!(report.satisfied, vec!["tolerations"]);
        assert_eq!(report.unresolved, vec!["webhook.tolerations"]);

        let again = patch_values(&report.content, &patches, MergeMode::Assert, &config);
        assert!(!again.changed);
        assert_eq!(again.content, report.content);
    }
}
