//! Pod and container subtrees inside workload templates.

use crate::injector::parser::template::{line_controls, opens_block};
use crate::injector::parser::{ControlStructure, Line};

/// A subtree that receives injected keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Line index of `spec:` or of the container's `- ` item
    pub header: usize,
    pub indent: usize,
    /// Indentation of the scope's direct keys
    pub child_indent: usize,
    /// Exclusive end line
    pub end: usize,
}

impl Scope {
    fn new(lines: &[Line], header: usize) -> Self {
        let line = &lines[header];
        let end = scope_end(lines, header, line.indent, false);
        let child_indent = if line.list_item {
            line.item_content_indent()
        } else {
            lines[header + 1..end]
                .iter()
                .find(|l| l.is_content() && !l.block_scalar)
                .map(|l| l.indent)
                .unwrap_or(line.indent + 2)
        };
        Self {
            header,
            indent: line.indent,
            child_indent,
            end,
        }
    }
}

/// A key found directly under a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMatch {
    pub idx: usize,
    /// Only present inside a `{{ with }}` block
    pub conditional: bool,
}

/// Exclusive end of the subtree starting at `header`.
///
/// Stops at the first content line at or above the header's indentation, or at
/// an `end`/`else` directive that closes a block opened before the header.
/// Trailing blank lines, comments and block-opening directives are excluded.
pub fn scope_end(lines: &[Line], header: usize, indent: usize, allow_aligned_items: bool) -> usize {
    let mut depth: i32 = 0;
    let mut end = lines.len();

    'scan: for (j, line) in lines.iter().enumerate().skip(header + 1) {
        if line.block_scalar || line.blank_or_comment {
            continue;
        }
        if line.is_directive() {
            for control in line_controls(line) {
                match control {
                    c if c.starts_block() => depth += 1,
                    ControlStructure::End => {
                        if depth == 0 {
                            end = j;
                            break 'scan;
                        }
                        depth -= 1;
                    }
                    ControlStructure::Else | ControlStructure::ElseIf if depth == 0 => {
                        end = j;
                        break 'scan;
                    }
                    _ => {}
                }
            }
            continue;
        }
        let aligned_item = allow_aligned_items && line.list_item && line.indent == indent;
        if line.indent < indent || (line.indent == indent && !aligned_item) {
            end = j;
            break;
        }
    }

    while end > header + 1 {
        let last = &lines[end - 1];
        if (last.blank_or_comment && !last.block_scalar) || opens_block(last) {
            end -= 1;
        } else {
            break;
        }
    }
    end
}

/// Key of the line that owns line `idx`.
///
/// Walks back to the nearest content line with lower indentation; sequence
/// items also accept a non-item key at their own indentation.
pub fn parent_key(lines: &[Line], idx: usize) -> Option<&str> {
    let line = &lines[idx];
    lines[..idx]
        .iter()
        .rev()
        .filter(|l| l.is_content() && !l.block_scalar)
        .find(|l| l.indent < line.indent || (line.list_item && l.indent == line.indent && !l.list_item))
        .and_then(|l| l.key())
}

/// Whether the key at `idx` sits directly under a `template:` key.
pub fn is_under_template(lines: &[Line], idx: usize) -> bool {
    parent_key(lines, idx) == Some("template")
}

/// Pod spec scopes for a resource kind.
///
/// A bare `Pod` uses its first `spec:` outside any `template:`; controllers
/// use every `spec:` that belongs to a `template:`.
pub fn pod_scopes(lines: &[Line], kind: &str) -> Vec<Scope> {
    let bare = kind == "Pod";
    let mut scopes = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let is_spec = line.is_content()
            && !line.block_scalar
            && !line.list_item
            && line.key() == Some("spec")
            && line.value_str().is_empty();
        if is_spec && is_under_template(lines, i) != bare {
            let scope = Scope::new(lines, i);
            i = scope.end.max(i + 1);
            scopes.push(scope);
            if bare {
                break;
            }
            continue;
        }
        i += 1;
    }
    scopes
}

/// One scope per item of every `containers:` list.
pub fn container_scopes(lines: &[Line]) -> Vec<Scope> {
    lines
        .iter()
        .enumerate()
        .filter(|(idx, l)| {
            l.list_item
                && l.is_content()
                && !l.block_scalar
                && parent_key(lines, *idx) == Some("containers")
        })
        .map(|(idx, _)| Scope::new(lines, idx))
        .collect()
}

/// Find `key` directly under a scope, preferring an unconditional occurrence.
pub fn find_child_key(lines: &[Line], scope: &Scope, key: &str) -> Option<KeyMatch> {
    let header = &lines[scope.header];
    if header.list_item && header.key() == Some(key) {
        return Some(KeyMatch {
            idx: scope.header,
            conditional: false,
        });
    }

    let mut open: Vec<ControlStructure> = Vec::new();
    let mut conditional_match = None;
    for (j, line) in lines.iter().enumerate().take(scope.end).skip(scope.header + 1) {
        if line.is_directive() {
            for control in line_controls(line) {
                if control.starts_block() {
                    open.push(control);
                } else if control.ends_block() {
                    open.pop();
                }
            }
            continue;
        }
        if !line.is_content() || line.block_scalar || line.list_item {
            continue;
        }
        if line.indent == scope.child_indent && line.key() == Some(key) {
            if !open.contains(&ControlStructure::With) {
                return Some(KeyMatch {
                    idx: j,
                    conditional: false,
                });
            }
            conditional_match.get_or_insert(KeyMatch {
                idx: j,
                conditional: true,
            });
        }
    }
    conditional_match
}

/// Where new keys go: before the first anchor sibling (and any block directive
/// opening right above it), otherwise at the end of the scope.
pub fn anchor_point(lines: &[Line], scope: &Scope, anchors: &[&str]) -> usize {
    let anchor = (scope.header + 1..scope.end).find(|&j| {
        let line = &lines[j];
        line.is_content()
            && !line.block_scalar
            && !line.list_item
            && line.indent == scope.child_indent
            && line.key().is_some_and(|k| anchors.contains(&k))
    });
    match anchor {
        Some(mut j) => {
            while j > scope.header + 1 && opens_block(&lines[j - 1]) {
                j -= 1;
            }
            j
        }
        None => scope.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::parser::Document;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: test
spec:
  replicas: 1
  template:
    metadata:
      labels:
        app: test
    spec:
      {{- with .Values.tolerations }}
      tolerations:
        {{- toYaml . | nindent 8 }}
      {{- end }}
      containers:
        - name: app
          image: nginx
        - name: sidecar
          image: busybox
      initContainers:
        - name: init
          image: busybox
      volumes:
        - name: data
          emptyDir: {}
"#;

    #[test]
    fn test_pod_scope_under_template() {
        let doc = Document::parse(DEPLOYMENT);
        let scopes = pod_scopes(doc.lines(), "Deployment");
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].header, 10);
        assert_eq!(scopes[0].child_indent, 6);
        assert_eq!(scopes[0].end, doc.len());
    }

    #[test]
    fn test_bare_pod_uses_top_level_spec() {
        let doc = Document::parse("kind: Pod\nmetadata:\n  name: x\nspec:\n  containers:\n  - name: a\n    image: b\n");
        let scopes = pod_scopes(doc.lines(), "Pod");
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].header, 3);
        assert_eq!(scopes[0].child_indent, 2);

        // A controller never picks the top-level spec
        assert!(pod_scopes(doc.lines(), "Deployment").is_empty());
    }

    #[test]
    fn test_container_scopes_skip_init_and_volumes() {
        let doc = Document::parse(DEPLOYMENT);
        let scopes = container_scopes(doc.lines());
        let headers: Vec<&str> = scopes.iter().map(|s| doc.lines()[s.header].trimmed()).collect();
        assert_eq!(headers, vec!["- name: app", "- name: sidecar"]);
        assert_eq!(scopes[0].child_indent, 10);
        assert_eq!(scopes[0].end, 18);
    }

    #[test]
    fn test_conditional_key_is_reported() {
        let doc = Document::parse(DEPLOYMENT);
        let scope = &pod_scopes(doc.lines(), "Deployment")[0];
        let found = find_child_key(doc.lines(), scope, "tolerations").unwrap();
        assert!(found.conditional);
        assert_eq!(found.idx, 12);
        let containers = find_child_key(doc.lines(), scope, "containers").unwrap();
        assert!(!containers.conditional);
        assert!(find_child_key(doc.lines(), scope, "affinity").is_none());
    }

    #[test]
    fn test_scope_end_stops_before_unbalanced_end() {
        let doc = Document::parse(DEPLOYMENT);
        let end = scope_end(doc.lines(), 12, 6, true);
        assert_eq!(doc.lines()[end].trimmed(), "{{- end }}");
    }

    #[test]
    fn test_anchor_point_prefers_first_anchor() {
        let doc = Document::parse(DEPLOYMENT);
        let scope = &pod_scopes(doc.lines(), "Deployment")[0];
        let at = anchor_point(doc.lines(), scope, &["containers", "initContainers", "volumes"]);
        assert_eq!(doc.lines()[at].trimmed(), "containers:");
    }

    #[test]
    fn test_anchor_point_moves_above_opening_directive() {
        let doc = Document::parse("spec:\n  template:\n    spec:\n      hostNetwork: true\n      {{- if .Values.init }}\n      initContainers:\n      - name: i\n      {{- end }}\n");
        let scope = &pod_scopes(doc.lines(), "Deployment")[0];
        let at = anchor_point(doc.lines(), scope, &["containers", "initContainers", "volumes"]);
        assert_eq!(at, 4);
    }
}
