//! Helm template scanning.
//!
//! Static, line-based inspection of Go templates: `.Values` references,
//! control directives, the resource `kind:` and `nindent` hints. Templates are
//! never evaluated.

use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

use super::line::Line;

static VALUES_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.Values\.([^\s}),|]+)").expect("valid values regex"));

static NINDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnindent\s+(\d+)").expect("valid nindent regex"));

static KIND_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"default\s+"?([A-Za-z]+)"?"#).expect("valid default regex"));

/// A dotted `.Values` path referenced by a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetReference {
    /// Path segments, e.g. `["webhook", "tolerations"]`
    pub path: Vec<String>,
    /// Last path segment
    pub key: String,
}

impl TargetReference {
    /// Build from a dotted path; empty segments are dropped.
    pub fn from_dotted(dotted: &str) -> Option<Self> {
        let path: Vec<String> = dotted
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let key = path.last()?.clone();
        Some(Self { path, key })
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Collect the `.Values` references in template text, first occurrence order.
pub fn scan_value_references(content: &str) -> Vec<TargetReference> {
    let mut seen = std::collections::HashSet::new();
    let mut refs = Vec::new();
    for caps in VALUES_REF.captures_iter(content) {
        let dotted = caps[1].trim_end_matches('.');
        if let Some(reference) = TargetReference::from_dotted(dotted)
            && seen.insert(reference.dotted())
        {
            refs.push(reference);
        }
    }
    refs
}

/// Control structure type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlStructure {
    If,
    Else,
    ElseIf,
    Range,
    With,
    Define,
    Block,
    Template,
    End,
}

impl ControlStructure {
    /// Parse from action content.
    pub fn parse(content: &str) -> Option<Self> {
        let trimmed = content.trim();
        let first_word = trimmed.split_whitespace().next()?;

        match first_word {
            "if" => Some(Self::If),
            "else" => {
                if trimmed.starts_with("else if") {
                    Some(Self::ElseIf)
                } else {
                    Some(Self::Else)
                }
            }
            "range" => Some(Self::Range),
            "with" => Some(Self::With),
            "define" => Some(Self::Define),
            "block" => Some(Self::Block),
            "template" => Some(Self::Template),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    /// Check if this starts a block (needs matching end).
    pub fn starts_block(&self) -> bool {
        matches!(
            self,
            Self::If | Self::Range | Self::With | Self::Define | Self::Block
        )
    }

    /// Check if this ends a block.
    pub fn ends_block(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Control structures of every `{{ ... }}` action on a line, in order.
pub fn line_controls(line: &Line) -> Vec<ControlStructure> {
    let mut controls = Vec::new();
    let mut rest = line.raw.as_str();
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let action = after[..end]
            .trim_start_matches('-')
            .trim_end_matches('-')
            .trim();
        if !action.starts_with("/*")
            && let Some(control) = ControlStructure::parse(action)
        {
            controls.push(control);
        }
        rest = &after[end + 2..];
    }
    controls
}

/// Whether a directive line opens a block that it does not close.
pub fn opens_block(line: &Line) -> bool {
    if !line.is_directive() {
        return false;
    }
    let depth: i32 = line_controls(line)
        .iter()
        .map(|c| {
            if c.starts_block() {
                1
            } else if c.ends_block() {
                -1
            } else {
                0
            }
        })
        .sum();
    depth > 0
}

/// `nindent N` argument of a directive line.
pub fn nindent_of(line: &Line) -> Option<usize> {
    NINDENT
        .captures(&line.raw)
        .and_then(|c| c[1].parse().ok())
}

/// Resource kind of a template, limited to kinds accepted by `is_allowed`.
///
/// Handles literal kinds and templated ones with a `default "Kind"` fallback.
/// Only top-level `kind:` lines count; nested ones such as
/// `scaleTargetRef.kind` name another resource.
pub fn detect_kind<F>(content: &str, is_allowed: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    for raw in content.lines() {
        let Some(value) = raw.trim_end().strip_prefix("kind:") else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');

        let candidate = if value.contains("{{") {
            KIND_DEFAULT.captures(value).map(|c| c[1].to_string())
        } else {
            Some(value.to_string())
        };

        if let Some(kind) = candidate
            && is_allowed(&kind)
        {
            return Some(kind);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::parser::line::parse_line;

    #[test]
    fn test_scan_value_references() {
        let content = r#"
spec:
  {{- with .Values.webhook.tolerations }}
  tolerations: {{ toYaml . | nindent 4 }}
  {{- end }}
  replicas: {{ .Values.replicaCount}}
  image: "{{ .Values.image.repository }}:{{ .Values.image.tag | default .Chart.AppVersion }}"
  affinity: {{ toYaml (.Values.affinity) }}
  {{- if or .Values.a,.Values.b }}
  x: {{ $.Values.webhook.tolerations }}
"#;
        let refs = scan_value_references(content);
        let dotted: Vec<String> = refs.iter().map(|r| r.dotted()).collect();
        assert_eq!(
            dotted,
            vec![
                "webhook.tolerations",
                "replicaCount",
                "image.repository",
                "image.tag",
                "affinity",
                "a",
                "b",
            ]
        );
        assert_eq!(refs[0].key, "tolerations");
        assert_eq!(refs[0].path, vec!["webhook", "tolerations"]);
    }

    #[test]
    fn test_control_structure_parse() {
        assert_eq!(ControlStructure::parse("if .Values.x"), Some(ControlStructure::If));
        assert_eq!(ControlStructure::parse("else if x"), Some(ControlStructure::ElseIf));
        assert_eq!(ControlStructure::parse("with .Values.x"), Some(ControlStructure::With));
        assert_eq!(ControlStructure::parse("end"), Some(ControlStructure::End));
        assert_eq!(ControlStructure::parse("toYaml ."), None);
    }

    #[test]
    fn test_line_controls_and_opens_block() {
        let with = parse_line("      {{- with .Values.nodeSelector }}");
        assert_eq!(line_controls(&with), vec![ControlStructure::With]);
        assert!(opens_block(&with));

        let inline = parse_line("{{- if .Values.x }}{{ .Values.x }}{{- end }}");
        assert!(!opens_block(&inline));

        let end = parse_line("{{- end }}");
        assert_eq!(line_controls(&end), vec![ControlStructure::End]);
        assert!(!opens_block(&end));
    }

    #[test]
    fn test_nindent_of() {
        assert_eq!(nindent_of(&parse_line("  {{- toYaml . | nindent 8 }}")), Some(8));
        assert_eq!(nindent_of(&parse_line("  {{- toYaml . }}")), None);
    }

    #[test]
    fn test_detect_kind() {
        let allowed = |k: &str| ["Deployment", "Pod"].contains(&k);
        assert_eq!(
            detect_kind("apiVersion: v1\nkind: Service\n---\nkind: Deployment\n", allowed),
            Some("Deployment".to_string())
        );
        assert_eq!(
            detect_kind("kind: {{ .Values.kind | default \"Pod\" }}\n", allowed),
            Some("Pod".to_string())
        );
        assert_eq!(detect_kind("kind: ConfigMap\n", allowed), None);
    }

    #[test]
    fn test_detect_kind_ignores_nested_kind() {
        let allowed = |k: &str| k == "Deployment";
        let hpa = "apiVersion: autoscaling/v2\nkind: HorizontalPodAutoscaler\nspec:\n  scaleTargetRef:\n    apiVersion: apps/v1\n    kind: Deployment\n    name: app\n";
        assert_eq!(detect_kind(hpa, allowed), None);
        assert_eq!(
            detect_kind("kind: Deployment\r\nspec: {}\r\n", allowed),
            Some("Deployment".to_string())
        );
    }
}
