//! In-place injection into workload templates.
//!
//! Used for keys a template does not take from `.Values`: the block is written
//! straight into the template's pod spec or into each of its containers.
//!
//! - Pod-level keys go under the pod `spec:` (the top-level one for a bare
//!   `Pod`, the one owned by `template:` for controllers), before
//!   `containers:`, `initContainers:` or `volumes:` when present.
//! - Container-level keys go into every `containers:` item (never init
//!   containers), before `env:`, `livenessProbe:` or `readinessProbe:`.
//! - Existing list keys only receive missing items.
//! - A key that only exists inside `{{ with }}` counts as absent.

mod apply;
pub mod scope;

use serde::Serialize;

use super::catalog::InjectionBlock;
use super::parser::{Document, detect_kind};
use super::values::MergeMode;
use crate::config::InjectionConfig;

pub use scope::{Scope, container_scopes, is_under_template, pod_scopes};

/// Sibling keys that pod-level injections are placed before.
pub const POD_ANCHORS: &[&str] = &["containers", "initContainers", "volumes"];

/// Sibling keys that container-level injections are placed before.
pub const CONTAINER_ANCHORS: &[&str] = &["env", "livenessProbe", "readinessProbe"];

/// Result of injecting into one template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InlineOutcome {
    pub content: String,
    pub changed: bool,
    /// Keys written at pod level
    pub pod_keys: Vec<String>,
    /// Keys written into containers
    pub container_keys: Vec<String>,
}

/// Inject pod-level blocks into a template of the given kind.
pub fn inject_pod_spec(
    content: &str,
    kind: &str,
    blocks: &[&InjectionBlock],
    mode: MergeMode,
    config: &InjectionConfig,
) -> InlineOutcome {
    let doc = Document::parse(content);
    let scopes = pod_scopes(doc.lines(), kind);
    if scopes.is_empty() {
        log::debug!("No pod spec found for kind {}", kind);
    }
    let (out, keys) = apply::inject_scopes(&doc, &scopes, blocks, POD_ANCHORS, mode, config);
    let rendered = out.render();
    InlineOutcome {
        changed: rendered != content,
        content: rendered,
        pod_keys: keys,
        container_keys: Vec::new(),
    }
}

/// Inject container-level blocks into every container of a template.
pub fn inject_container_spec(
    content: &str,
    blocks: &[&InjectionBlock],
    mode: MergeMode,
    config: &InjectionConfig,
) -> InlineOutcome {
    let doc = Document::parse(content);
    let scopes = container_scopes(doc.lines());
    let (out, keys) = apply::inject_scopes(&doc, &scopes, blocks, CONTAINER_ANCHORS, mode, config);
    let rendered = out.render();
    InlineOutcome {
        changed: rendered != content,
        content: rendered,
        pod_keys: Vec::new(),
        container_keys: keys,
    }
}

/// Detect the template's kind and apply pod then container injection.
///
/// Returns `None` when the template is not an eligible workload.
pub fn inject_template(
    content: &str,
    pod_blocks: &[&InjectionBlock],
    container_blocks: &[&InjectionBlock],
    mode: MergeMode,
    config: &InjectionConfig,
) -> Option<InlineOutcome> {
    let kind = detect_kind(content, |k| config.is_workload_kind(k))?;

    let pod = inject_pod_spec(content, &kind, pod_blocks, mode, config);
    let containers = inject_container_spec(&pod.content, container_blocks, mode, config);

    Some(InlineOutcome {
        changed: containers.content != content,
        content: containers.content,
        pod_keys: pod.pod_keys,
        container_keys: containers.container_keys,
    })
}
