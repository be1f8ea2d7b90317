//! Structural equivalence of list items.
//!
//! List keys with configured identity fields (tolerations, env, envFrom)
//! compare only those fields; a field absent on both sides matches. A dotted
//! field such as `configMapRef.name` is looked up through nested mappings.
//! Every other list compares whole items structurally.

use super::parser::Node;
use crate::config::InjectionConfig;

/// Whether two items of the list stored under `list_key` describe the same thing.
pub fn items_equivalent(list_key: &str, a: &Node, b: &Node, config: &InjectionConfig) -> bool {
    match config.identity_fields_for(list_key) {
        Some(fields) if a.as_mapping().is_some() && b.as_mapping().is_some() => {
            fields.iter().all(|field| match (lookup(a, field), lookup(b, field)) {
                (None, None) => true,
                (Some(x), Some(y)) => x.scalar_text() == y.scalar_text(),
                _ => false,
            })
        }
        _ => a.structurally_eq(b),
    }
}

fn lookup<'a>(node: &'a Node, field: &str) -> Option<&'a Node> {
    field.split('.').try_fold(node, |current, part| current.get(part))
}

/// Candidates with no equivalent in `existing` (nor earlier in `candidates`).
pub fn missing_items(
    list_key: &str,
    existing: &[Node],
    candidates: &[Node],
    config: &InjectionConfig,
) -> Vec<Node> {
    let mut missing: Vec<Node> = Vec::new();
    for candidate in candidates {
        let known = existing
            .iter()
            .chain(missing.iter())
            .any(|item| items_equivalent(list_key, item, candidate, config));
        if !known {
            missing.push(candidate.clone());
        }
    }
    missing
}

/// Remove duplicates from a candidate list, keeping the first occurrence.
pub fn dedupe_items(list_key: &str, candidates: &[Node], config: &InjectionConfig) -> Vec<Node> {
    missing_items(list_key, &[], candidates, config)
}
