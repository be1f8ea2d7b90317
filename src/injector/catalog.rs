//! Injection block catalog.
//!
//! The catalog (`inject-blocks.yaml`) maps a category name to a list of
//! fragments. Every top-level key of a fragment becomes one [`InjectionBlock`]
//! targeting that key:
//!
//! ```yaml
//! allPods:
//!   - tolerations:
//!       - key: node-role.kubernetes.io/control-plane
//!         operator: Exists
//!         effect: NoSchedule
//! allContainers:
//!   - envFrom:
//!       - configMapRef:
//!           name: kubernetes-services-endpoint
//!           optional: true
//! newValues:
//!   - global:
//!       imageRegistry: registry.example.com
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::parser::Node;
use crate::config::InjectionConfig;
use crate::error::{InjectorError, Result};

/// Catalog sections handled by other tooling; skipped without a warning.
const FOREIGN_SECTIONS: &[&str] = &["customFileMods", "customSchemaMods"];

/// Fragment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockCategory {
    AllPods,
    AllContainers,
    CriticalDsPods,
    ControlPlanePods,
    AllServices,
    NewValues,
}

impl BlockCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "allPods" => Some(Self::AllPods),
            "allContainers" => Some(Self::AllContainers),
            "criticalDsPods" => Some(Self::CriticalDsPods),
            "controlPlanePods" => Some(Self::ControlPlanePods),
            "allServices" => Some(Self::AllServices),
            "newValues" => Some(Self::NewValues),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllPods => "allPods",
            Self::AllContainers => "allContainers",
            Self::CriticalDsPods => "criticalDsPods",
            Self::ControlPlanePods => "controlPlanePods",
            Self::AllServices => "allServices",
            Self::NewValues => "newValues",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a target key is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeKind {
    Scalar,
    List,
    NestedMap,
}

impl MergeKind {
    /// Infer the merge kind of `key` from its candidate blocks.
    pub fn infer(key: &str, blocks: &[&InjectionBlock], config: &InjectionConfig) -> Self {
        if config.is_always_list(key) {
            return Self::List;
        }
        match blocks.first().map(|b| &b.value) {
            Some(Node::Sequence(_)) => Self::List,
            Some(Node::Mapping(_)) => Self::NestedMap,
            _ => Self::Scalar,
        }
    }
}

/// A single policy fragment for one target key.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionBlock {
    pub category: BlockCategory,
    pub key: String,
    pub value: Node,
}

impl InjectionBlock {
    /// Items of a list-valued block; a non-sequence value counts as one item.
    pub fn items(&self) -> Vec<Node> {
        match &self.value {
            Node::Sequence(items) => items.clone(),
            Node::Scalar(v) if v.is_null() => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// Which optional pod categories apply to a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodProfile {
    pub critical_ds: bool,
    pub control_plane: bool,
}

impl PodProfile {
    pub fn categories(&self) -> Vec<BlockCategory> {
        let mut categories = vec![BlockCategory::AllPods];
        if self.critical_ds {
            categories.push(BlockCategory::CriticalDsPods);
        }
        if self.control_plane {
            categories.push(BlockCategory::ControlPlanePods);
        }
        categories
    }
}

/// Parsed injection block catalog.
#[derive(Debug, Clone, Default)]
pub struct BlockCatalog {
    blocks: BTreeMap<BlockCategory, Vec<InjectionBlock>>,
}

impl BlockCatalog {
    /// Load the catalog from disk. A missing or unparseable file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InjectorError::Catalog {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|message| InjectorError::Catalog {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse catalog text. Malformed fragments are skipped with a warning.
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        let root: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let sections = match root {
            Value::Mapping(map) => map,
            Value::Null => return Ok(Self::default()),
            _ => return Err("top level must be a mapping of categories".to_string()),
        };

        let mut catalog = Self::default();
        for (name, fragments) in sections {
            let name = name.as_str().unwrap_or_default().to_string();
            let Some(category) = BlockCategory::from_name(&name) else {
                if FOREIGN_SECTIONS.contains(&name.as_str()) {
                    log::debug!("Skipping catalog section '{}'", name);
                } else {
                    log::warn!("Skipping unknown catalog category '{}'", name);
                }
                continue;
            };

            let fragments = match fragments {
                Value::Sequence(items) => items,
                Value::Null => Vec::new(),
                _ => {
                    log::warn!("Catalog category '{}' is not a list, skipping", name);
                    continue;
                }
            };

            for (idx, fragment) in fragments.into_iter().enumerate() {
                match parse_fragment(fragment) {
                    Ok(map) => {
                        let entry = catalog.blocks.entry(category).or_default();
                        for (key, value) in map {
                            entry.push(InjectionBlock {
                                category,
                                key,
                                value,
                            });
                        }
                    }
                    Err(e) => log::warn!("Skipping {} fragment {}: {}", category, idx, e),
                }
            }
        }
        Ok(catalog)
    }

    /// All blocks of a category, in catalog order.
    pub fn blocks(&self, category: BlockCategory) -> &[InjectionBlock] {
        self.blocks.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blocks of the given categories, in category then catalog order.
    pub fn blocks_in(&self, categories: &[BlockCategory]) -> Vec<&InjectionBlock> {
        categories
            .iter()
            .flat_map(|c| self.blocks(*c).iter())
            .collect()
    }

    /// Pod-level blocks for a profile.
    pub fn pod_blocks(&self, profile: PodProfile) -> Vec<&InjectionBlock> {
        self.blocks_in(&profile.categories())
    }

    pub fn container_blocks(&self) -> Vec<&InjectionBlock> {
        self.blocks_in(&[BlockCategory::AllContainers])
    }

    /// Candidate blocks for a referenced values key: pod, then container, then service blocks.
    pub fn candidates_for_key(&self, key: &str, profile: PodProfile) -> Vec<&InjectionBlock> {
        let groups = [
            self.pod_blocks(profile),
            self.container_blocks(),
            self.blocks_in(&[BlockCategory::AllServices]),
        ];
        for group in groups {
            let matching: Vec<&InjectionBlock> =
                group.into_iter().filter(|b| b.key == key).collect();
            if !matching.is_empty() {
                return matching;
            }
        }
        Vec::new()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.values().all(Vec::is_empty)
    }

    /// Number of blocks per category.
    pub fn summary(&self) -> Vec<(BlockCategory, usize)> {
        self.blocks.iter().map(|(c, b)| (*c, b.len())).collect()
    }
}

/// A fragment is a mapping, or a string holding a YAML mapping.
fn parse_fragment(fragment: Value) -> std::result::Result<Vec<(String, Node)>, String> {
    let node = match fragment {
        Value::String(text) => Node::parse(&text).map_err(|e| e.to_string())?,
        other => Node::from_value(other),
    };
    match node {
        Node::Mapping(map) if !map.is_empty() => Ok(map.into_iter().collect()),
        Node::Mapping(_) => Err("empty fragment".to_string()),
        _ => Err("fragment must be a mapping with a top-level key".to_string()),
    }
}

/// Group blocks by key, preserving first-appearance order.
pub fn group_by_key<'a>(blocks: &[&'a InjectionBlock]) -> Vec<(String, Vec<&'a InjectionBlock>)> {
    let mut groups: Vec<(String, Vec<&InjectionBlock>)> = Vec::new();
    for block in blocks {
        match groups.iter_mut().find(|(k, _)| *k == block.key) {
            Some((_, group)) => group.push(block),
            None => groups.push((block.key.clone(), vec![block])),
        }
    }
    groups
}
