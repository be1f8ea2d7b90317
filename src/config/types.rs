use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::injector::MergeMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub injection: InjectionConfig,
    pub registry: RegistryConfig,
    pub output: OutputConfig,
}

/// Settings shared by the values engine and the template injector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Root keys that act as a virtual root for the real values
    pub wrapper_keys: Vec<String>,
    /// Keys merged as lists no matter what the candidate looks like
    pub always_list_keys: Vec<String>,
    /// List keys whose `- ` markers sit at the key's own indentation
    pub aligned_list_keys: Vec<String>,
    /// Fields that identify a list item, per list key
    pub identity_fields: BTreeMap<String, Vec<String>>,
    /// Resource kinds eligible for in-place template injection
    pub workload_kinds: Vec<String>,
    pub values_file: String,
    pub templates_dir: String,
    pub values_mode: MergeMode,
    pub template_mode: MergeMode,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        let mut identity_fields = BTreeMap::new();
        identity_fields.insert(
            "tolerations".to_string(),
            ["key", "operator", "effect", "value", "tolerationSeconds"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        identity_fields.insert("env".to_string(), vec!["name".to_string()]);
        identity_fields.insert(
            "envFrom".to_string(),
            vec!["configMapRef.name".to_string(), "secretRef.name".to_string()],
        );

        Self {
            wrapper_keys: vec!["_internal_defaults_do_not_set".to_string()],
            always_list_keys: vec!["tolerations".to_string()],
            aligned_list_keys: vec!["tolerations".to_string()],
            identity_fields,
            workload_kinds: [
                "Deployment",
                "StatefulSet",
                "DaemonSet",
                "Job",
                "CronJob",
                "ReplicaSet",
                "Pod",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            values_file: "values.yaml".to_string(),
            templates_dir: "templates".to_string(),
            values_mode: MergeMode::Assert,
            template_mode: MergeMode::Preserve,
        }
    }
}

impl InjectionConfig {
    pub fn is_wrapper_key(&self, key: &str) -> bool {
        self.wrapper_keys.iter().any(|k| k == key)
    }

    pub fn is_always_list(&self, key: &str) -> bool {
        self.always_list_keys.iter().any(|k| k == key)
    }

    pub fn is_aligned_list(&self, key: &str) -> bool {
        self.aligned_list_keys.iter().any(|k| k == key)
    }

    pub fn identity_fields_for(&self, key: &str) -> Option<&[String]> {
        self.identity_fields.get(key).map(|v| v.as_slice())
    }

    pub fn is_workload_kind(&self, kind: &str) -> bool {
        self.workload_kinds.iter().any(|k| k == kind)
    }
}

/// Registry prober configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_parallel: usize,
    pub timeout_secs: u64,
    /// Image references reported as existing without a lookup
    pub placeholder_refs: Vec<String>,
    /// Registries reached over plain HTTP
    pub insecure_registries: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            timeout_secs: 30,
            placeholder_refs: vec!["auto".to_string()],
            insecure_registries: Vec::new(),
            username: None,
            password: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub create_backup: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            create_backup: true,
        }
    }
}
