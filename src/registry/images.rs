//! Image extraction from rendered manifests.

use serde_yaml::Value;

const CONTAINER_LIST_KEYS: &[&str] = &["containers", "initContainers", "ephemeralContainers"];

/// Collect container images from a multi-document manifest, first occurrence order.
///
/// Documents that fail to parse are skipped with a warning.
pub fn extract_images(manifest: &str) -> Vec<String> {
    let mut images = Vec::new();
    for (idx, doc) in split_documents(manifest).into_iter().enumerate() {
        if doc.trim().is_empty() {
            continue;
        }
        match serde_yaml::from_str::<Value>(&doc) {
            Ok(value) => collect_images(&value, &mut images),
            Err(e) => log::warn!("Skipping unparseable manifest document {}: {}", idx, e),
        }
    }
    images
}

fn split_documents(manifest: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();
    for line in manifest.lines() {
        let trimmed = line.trim_end();
        let separator = trimmed == "---" || trimmed.starts_with("--- ") || trimmed == "...";
        if separator {
            docs.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    docs.push(current);
    docs
}

fn collect_images(value: &Value, images: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_container_list = key
                    .as_str()
                    .is_some_and(|k| CONTAINER_LIST_KEYS.contains(&k));
                if is_container_list && let Value::Sequence(containers) = child {
                    for container in containers {
                        if let Some(image) = container.get("image").and_then(Value::as_str) {
                            let image = image.trim();
                            if !image.is_empty() && !images.iter().any(|i| i == image) {
                                images.push(image.to_string());
                            }
                        }
                    }
                }
                collect_images(child, images);
            }
        }
        Value::Sequence(items) => items.iter().for_each(|v| collect_images(v, images)),
        Value::Tagged(tagged) => collect_images(&tagged.value, images),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = r#"---
# Source: app/templates/deployment.yaml
apiVersion: apps/v1
kind: Deployment
spec:
  template:
    spec:
      initContainers:
        - name: init
          image: busybox:1.36
      containers:
        - name: app
          image: "registry.example.com/team/app:1.0"
        - name: sidecar
          image: busybox:1.36
---
apiVersion: batch/v1
kind: CronJob
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
            - name: job
              image: alpine:3.19
---
kind: ConfigMap
data:
  image: not-a-container
"#;

    #[test]
    fn test_images_from_all_workload_shapes() {
        assert_eq!(
            extract_images(RENDERED),
            vec!["busybox:1.36", "registry.example.com/team/app:1.0", "alpine:3.19"]
        );
    }

    #[test]
    fn test_bad_document_is_skipped() {
        let manifest = "kind: Pod\nspec:\n  containers:\n  - image: a:1\n---\nkey: [unclosed\n---\nkind: Pod\nspec:\n  containers:\n  - image: b:2\n";
        assert_eq!(extract_images(manifest), vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_empty_manifest() {
        assert!(extract_images("").is_empty());
        assert!(extract_images("---\n---\n").is_empty());
    }
}
