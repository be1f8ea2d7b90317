//! Command-line tests for `chart-inject`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CATALOG: &str = r#"
allPods:
  - tolerations:
      - key: platform.example.com/unavailable
        operator: Exists
        effect: NoSchedule
  - priorityClassName: platform-default
newValues:
  - global:
      imageRegistry: registry.example.com
"#;

const VALUES: &str = "replicaCount: 1\n\ntolerations: []\n";

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
spec:
  replicas: {{ .Values.replicaCount }}
  template:
    spec:
      {{- with .Values.tolerations }}
      tolerations:
        {{- toYaml . | nindent 8 }}
      {{- end }}
      containers:
        - name: app
          image: nginx:1.25
"#;

fn create_chart(root: &Path) -> std::path::PathBuf {
    let chart = root.join("chart");
    fs::create_dir_all(chart.join("templates")).unwrap();
    fs::write(chart.join("Chart.yaml"), "apiVersion: v2\nname: app\nversion: 0.1.0\n").unwrap();
    fs::write(chart.join("values.yaml"), VALUES).unwrap();
    fs::write(chart.join("templates/deployment.yaml"), DEPLOYMENT).unwrap();
    fs::write(root.join("inject-blocks.yaml"), CATALOG).unwrap();
    chart
}

fn chart_inject(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("chart-inject").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .env_remove("CHART_INJECT_REGISTRY_USERNAME")
        .env_remove("CHART_INJECT_REGISTRY_PASSWORD");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    chart_inject(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inject"))
        .stdout(predicate::str::contains("check-images"))
        .stdout(predicate::str::contains("restore"));
}

#[test]
fn test_scan_json() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());

    let output = chart_inject(temp.path())
        .args(["scan", "--json"])
        .arg(&chart)
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let scan: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(scan["references"], serde_json::json!(["replicaCount", "tolerations"]));
    assert_eq!(scan["templates"][0]["kind"], "Deployment");
}

#[test]
fn test_inject_then_restore() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());

    chart_inject(temp.path())
        .args(["inject", "--skip-image-check"])
        .arg(&chart)
        .assert()
        .success()
        .stdout(predicate::str::contains("Chart updated"));

    let values = fs::read_to_string(chart.join("values.yaml")).unwrap();
    assert_eq!(
        values,
        "replicaCount: 1\n\ntolerations:\n- key: platform.example.com/unavailable\n  operator: Exists\n  effect: NoSchedule\n\nglobal:\n  imageRegistry: registry.example.com\n"
    );
    let template = fs::read_to_string(chart.join("templates/deployment.yaml")).unwrap();
    assert!(template.contains("      priorityClassName: platform-default\n      containers:\n"));

    // A second run finds nothing to do
    chart_inject(temp.path())
        .args(["inject", "--skip-image-check"])
        .arg(&chart)
        .assert()
        .success()
        .stdout(predicate::str::contains("already up to date"));

    chart_inject(temp.path())
        .arg("restore")
        .arg(&chart)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));
    assert_eq!(fs::read_to_string(chart.join("values.yaml")).unwrap(), VALUES);
}

#[test]
fn test_inject_dry_run_json_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());

    let output = chart_inject(temp.path())
        .args(["inject", "--dry-run", "--skip-image-check", "--json"])
        .arg(&chart)
        .assert()
        .success();
    let report: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["values_changed"], true);
    assert_eq!(report["templates"][0]["pod_keys"], serde_json::json!(["priorityClassName"]));

    assert_eq!(fs::read_to_string(chart.join("values.yaml")).unwrap(), VALUES);
    assert!(!chart.join("values.yaml.backup").exists());
}

#[test]
fn test_missing_catalog_fails() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());

    chart_inject(temp.path())
        .args(["inject", "--skip-image-check", "--blocks", "missing.yaml"])
        .arg(&chart)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: Invalid block catalog"));
    assert_eq!(fs::read_to_string(chart.join("values.yaml")).unwrap(), VALUES);
}

#[test]
fn test_restore_without_backup_fails() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());

    chart_inject(temp.path())
        .arg("restore")
        .arg(&chart)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup found"));
}

#[test]
fn test_explicit_config_changes_values_file() {
    let temp = TempDir::new().unwrap();
    let chart = create_chart(temp.path());
    fs::rename(chart.join("values.yaml"), chart.join("defaults.yaml")).unwrap();
    fs::write(
        temp.path().join("custom.toml"),
        "[injection]\nvalues_file = \"defaults.yaml\"\n\n[output]\ncreate_backup = false\n",
    )
    .unwrap();

    chart_inject(temp.path())
        .args(["--config", "custom.toml", "inject", "--skip-image-check"])
        .arg(&chart)
        .assert()
        .success();

    let values = fs::read_to_string(chart.join("defaults.yaml")).unwrap();
    assert!(values.contains("- key: platform.example.com/unavailable"));
    assert!(!chart.join("defaults.yaml.backup").exists());
}

#[test]
fn test_check_images_without_images() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("rendered.yaml"), "apiVersion: v1\nkind: ConfigMap\n").unwrap();

    chart_inject(temp.path())
        .args(["check-images", "rendered.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No images found"));
}

#[test]
fn test_check_images_unreachable_registry_fails() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("rendered.yaml"),
        "kind: Pod\nspec:\n  containers:\n    - name: a\n      image: 127.0.0.1:9/team/app:1.0\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("fast.toml"),
        "[registry]\ntimeout_secs = 5\n",
    )
    .unwrap();

    chart_inject(temp.path())
        .args(["--config", "fast.toml", "check-images", "rendered.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in registry"));
}
