//! Functions run over package directories.

use krm_setters::config::{load_data_from_path, FunctionConfig, SearchReplaceConfig, SetterConfig};
use krm_setters::functions::{
    annotate_mutations, apply_setters, create_setters, search_replace, MUTATION_ANNOTATION,
};
use krm_setters::package::Package;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_package() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("base")).unwrap();
    fs::create_dir_all(dir.path().join("overlay")).unwrap();
    fs::write(
        dir.path().join("base/deploy.yaml"),
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web # kpt-set: ${app}
spec:
  replicas: 3
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.7.9 # kpt-set: ${image}:${tag}
",
    )
    .unwrap();
    fs::write(
        dir.path().join("overlay/service.yaml"),
        "\
apiVersion: v1
kind: Service
metadata:
  name: web # kpt-set: ${app}
spec:
  ports:
    - port: 80
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: web-config # kpt-set: ${app}-config
data:
  replicas: 3
",
    )
    .unwrap();
    dir
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_apply_setters_across_files() {
    let dir = setup_package();
    let mut package = Package::load(dir.path(), None).unwrap();
    let setters = SetterConfig::from_data(&data(&[("app", "api"), ("tag", "1.8.0")]));

    let report = apply_setters(&mut package.resources, &setters).unwrap();
    assert_eq!(report.count(), 4);
    let files: Vec<_> = report.results.iter().map(|r| r.file_path.as_str()).collect();
    assert_eq!(
        files,
        vec!["base/deploy.yaml", "base/deploy.yaml", "overlay/service.yaml", "overlay/service.yaml"]
    );

    let changes = package.write().unwrap();
    assert_eq!(changes.len(), 2);
    let deploy = read(dir.path(), "base/deploy.yaml");
    assert!(deploy.contains("  name: api # kpt-set: ${app}\n"));
    assert!(deploy.contains("image: nginx:1.8.0 # kpt-set: ${image}:${tag}\n"));
    let service = read(dir.path(), "overlay/service.yaml");
    assert!(service.contains("  name: api-config # kpt-set: ${app}-config\n"));
    assert!(service.contains("\n---\n"));
}

#[test]
fn test_search_replace_limited_to_file_glob() {
    let dir = setup_package();
    let mut package = Package::load(dir.path(), None).unwrap();
    let config = SearchReplaceConfig {
        by_value: Some("3".to_string()),
        by_file_path: Some("overlay/**".to_string()),
        put_value: Some("5".to_string()),
        ..Default::default()
    };

    let report = search_replace(&mut package.resources, &config).unwrap();
    assert_eq!(report.count(), 1);
    assert_eq!(report.results[0].file_path, "overlay/service.yaml");
    assert_eq!(report.results[0].field_path, "data.replicas");

    package.write().unwrap();
    assert!(read(dir.path(), "base/deploy.yaml").contains("  replicas: 3\n"));
    assert!(read(dir.path(), "overlay/service.yaml").contains("  replicas: 5\n"));
}

#[test]
fn test_failed_run_writes_nothing() {
    let dir = setup_package();
    let before = read(dir.path(), "base/deploy.yaml");
    // `tag` cannot be derived from a value without a colon.
    fs::write(
        dir.path().join("overlay/extra.yaml"),
        "image: plain # kpt-set: ${image}:${tag}\n",
    )
    .unwrap();

    let mut package = Package::load(dir.path(), None).unwrap();
    let setters = SetterConfig::from_data(&data(&[("image", "ubuntu")]));
    let err = apply_setters(&mut package.resources, &setters).unwrap_err();
    assert!(err.to_string().starts_with("overlay/extra.yaml: image: "));

    assert!(package.changes().is_empty());
    assert!(package.write().unwrap().is_empty());
    assert_eq!(read(dir.path(), "base/deploy.yaml"), before);
}

#[test]
fn test_created_setters_can_be_applied() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("cm.yaml"),
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: shop-db\ndata:\n  host: shop-db.prod.svc\n",
    )
    .unwrap();

    let mut package = Package::load(dir.path(), None).unwrap();
    create_setters(&mut package.resources, &data(&[("app", "shop"), ("env", "prod")])).unwrap();
    package.write().unwrap();
    assert_eq!(
        read(dir.path(), "cm.yaml"),
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: shop-db # kpt-set: ${app}-db
data:
  host: shop-db.prod.svc # kpt-set: ${app}-db.${env}.svc
"
    );

    let mut package = Package::load(dir.path(), None).unwrap();
    let setters = SetterConfig::from_data(&data(&[("app", "cart"), ("env", "dev")]));
    apply_setters(&mut package.resources, &setters).unwrap();
    package.write().unwrap();
    let cm = read(dir.path(), "cm.yaml");
    assert!(cm.contains("  name: cart-db # kpt-set: ${app}-db\n"));
    assert!(cm.contains("  host: cart-db.dev.svc # kpt-set: ${app}-db.${env}.svc\n"));
}

#[test]
fn test_config_file_drives_apply_setters() {
    let dir = setup_package();
    let config_path = dir.path().join("fn-config.toml");
    fs::write(&config_path, "[data]\napp = \"api\"\ntag = \"2.0\"\n").unwrap();

    let config = FunctionConfig::from_data(&load_data_from_path(&config_path).unwrap()).unwrap();
    let FunctionConfig::Setters(setters) = config else {
        panic!("expected setters");
    };
    let mut package = Package::load(dir.path(), Some(config_path.as_path())).unwrap();
    apply_setters(&mut package.resources, &setters).unwrap();
    package.write().unwrap();
    assert!(read(dir.path(), "base/deploy.yaml").contains("nginx:2.0"));
}

#[test]
fn test_mutation_annotation_is_written() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("job.yaml"),
        "\
apiVersion: batch/v1
kind: Job
metadata:
  name: migrate
spec:
  host: 10.0.0.1 # apply-time-mutation: ${core/namespaces/db/Service/postgres:$.spec.clusterIP}
  url: x # apply-time-mutation: postgres://${core/namespaces/db/Service/postgres:$.spec.clusterIP}:5432
",
    )
    .unwrap();

    let mut package = Package::load(dir.path(), None).unwrap();
    let report = annotate_mutations(&mut package.resources).unwrap();
    assert_eq!(report.count(), 2);
    package.write().unwrap();

    let reloaded = Package::load(dir.path(), None).unwrap();
    let annotation = reloaded.resources[0].annotation(MUTATION_ANNOTATION).unwrap();
    let entries: serde_yaml::Value = serde_yaml::from_str(annotation).unwrap();
    let entries = entries.as_sequence().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["targetPath"], "$.spec.host");
    assert!(entries[0].get("token").is_none());
    assert_eq!(entries[1]["token"], "$ref1");
    let url = reloaded.resources[0]
        .root
        .get("spec")
        .and_then(|s| s.get("url"))
        .and_then(|n| n.scalar_value())
        .unwrap();
    assert_eq!(url, "postgres://$ref1:5432");
}

#[test]
fn test_anchored_and_flow_layouts_keep_directives_on_write() {
    let dir = TempDir::new().unwrap();
    let original = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  labels: &labels
    app: web
spec:
  replicas: 3
  selector:
    matchLabels: *labels
  args: [
    --port,
    \"80\"
  ] # kpt-set: ${args}
  image: nginx:1.7.9 # kpt-set: ${image}:${tag}
";
    fs::write(dir.path().join("deploy.yaml"), original).unwrap();

    let mut package = Package::load(dir.path(), None).unwrap();
    let config = SearchReplaceConfig {
        by_value: Some("3".to_string()),
        put_value: Some("4".to_string()),
        ..Default::default()
    };
    search_replace(&mut package.resources, &config).unwrap();
    package.write().unwrap();

    let deploy = read(dir.path(), "deploy.yaml");
    assert!(deploy.contains("  labels: &labels\n"));
    assert!(deploy.contains("    matchLabels: *labels\n"));
    assert!(deploy.contains("  replicas: 4\n"));
    assert!(deploy.contains("  args: [--port, \"80\"] # kpt-set: ${args}\n"));
    assert!(deploy.contains("  image: nginx:1.7.9 # kpt-set: ${image}:${tag}\n"));

    let mut package = Package::load(dir.path(), None).unwrap();
    let setters = SetterConfig::from_data(&data(&[("tag", "1.8.0"), ("args", "[--port, \"90\"]")]));
    let report = apply_setters(&mut package.resources, &setters).unwrap();
    assert_eq!(report.count(), 2);
}

#[test]
fn test_unsupported_layout_refuses_the_package() {
    let dir = setup_package();
    let odd = "a: x # kpt-set: ${app}\n? complex\n: key\n";
    fs::write(dir.path().join("odd.yaml"), odd).unwrap();

    let err = Package::load(dir.path(), None).unwrap_err();
    assert!(err.to_string().contains("odd.yaml"), "{err}");
    assert_eq!(read(dir.path(), "odd.yaml"), odd);
}
