use pretty_assertions::assert_eq;
use rbdedup_engine::{index_bindings, NoisePolicy};
use rbdedup_source::{BindingSupplier, DecodePolicy, FileSupplier};
use std::fs;
use tempfile::tempdir;

// Trimmed `kubectl get rolebindings -A -o json` output.
const ROLEBINDINGS: &str = r#"{
    "apiVersion": "v1",
    "items": [
        {
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": {
                "creationTimestamp": "2023-04-11T09:12:01Z",
                "name": "u-7xk2p-view",
                "namespace": "shop",
                "resourceVersion": "18811",
                "uid": "5f1d8a52-0a7e-4b77-9d53-4a9c70c8c2a1"
            },
            "roleRef": { "apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "view" },
            "subjects": [{ "apiGroup": "rbac.authorization.k8s.io", "kind": "User", "name": "u-7xk2p" }]
        },
        {
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": { "name": "rb-9qz4m", "namespace": "shop" },
            "roleRef": { "apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "view" },
            "subjects": [{ "apiGroup": "rbac.authorization.k8s.io", "kind": "User", "name": "u-7xk2p" }]
        },
        {
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": { "name": "deployer", "namespace": "shop" },
            "roleRef": { "apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": "deploy" },
            "subjects": [
                { "kind": "ServiceAccount", "name": "ci", "namespace": "tools" },
                { "apiGroup": "rbac.authorization.k8s.io", "kind": "Group", "name": "release" }
            ]
        },
        {
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": { "name": "p-abc-member", "namespace": "shop" },
            "roleRef": { "apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "p-abc-projectmember" },
            "subjects": [{ "apiGroup": "rbac.authorization.k8s.io", "kind": "User", "name": "u-7xk2p" }]
        }
    ],
    "kind": "List",
    "metadata": { "resourceVersion": "" }
}"#;

#[tokio::test]
async fn kubectl_export_feeds_the_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rbs.json");
    fs::write(&path, ROLEBINDINGS).unwrap();

    let supplied = FileSupplier::new()
        .with_rolebindings(&path)
        .with_policy(DecodePolicy::Strict)
        .supply()
        .await;
    let (collections, failures) = supplied.split();
    assert!(failures.is_empty());
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].bindings.len(), 4);
    assert_eq!(collections[0].skipped, 0);

    let inventory = index_bindings(&collections[0].bindings, NoisePolicy::default());
    let dupes = inventory.select_duplicates();
    let groups: Vec<(String, Vec<String>)> = dupes
        .scoped
        .iter()
        .map(|group| {
            (
                group.key().to_string(),
                group.members().iter().map(ToString::to_string).collect(),
            )
        })
        .collect();
    assert_eq!(
        groups,
        vec![(
            "u-7xk2p/view/shop".to_string(),
            vec!["shop/u-7xk2p-view".to_string(), "shop/rb-9qz4m".to_string()]
        )]
    );
    assert!(dupes.global.is_empty());
}
