use crate::convert::{from_cluster_role_binding, from_role_binding};
use crate::error::{Result, SourceError};
use crate::{BindingCollection, BindingSupplier, DecodePolicy, SuppliedBindings};
use async_trait::async_trait;
use k8s_openapi::api::rbac::v1 as rbac;
use rbdedup_engine::{Binding, BindingKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Reads `kubectl get ... -o json` style list documents, one per channel.
#[derive(Debug, Clone, Default)]
pub struct FileSupplier {
    rolebindings: Option<PathBuf>,
    clusterrolebindings: Option<PathBuf>,
    policy: DecodePolicy,
}

impl FileSupplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rolebindings(mut self, path: impl Into<PathBuf>) -> Self {
        self.rolebindings = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_clusterrolebindings(mut self, path: impl Into<PathBuf>) -> Self {
        self.clusterrolebindings = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self, channel: BindingKind) -> Option<&Path> {
        match channel {
            BindingKind::Scoped => self.rolebindings.as_deref(),
            BindingKind::Global => self.clusterrolebindings.as_deref(),
        }
    }

    async fn read_channel(&self, channel: BindingKind) -> Option<Result<BindingCollection>> {
        let path = self.path(channel)?;
        Some(read_list(path, channel, self.policy).await)
    }
}

#[async_trait]
impl BindingSupplier for FileSupplier {
    fn describe(&self) -> String {
        let paths: Vec<String> = BindingKind::ALL
            .into_iter()
            .filter_map(|kind| self.path(kind))
            .map(|path| path.display().to_string())
            .collect();
        format!("files [{}]", paths.join(", "))
    }

    async fn supply(&self) -> SuppliedBindings {
        SuppliedBindings {
            rolebindings: self.read_channel(BindingKind::Scoped).await,
            clusterrolebindings: self.read_channel(BindingKind::Global).await,
        }
    }
}

async fn read_list(
    path: &Path,
    channel: BindingKind,
    policy: DecodePolicy,
) -> Result<BindingCollection> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let collection = decode_list(&bytes, path, channel, policy)?;
    log::info!(
        "read {} {channel} from {} ({} skipped)",
        collection.bindings.len(),
        path.display(),
        collection.skipped
    );
    Ok(collection)
}

/// Decode a `List` (or typed `RoleBindingList` / `ClusterRoleBindingList`) document.
///
/// An item without `kind` takes the typed list's item kind, else `channel`'s.
pub fn decode_list(
    bytes: &[u8],
    path: &Path,
    channel: BindingKind,
    policy: DecodePolicy,
) -> Result<BindingCollection> {
    let decode_err = |message: String| SourceError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let document: Value = serde_json::from_slice(bytes).map_err(|e| decode_err(e.to_string()))?;
    let Value::Object(mut document) = document else {
        return Err(decode_err("expected a JSON object".to_string()));
    };
    let items = match document.remove("items") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) => Vec::new(),
        Some(_) => return Err(decode_err("`items` is not an array".to_string())),
        None => return Err(decode_err("expected a list document with `items`".to_string())),
    };
    let list_kind = document
        .get("kind")
        .and_then(Value::as_str)
        .and_then(BindingKind::from_list_kind);
    let default_kind = list_kind.unwrap_or(channel);

    let mut collection = BindingCollection::new(channel, path.display().to_string());
    for (position, item) in items.into_iter().enumerate() {
        let decoded = decode_item(item, default_kind);
        collection.admit(policy, position, decoded)?;
    }
    Ok(collection)
}

fn decode_item(item: Value, default_kind: BindingKind) -> Result<Binding> {
    let Value::Object(mut fields) = item else {
        return Err(SourceError::Malformed("item is not an object".to_string()));
    };

    let kind = match fields.remove("kind") {
        Some(Value::String(kind)) if !kind.is_empty() => BindingKind::from_resource_kind(&kind)?,
        _ => default_kind,
    };
    // apiVersion is not checked: v1beta1 exports decode as v1.
    fields.remove("apiVersion");

    let item = Value::Object(fields);
    let malformed = |e: serde_json::Error| {
        SourceError::Malformed(format!("malformed {}: {e}", kind.resource_kind()))
    };
    match kind {
        BindingKind::Scoped => {
            let rb: rbac::RoleBinding = serde_json::from_value(item).map_err(malformed)?;
            from_role_binding(rb)
        }
        BindingKind::Global => {
            let crb: rbac::ClusterRoleBinding = serde_json::from_value(item).map_err(malformed)?;
            from_cluster_role_binding(crb)
        }
    }
}
