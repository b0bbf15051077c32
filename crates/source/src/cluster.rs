use crate::convert::{from_cluster_role_binding, from_role_binding};
use crate::error::{Result, SourceError};
use crate::{BindingCollection, BindingSupplier, DecodePolicy, SuppliedBindings};
use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::api::{Api, DeleteParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use rbdedup_engine::{Binding, BindingDeleter, BindingIdentity, BindingKind, EngineError};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 500;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach the cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Explicit kubeconfig; `None` infers (KUBECONFIG, ~/.kube/config, in-cluster)
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub timeout: Duration,
    pub insecure_skip_tls_verify: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            timeout: DEFAULT_TIMEOUT,
            insecure_skip_tls_verify: false,
        }
    }
}

/// Build a client from `config`.
pub async fn connect(config: &ClusterConfig) -> Result<Client> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        cluster: None,
        user: None,
    };

    let mut client_config = match (&config.kubeconfig, &config.context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                SourceError::connect(format!("cannot load kubeconfig {}: {e}", path.display()))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| SourceError::connect(e.to_string()))?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .map_err(|e| SourceError::connect(e.to_string()))?,
        (None, None) => Config::infer()
            .await
            .map_err(|e| SourceError::connect(e.to_string()))?,
    };

    client_config.connect_timeout = Some(config.timeout);
    client_config.read_timeout = Some(config.timeout);
    client_config.write_timeout = Some(config.timeout);
    if config.insecure_skip_tls_verify {
        log::warn!("TLS verification disabled for {}", client_config.cluster_url);
        client_config.accept_invalid_certs = true;
    }
    log::debug!("connecting to {}", client_config.cluster_url);

    Client::try_from(client_config).map_err(|e| SourceError::connect(e.to_string()))
}

/// Lists both binding kinds across the whole cluster.
#[derive(Clone)]
pub struct ClusterSupplier {
    client: Client,
    page_size: u32,
    policy: DecodePolicy,
}

impl ClusterSupplier {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
            policy: DecodePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn list_rolebindings(&self) -> Result<BindingCollection> {
        let api: Api<RoleBinding> = Api::all(self.client.clone());
        let items = list_all(&api, self.page_size, BindingKind::Scoped).await?;
        collect(BindingKind::Scoped, items, from_role_binding, self.policy)
    }

    pub async fn list_clusterrolebindings(&self) -> Result<BindingCollection> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        let items = list_all(&api, self.page_size, BindingKind::Global).await?;
        collect(BindingKind::Global, items, from_cluster_role_binding, self.policy)
    }
}

#[async_trait]
impl BindingSupplier for ClusterSupplier {
    fn describe(&self) -> String {
        "cluster".to_string()
    }

    async fn supply(&self) -> SuppliedBindings {
        SuppliedBindings {
            rolebindings: Some(self.list_rolebindings().await),
            clusterrolebindings: Some(self.list_clusterrolebindings().await),
        }
    }
}

/// Follow continue tokens until the listing is exhausted. Pages are fetched one at a time.
async fn list_all<K>(api: &Api<K>, page_size: u32, kind: BindingKind) -> Result<Vec<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut items = Vec::new();
    let mut params = ListParams::default().limit(page_size);
    let mut pages = 0usize;
    loop {
        let page = api.list(&params).await.map_err(|e| SourceError::List {
            kind,
            message: e.to_string(),
        })?;
        pages += 1;
        items.extend(page.items);
        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => params = params.continue_token(&token),
            _ => break,
        }
    }
    log::info!("listed {} {kind} in {pages} page(s)", items.len());
    Ok(items)
}

fn collect<K>(
    kind: BindingKind,
    items: Vec<K>,
    convert: fn(K) -> Result<Binding>,
    policy: DecodePolicy,
) -> Result<BindingCollection> {
    let mut collection = BindingCollection::new(kind, format!("cluster {kind}"));
    for (position, item) in items.into_iter().enumerate() {
        collection.admit(policy, position, convert(item))?;
    }
    Ok(collection)
}

/// Deletes RoleBindings by namespace and name, ClusterRoleBindings by name.
#[derive(Clone)]
pub struct KubeDeleter {
    client: Client,
}

impl KubeDeleter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BindingDeleter for KubeDeleter {
    async fn delete(
        &self,
        kind: BindingKind,
        identity: &BindingIdentity,
    ) -> rbdedup_engine::Result<()> {
        let params = DeleteParams::default();
        let deleted = match (kind, identity.namespace()) {
            (BindingKind::Scoped, Some(namespace)) => {
                Api::<RoleBinding>::namespaced(self.client.clone(), namespace)
                    .delete(identity.name(), &params)
                    .await
                    .map(|_| ())
            }
            (BindingKind::Scoped, None) => {
                return Err(EngineError::InvalidIdentity(format!(
                    "{kind} {identity} has no namespace"
                )))
            }
            (BindingKind::Global, _) => Api::<ClusterRoleBinding>::all(self.client.clone())
                .delete(identity.name(), &params)
                .await
                .map(|_| ()),
        };
        deleted.map_err(|e| EngineError::backend(e.to_string()))
    }
}
