//! Binding suppliers for rbdedup.
//!
//! A run reads bindings either from JSON list documents on disk ([`FileSupplier`])
//! or from the live cluster ([`ClusterSupplier`]). Both hand back the same
//! [`SuppliedBindings`], one independent result per channel, so a broken
//! RoleBinding input never hides the ClusterRoleBinding findings.

mod cluster;
mod convert;
mod error;
mod file;

pub use cluster::{connect, ClusterConfig, ClusterSupplier, KubeDeleter, DEFAULT_PAGE_SIZE};
pub use convert::{from_cluster_role_binding, from_role_binding};
pub use error::{Result, SourceError};
pub use file::{decode_list, FileSupplier};

use async_trait::async_trait;
use rbdedup_engine::{Binding, BindingKind};

/// How item-level failures (malformed item, unsupported kind) are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Skip the item and log a warning
    #[default]
    Lenient,
    /// Fail the whole channel
    Strict,
}

/// Bindings read from one channel
#[derive(Debug, Clone)]
pub struct BindingCollection {
    pub channel: BindingKind,
    /// File path or cluster resource the bindings came from
    pub origin: String,
    pub bindings: Vec<Binding>,
    /// Items dropped under [`DecodePolicy::Lenient`]
    pub skipped: usize,
}

impl BindingCollection {
    pub fn new(channel: BindingKind, origin: impl Into<String>) -> Self {
        Self {
            channel,
            origin: origin.into(),
            bindings: Vec::new(),
            skipped: 0,
        }
    }

    pub(crate) fn admit(
        &mut self,
        policy: DecodePolicy,
        position: usize,
        item: Result<Binding>,
    ) -> Result<()> {
        match item {
            Ok(binding) => {
                self.bindings.push(binding);
                Ok(())
            }
            Err(err) => match policy {
                DecodePolicy::Lenient => {
                    log::warn!("skipping item #{position} in {}: {err}", self.origin);
                    self.skipped += 1;
                    Ok(())
                }
                DecodePolicy::Strict => Err(SourceError::item(
                    &self.origin,
                    position,
                    err.to_string(),
                )),
            },
        }
    }
}

/// Per-channel results of one supply call. `None` means the channel was not requested.
#[derive(Debug, Default)]
pub struct SuppliedBindings {
    pub rolebindings: Option<Result<BindingCollection>>,
    pub clusterrolebindings: Option<Result<BindingCollection>>,
}

impl SuppliedBindings {
    pub fn channel(&self, kind: BindingKind) -> Option<&Result<BindingCollection>> {
        match kind {
            BindingKind::Scoped => self.rolebindings.as_ref(),
            BindingKind::Global => self.clusterrolebindings.as_ref(),
        }
    }

    /// Separate the usable collections from the failed channels.
    pub fn split(self) -> (Vec<BindingCollection>, Vec<(BindingKind, SourceError)>) {
        let mut collections = Vec::new();
        let mut failures = Vec::new();
        for (kind, channel) in [
            (BindingKind::Scoped, self.rolebindings),
            (BindingKind::Global, self.clusterrolebindings),
        ] {
            match channel {
                Some(Ok(collection)) => collections.push(collection),
                Some(Err(err)) => failures.push((kind, err)),
                None => {}
            }
        }
        (collections, failures)
    }
}

/// Source of the raw binding inventory for a run
#[async_trait]
pub trait BindingSupplier: Send + Sync {
    /// Short human-readable description for logs
    fn describe(&self) -> String;

    async fn supply(&self) -> SuppliedBindings;
}
