use crate::error::{EngineError, Result};
use crate::key::{self, CanonicalKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two binding resources the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BindingKind {
    /// `RoleBinding`: grant scoped to one namespace
    #[serde(rename = "rolebindings")]
    Scoped,
    /// `ClusterRoleBinding`: grant across the whole cluster
    #[serde(rename = "clusterrolebindings")]
    Global,
}

impl BindingKind {
    pub const ALL: [BindingKind; 2] = [BindingKind::Scoped, BindingKind::Global];

    /// Plural resource name, used as report key
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "rolebindings",
            Self::Global => "clusterrolebindings",
        }
    }

    /// API object kind
    #[must_use]
    pub fn resource_kind(self) -> &'static str {
        match self {
            Self::Scoped => "RoleBinding",
            Self::Global => "ClusterRoleBinding",
        }
    }

    /// Map an API object kind onto the closed set of binding kinds.
    pub fn from_resource_kind(kind: &str) -> Result<Self> {
        match kind {
            "RoleBinding" => Ok(Self::Scoped),
            "ClusterRoleBinding" => Ok(Self::Global),
            other => Err(EngineError::unsupported_kind(other)),
        }
    }

    /// Kind carried by a typed list (`RoleBindingList`), if any.
    #[must_use]
    pub fn from_list_kind(kind: &str) -> Option<Self> {
        kind.strip_suffix("List")
            .and_then(|item_kind| Self::from_resource_kind(item_kind).ok())
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable handle used to delete a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingIdentity {
    namespace: Option<String>,
    name: String,
}

impl BindingIdentity {
    pub fn scoped(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BindingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The user, group, or service account receiving a grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: "User".to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: "Group".to_string(),
            name: name.into(),
            namespace: None,
        }
    }
}

/// Reference to the Role or ClusterRole being granted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub api_group: String,
    pub kind: String,
    pub name: String,
}

impl RoleRef {
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: name.into(),
        }
    }

    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedBinding {
    pub name: String,
    pub namespace: String,
    pub role_ref: RoleRef,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalBinding {
    pub name: String,
    pub role_ref: RoleRef,
    pub subjects: Vec<Subject>,
}

/// A grant of one role to zero or more subjects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Scoped(ScopedBinding),
    Global(GlobalBinding),
}

impl Binding {
    #[must_use]
    pub fn subjects(&self) -> &[Subject] {
        match self {
            Self::Scoped(binding) => &binding.subjects,
            Self::Global(binding) => &binding.subjects,
        }
    }

    #[must_use]
    pub fn role_ref(&self) -> &RoleRef {
        match self {
            Self::Scoped(binding) => &binding.role_ref,
            Self::Global(binding) => &binding.role_ref,
        }
    }
}

impl From<ScopedBinding> for Binding {
    fn from(binding: ScopedBinding) -> Self {
        Self::Scoped(binding)
    }
}

impl From<GlobalBinding> for Binding {
    fn from(binding: GlobalBinding) -> Self {
        Self::Global(binding)
    }
}

/// What the engine needs from a binding: where it lives, how to delete it, and
/// which grants it makes.
pub trait BindingRecord {
    fn kind(&self) -> BindingKind;

    fn identity(&self) -> BindingIdentity;

    fn canonical_keys(&self) -> Vec<CanonicalKey>;
}

impl BindingRecord for ScopedBinding {
    fn kind(&self) -> BindingKind {
        BindingKind::Scoped
    }

    fn identity(&self) -> BindingIdentity {
        BindingIdentity::scoped(&self.namespace, &self.name)
    }

    fn canonical_keys(&self) -> Vec<CanonicalKey> {
        key::scoped_keys(self)
    }
}

impl BindingRecord for GlobalBinding {
    fn kind(&self) -> BindingKind {
        BindingKind::Global
    }

    fn identity(&self) -> BindingIdentity {
        BindingIdentity::global(&self.name)
    }

    fn canonical_keys(&self) -> Vec<CanonicalKey> {
        key::global_keys(self)
    }
}

impl BindingRecord for Binding {
    fn kind(&self) -> BindingKind {
        match self {
            Self::Scoped(binding) => binding.kind(),
            Self::Global(binding) => binding.kind(),
        }
    }

    fn identity(&self) -> BindingIdentity {
        match self {
            Self::Scoped(binding) => binding.identity(),
            Self::Global(binding) => binding.identity(),
        }
    }

    fn canonical_keys(&self) -> Vec<CanonicalKey> {
        match self {
            Self::Scoped(binding) => binding.canonical_keys(),
            Self::Global(binding) => binding.canonical_keys(),
        }
    }
}
