use crate::binding::{Binding, BindingRecord, GlobalBinding, ScopedBinding};
use serde::Serialize;
use std::fmt;

const KEY_SEPARATOR: &str = "/";

/// Dedup equivalence key: `subject/role/namespace` for RoleBindings,
/// `subject/role` for ClusterRoleBindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    #[must_use]
    pub fn scoped(subject: &str, role: &str, namespace: &str) -> Self {
        Self([subject, role, namespace].join(KEY_SEPARATOR))
    }

    #[must_use]
    pub fn global(subject: &str, role: &str) -> Self {
        Self([subject, role].join(KEY_SEPARATOR))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One key per subject; a binding without subjects yields none.
#[must_use]
pub fn derive_keys(binding: &Binding) -> Vec<CanonicalKey> {
    binding.canonical_keys()
}

pub(crate) fn scoped_keys(binding: &ScopedBinding) -> Vec<CanonicalKey> {
    let role = binding.role_ref.name.as_str();
    binding
        .subjects
        .iter()
        .map(|subject| CanonicalKey::scoped(&subject.name, role, &binding.namespace))
        .collect()
}

pub(crate) fn global_keys(binding: &GlobalBinding) -> Vec<CanonicalKey> {
    let role = binding.role_ref.name.as_str();
    binding
        .subjects
        .iter()
        .map(|subject| CanonicalKey::global(&subject.name, role))
        .collect()
}
