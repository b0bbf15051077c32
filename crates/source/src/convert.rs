//! Normalization of API objects into engine bindings.

use crate::error::{Result, SourceError};
use k8s_openapi::api::rbac::v1 as rbac;
use rbdedup_engine::{Binding, BindingKind, GlobalBinding, RoleRef, ScopedBinding, Subject};

/// `RoleBinding` -> [`Binding::Scoped`]. Name, namespace, role name and subject names are required.
pub fn from_role_binding(rb: rbac::RoleBinding) -> Result<Binding> {
    let kind = BindingKind::Scoped;
    let name = required(rb.metadata.name, kind, "name")?;
    let namespace = required(rb.metadata.namespace, kind, "namespace")?;
    Ok(Binding::Scoped(ScopedBinding {
        role_ref: role_ref(rb.role_ref, kind, &name)?,
        subjects: subjects(rb.subjects, kind, &name)?,
        name,
        namespace,
    }))
}

/// `ClusterRoleBinding` -> [`Binding::Global`]. A namespace on the object is ignored.
pub fn from_cluster_role_binding(crb: rbac::ClusterRoleBinding) -> Result<Binding> {
    let kind = BindingKind::Global;
    let name = required(crb.metadata.name, kind, "name")?;
    Ok(Binding::Global(GlobalBinding {
        role_ref: role_ref(crb.role_ref, kind, &name)?,
        subjects: subjects(crb.subjects, kind, &name)?,
        name,
    }))
}

fn required(value: Option<String>, kind: BindingKind, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(SourceError::MissingMetadata { kind, field })
}

// Absent required fields deserialize as empty strings; an empty role or
// subject name would otherwise collapse into keys like `alice//ns`.
fn role_ref(r: rbac::RoleRef, kind: BindingKind, binding: &str) -> Result<RoleRef> {
    if r.name.is_empty() {
        return Err(SourceError::Malformed(format!(
            "{kind} {binding}: roleRef has no name"
        )));
    }
    Ok(RoleRef {
        api_group: r.api_group,
        kind: r.kind,
        name: r.name,
    })
}

fn subjects(
    subjects: Option<Vec<rbac::Subject>>,
    kind: BindingKind,
    binding: &str,
) -> Result<Vec<Subject>> {
    subjects
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(position, s)| {
            if s.name.is_empty() {
                return Err(SourceError::Malformed(format!(
                    "{kind} {binding}: subject #{position} has no name"
                )));
            }
            Ok(Subject {
                kind: s.kind,
                name: s.name,
                namespace: s.namespace,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use pretty_assertions::assert_eq;
    use rbdedup_engine::BindingRecord;

    fn meta(namespace: Option<&str>, name: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: name.map(str::to_string),
            namespace: namespace.map(str::to_string),
            ..Default::default()
        }
    }

    fn view_ref() -> rbac::RoleRef {
        rbac::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: "view".to_string(),
        }
    }

    fn user(name: &str) -> rbac::Subject {
        rbac::Subject {
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            kind: "User".to_string(),
            name: name.to_string(),
            namespace: None,
        }
    }

    #[test]
    fn role_binding_keeps_identity_and_subjects() {
        let binding = from_role_binding(rbac::RoleBinding {
            metadata: meta(Some("ns"), Some("a")),
            role_ref: view_ref(),
            subjects: Some(vec![user("alice"), user("bob")]),
        })
        .unwrap();

        assert_eq!(binding.kind(), BindingKind::Scoped);
        assert_eq!(binding.identity().to_string(), "ns/a");
        let keys: Vec<_> = binding
            .canonical_keys()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, vec!["alice/view/ns", "bob/view/ns"]);
    }

    #[test]
    fn role_binding_without_namespace_is_rejected() {
        let err = from_role_binding(rbac::RoleBinding {
            metadata: meta(None, Some("a")),
            role_ref: view_ref(),
            subjects: None,
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rolebindings object without metadata.namespace"
        );
    }

    #[test]
    fn cluster_role_binding_without_subjects_has_no_keys() {
        let binding = from_cluster_role_binding(rbac::ClusterRoleBinding {
            metadata: meta(None, Some("crb")),
            role_ref: view_ref(),
            subjects: None,
        })
        .unwrap();
        assert_eq!(binding.identity().to_string(), "crb");
        assert!(binding.canonical_keys().is_empty());

        assert!(from_cluster_role_binding(rbac::ClusterRoleBinding {
            metadata: meta(None, Some("")),
            role_ref: view_ref(),
            subjects: None,
        })
        .is_err());
    }

    #[test]
    fn subject_without_name_is_rejected() {
        let err = from_role_binding(rbac::RoleBinding {
            metadata: meta(Some("ns"), Some("a")),
            role_ref: view_ref(),
            subjects: Some(vec![user("alice"), user("")]),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "rolebindings a: subject #1 has no name");
    }

    #[test]
    fn role_ref_without_name_is_rejected() {
        let err = from_cluster_role_binding(rbac::ClusterRoleBinding {
            metadata: meta(None, Some("crb")),
            role_ref: rbac::RoleRef::default(),
            subjects: Some(vec![user("alice")]),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "clusterrolebindings crb: roleRef has no name");
    }
}
