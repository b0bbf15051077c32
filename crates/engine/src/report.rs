use crate::binding::BindingKind;
use crate::index::{DuplicateGroups, DuplicateSet, Inventory, KeyIndex};
use rbdedup_protocol::{DedupReport, GroupListing, KindListing, KindTotals, OutputMode, Totals};

/// Build the document for `mode`, or `None` when neither kind has a duplicate group.
#[must_use]
pub fn render_report(
    inventory: &Inventory,
    duplicates: &DuplicateSet,
    mode: OutputMode,
) -> Option<DedupReport> {
    for kind in BindingKind::ALL {
        if duplicates.groups(kind).is_empty() {
            log::debug!("no duplicate {kind} found");
        }
    }
    if duplicates.is_empty() {
        return None;
    }

    let report = match mode {
        OutputMode::Dupes => DedupReport {
            duplicates: duplicate_listing(duplicates),
            ..Default::default()
        },
        OutputMode::Totals => DedupReport {
            totals: Some(totals(duplicates)),
            ..Default::default()
        },
        OutputMode::All => DedupReport {
            index: Some(KindListing {
                rolebindings: non_empty(index_listing(inventory.index(BindingKind::Scoped))),
                clusterrolebindings: non_empty(index_listing(
                    inventory.index(BindingKind::Global),
                )),
            }),
            duplicates: duplicate_listing(duplicates),
            totals: None,
        },
    };
    Some(report)
}

#[must_use]
pub fn totals(duplicates: &DuplicateSet) -> Totals {
    Totals {
        rolebindings: kind_totals(&duplicates.scoped),
        clusterrolebindings: kind_totals(&duplicates.global),
    }
}

fn kind_totals(groups: &DuplicateGroups) -> KindTotals {
    KindTotals {
        groups: groups.len(),
        excess_bindings: groups.excess_bindings(),
    }
}

fn duplicate_listing(duplicates: &DuplicateSet) -> KindListing {
    KindListing {
        rolebindings: non_empty(group_listing(&duplicates.scoped)),
        clusterrolebindings: non_empty(group_listing(&duplicates.global)),
    }
}

fn group_listing(groups: &DuplicateGroups) -> GroupListing {
    groups
        .iter()
        .map(|group| {
            (
                group.key().to_string(),
                group.members().iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

fn index_listing(index: &KeyIndex) -> GroupListing {
    index
        .iter()
        .map(|(key, ids)| (key.to_string(), ids.iter().map(ToString::to_string).collect()))
        .collect()
}

fn non_empty(listing: GroupListing) -> Option<GroupListing> {
    (!listing.is_empty()).then_some(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, GlobalBinding, RoleRef, ScopedBinding, Subject};
    use crate::index::index_bindings;
    use crate::noise::NoisePolicy;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rb(name: &str, role: &str, subject: &str) -> Binding {
        Binding::Scoped(ScopedBinding {
            name: name.to_string(),
            namespace: "ns".to_string(),
            role_ref: RoleRef::cluster_role(role),
            subjects: vec![Subject::user(subject)],
        })
    }

    fn crb(name: &str, role: &str, subject: &str) -> Binding {
        Binding::Global(GlobalBinding {
            name: name.to_string(),
            role_ref: RoleRef::cluster_role(role),
            subjects: vec![Subject::user(subject)],
        })
    }

    fn render(bindings: &[Binding], mode: OutputMode) -> Option<serde_json::Value> {
        let inventory = index_bindings(bindings, NoisePolicy::default());
        let dupes = inventory.select_duplicates();
        render_report(&inventory, &dupes, mode).map(|r| serde_json::to_value(r).unwrap())
    }

    fn sample() -> Vec<Binding> {
        vec![
            rb("a", "view", "alice"),
            rb("b", "view", "alice"),
            rb("c", "edit", "carol"),
        ]
    }

    #[test]
    fn dupes_mode_lists_groups_per_kind() {
        assert_eq!(
            render(&sample(), OutputMode::Dupes),
            Some(json!({ "rolebindings": { "alice/view/ns": ["ns/a", "ns/b"] } }))
        );
    }

    #[test]
    fn totals_mode_counts_groups_and_excess() {
        let mut bindings = sample();
        bindings.extend([
            crb("x", "admin", "bob"),
            crb("y", "admin", "bob"),
            crb("z", "admin", "bob"),
        ]);
        assert_eq!(
            render(&bindings, OutputMode::Totals),
            Some(json!({
                "totals": {
                    "rolebindings": { "groups": 1, "excess_bindings": 1 },
                    "clusterrolebindings": { "groups": 1, "excess_bindings": 2 }
                }
            }))
        );
    }

    #[test]
    fn all_mode_includes_the_unfiltered_index() {
        assert_eq!(
            render(&sample(), OutputMode::All),
            Some(json!({
                "index": {
                    "rolebindings": {
                        "alice/view/ns": ["ns/a", "ns/b"],
                        "carol/edit/ns": ["ns/c"]
                    }
                },
                "rolebindings": { "alice/view/ns": ["ns/a", "ns/b"] }
            }))
        );
    }

    #[test]
    fn nothing_is_rendered_without_duplicates() {
        let bindings = vec![rb("a", "view", "alice"), rb("b", "view-projectmember", "alice")];
        for mode in [OutputMode::Dupes, OutputMode::Totals, OutputMode::All] {
            assert_eq!(render(&bindings, mode), None);
        }
    }
}
