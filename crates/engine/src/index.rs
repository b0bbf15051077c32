use crate::binding::{Binding, BindingIdentity, BindingKind, BindingRecord};
use crate::key::CanonicalKey;
use crate::noise::NoisePolicy;
use std::collections::BTreeMap;

/// Counters gathered while ingesting bindings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Bindings ingested
    pub bindings: usize,

    /// Keys derived before noise filtering
    pub keys: usize,

    /// Keys dropped by the noise policy
    pub noise_keys: usize,

    /// Bindings naming more than one subject
    pub multi_subject: usize,

    /// Bindings naming no subject at all
    pub without_subjects: usize,

    /// (key, identity) pairs seen more than once
    pub repeated_entries: usize,
}

/// Canonical key -> identities for one binding kind, before duplicate selection.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    kind: BindingKind,
    entries: BTreeMap<CanonicalKey, Vec<BindingIdentity>>,
}

impl KeyIndex {
    fn new(kind: BindingKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &CanonicalKey) -> Option<&[BindingIdentity]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalKey, &[BindingIdentity])> {
        self.entries.iter().map(|(key, ids)| (key, ids.as_slice()))
    }

    /// Keys held by more than one binding.
    #[must_use]
    pub fn select_duplicates(&self) -> DuplicateGroups {
        let groups = self
            .entries
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| DuplicateGroup {
                key: key.clone(),
                members: ids.clone(),
            })
            .collect();
        DuplicateGroups {
            kind: self.kind,
            groups,
        }
    }
}

/// Identities sharing one canonical key. Always holds at least two members; the
/// first one is the survivor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    key: CanonicalKey,
    members: Vec<BindingIdentity>,
}

impl DuplicateGroup {
    #[must_use]
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    #[must_use]
    pub fn members(&self) -> &[BindingIdentity] {
        &self.members
    }

    #[must_use]
    pub fn survivor(&self) -> &BindingIdentity {
        &self.members[0]
    }

    #[must_use]
    pub fn redundant(&self) -> &[BindingIdentity] {
        &self.members[1..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateGroups {
    kind: BindingKind,
    groups: Vec<DuplicateGroup>,
}

impl DuplicateGroups {
    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter()
    }

    #[must_use]
    pub fn get(&self, key: &CanonicalKey) -> Option<&DuplicateGroup> {
        self.groups.iter().find(|group| group.key() == key)
    }

    /// Sum over groups of `size - 1`
    #[must_use]
    pub fn excess_bindings(&self) -> usize {
        self.groups.iter().map(|group| group.redundant().len()).sum()
    }
}

/// Duplicate groups of both kinds
#[derive(Debug, Clone)]
pub struct DuplicateSet {
    pub scoped: DuplicateGroups,
    pub global: DuplicateGroups,
}

impl DuplicateSet {
    #[must_use]
    pub fn groups(&self, kind: BindingKind) -> &DuplicateGroups {
        match kind {
            BindingKind::Scoped => &self.scoped,
            BindingKind::Global => &self.global,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.global.is_empty()
    }
}

/// Result of ingesting every binding of a run
#[derive(Debug, Clone)]
pub struct Inventory {
    scoped: KeyIndex,
    global: KeyIndex,
    stats: IngestStats,
}

impl Inventory {
    #[must_use]
    pub fn index(&self, kind: BindingKind) -> &KeyIndex {
        match kind {
            BindingKind::Scoped => &self.scoped,
            BindingKind::Global => &self.global,
        }
    }

    #[must_use]
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    #[must_use]
    pub fn select_duplicates(&self) -> DuplicateSet {
        DuplicateSet {
            scoped: self.scoped.select_duplicates(),
            global: self.global.select_duplicates(),
        }
    }
}

/// Accumulates canonical keys into per-kind indexes.
///
/// Bindings are routed by their own kind, so a ClusterRoleBinding found in a
/// RoleBinding input still lands in the cluster index.
pub struct IndexBuilder {
    policy: NoisePolicy,
    scoped: KeyIndex,
    global: KeyIndex,
    stats: IngestStats,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(policy: NoisePolicy) -> Self {
        Self {
            policy,
            scoped: KeyIndex::new(BindingKind::Scoped),
            global: KeyIndex::new(BindingKind::Global),
            stats: IngestStats::default(),
        }
    }

    /// Append `identity` to `key`'s sequence. Returns false if the identity is
    /// already recorded under that key.
    pub fn record(
        &mut self,
        kind: BindingKind,
        key: CanonicalKey,
        identity: BindingIdentity,
    ) -> bool {
        let index = match kind {
            BindingKind::Scoped => &mut self.scoped,
            BindingKind::Global => &mut self.global,
        };
        let ids = index.entries.entry(key).or_default();
        if ids.contains(&identity) {
            self.stats.repeated_entries += 1;
            return false;
        }
        ids.push(identity);
        true
    }

    /// Derive keys, drop noise, record the rest. Returns the number of keys recorded.
    pub fn ingest(&mut self, binding: &Binding) -> usize {
        let kind = binding.kind();
        let identity = binding.identity();
        let keys = binding.canonical_keys();

        self.stats.bindings += 1;
        self.stats.keys += keys.len();
        match keys.len() {
            0 => {
                self.stats.without_subjects += 1;
                log::debug!("{kind} {identity} has no subjects");
            }
            1 => {}
            n => {
                self.stats.multi_subject += 1;
                log::debug!("{kind} {identity} has {n} subjects");
            }
        }

        let mut recorded = 0;
        for key in keys {
            if self.policy.is_noise(kind, &key) {
                self.stats.noise_keys += 1;
                continue;
            }
            if self.record(kind, key, identity.clone()) {
                recorded += 1;
            }
        }
        recorded
    }

    pub fn ingest_all<'a, I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = &'a Binding>,
    {
        for binding in bindings {
            self.ingest(binding);
        }
    }

    #[must_use]
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    #[must_use]
    pub fn finalize(self) -> Inventory {
        log::debug!(
            "Indexed {} bindings: {} keys, {} noise, {} rolebinding keys, {} clusterrolebinding keys",
            self.stats.bindings,
            self.stats.keys,
            self.stats.noise_keys,
            self.scoped.len(),
            self.global.len()
        );
        Inventory {
            scoped: self.scoped,
            global: self.global,
            stats: self.stats,
        }
    }
}

/// Index `bindings` under `policy` in one pass.
#[must_use]
pub fn index_bindings<'a, I>(bindings: I, policy: NoisePolicy) -> Inventory
where
    I: IntoIterator<Item = &'a Binding>,
{
    let mut builder = IndexBuilder::new(policy);
    builder.ingest_all(bindings);
    builder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{GlobalBinding, RoleRef, ScopedBinding, Subject};
    use pretty_assertions::assert_eq;

    fn rb(namespace: &str, name: &str, role: &str, subjects: &[&str]) -> Binding {
        Binding::Scoped(ScopedBinding {
            name: name.to_string(),
            namespace: namespace.to_string(),
            role_ref: RoleRef::cluster_role(role),
            subjects: subjects.iter().map(|s| Subject::user(*s)).collect(),
        })
    }

    fn crb(name: &str, role: &str, subjects: &[&str]) -> Binding {
        Binding::Global(GlobalBinding {
            name: name.to_string(),
            role_ref: RoleRef::cluster_role(role),
            subjects: subjects.iter().map(|s| Subject::user(*s)).collect(),
        })
    }

    fn ids(group: &DuplicateGroup) -> Vec<String> {
        group.members().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn two_bindings_with_same_grant_form_a_group() {
        let bindings = vec![
            rb("ns", "a", "view", &["alice"]),
            rb("ns", "b", "view", &["alice"]),
        ];
        let dupes = index_bindings(&bindings, NoisePolicy::default()).select_duplicates();

        assert_eq!(dupes.scoped.len(), 1);
        assert!(dupes.global.is_empty());
        let group = dupes
            .scoped
            .get(&CanonicalKey::scoped("alice", "view", "ns"))
            .unwrap();
        assert_eq!(ids(group), vec!["ns/a", "ns/b"]);
        assert_eq!(group.survivor().to_string(), "ns/a");
        assert_eq!(dupes.scoped.excess_bindings(), 1);
    }

    #[test]
    fn single_binding_keys_never_surface() {
        let bindings = vec![
            rb("ns", "a", "view", &["alice"]),
            rb("other", "a", "view", &["alice"]),
            crb("a", "view", &["alice"]),
        ];
        let inventory = index_bindings(&bindings, NoisePolicy::default());
        assert_eq!(inventory.index(BindingKind::Scoped).len(), 2);
        assert_eq!(inventory.index(BindingKind::Global).len(), 1);
        assert!(inventory.select_duplicates().is_empty());
    }

    #[test]
    fn noise_keys_are_never_grouped() {
        let bindings: Vec<_> = (0..5)
            .map(|i| rb("ns", &format!("b{i}"), "p-1-projectmember", &["u-1"]))
            .collect();
        let inventory = index_bindings(&bindings, NoisePolicy::default());

        assert!(inventory.index(BindingKind::Scoped).is_empty());
        assert!(inventory.select_duplicates().is_empty());
        assert_eq!(inventory.stats().noise_keys, 5);
    }

    #[test]
    fn multi_subject_binding_joins_several_groups() {
        let bindings = vec![
            rb("ns", "both", "edit", &["alice", "bob"]),
            rb("ns", "alice-only", "edit", &["alice"]),
            rb("ns", "bob-only", "edit", &["bob"]),
        ];
        let inventory = index_bindings(&bindings, NoisePolicy::default());
        let dupes = inventory.select_duplicates();

        assert_eq!(dupes.scoped.len(), 2);
        for group in dupes.scoped.iter() {
            assert_eq!(group.survivor().to_string(), "ns/both");
        }
        assert_eq!(inventory.stats().multi_subject, 1);
    }

    #[test]
    fn insertion_order_decides_the_survivor() {
        let bindings = vec![
            crb("zz-late-name", "admin", &["bob"]),
            crb("aa-early-name", "admin", &["bob"]),
        ];
        let dupes = index_bindings(&bindings, NoisePolicy::default()).select_duplicates();
        let group = dupes.global.iter().next().unwrap();
        assert_eq!(ids(group), vec!["zz-late-name", "aa-early-name"]);
    }

    #[test]
    fn repeated_identity_does_not_make_a_duplicate() {
        let bindings = vec![
            rb("ns", "a", "view", &["alice", "alice"]),
            rb("ns", "b", "edit", &["carol"]),
            rb("ns", "b", "edit", &["carol"]),
        ];
        let inventory = index_bindings(&bindings, NoisePolicy::default());
        assert!(inventory.select_duplicates().is_empty());
        assert_eq!(inventory.stats().repeated_entries, 2);
    }

    #[test]
    fn bindings_route_by_their_own_kind() {
        let mut builder = IndexBuilder::new(NoisePolicy::empty());
        builder.ingest(&crb("x", "admin", &["bob"]));
        builder.ingest(&crb("y", "admin", &["bob"]));
        builder.ingest(&rb("ns", "z", "admin", &[]));
        assert_eq!(builder.stats().without_subjects, 1);

        let inventory = builder.finalize();
        assert!(inventory.index(BindingKind::Scoped).is_empty());
        assert_eq!(inventory.select_duplicates().global.len(), 1);
    }

    #[test]
    fn detection_is_repeatable() {
        let bindings = vec![
            rb("ns", "a", "view", &["alice", "bob"]),
            rb("ns", "b", "view", &["alice"]),
            rb("ns", "c", "view", &["bob"]),
            crb("x", "admin", &["bob"]),
            crb("y", "admin", &["bob"]),
        ];
        let first = index_bindings(&bindings, NoisePolicy::default()).select_duplicates();
        let second = index_bindings(&bindings, NoisePolicy::default()).select_duplicates();
        for kind in BindingKind::ALL {
            let a: Vec<_> = first.groups(kind).iter().cloned().collect();
            let b: Vec<_> = second.groups(kind).iter().cloned().collect();
            assert_eq!(a, b);
        }
    }
}
