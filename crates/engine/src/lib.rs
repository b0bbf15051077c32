//! # rbdedup engine
//!
//! Detects RoleBindings and ClusterRoleBindings that grant the same subject the
//! same role in the same scope more than once, and removes all but one of them.
//!
//! ## Pipeline
//!
//! ```text
//! Binding[]
//!     │
//!     ├──> Key Derivation
//!     │      └─ subject/role/namespace  (RoleBinding, one key per subject)
//!     │      └─ subject/role            (ClusterRoleBinding)
//!     │
//!     ├──> Noise Filter
//!     │      └─ drop keys matching controller-generated role suffixes
//!     │
//!     ├──> Index Builder
//!     │      └─ key -> [identity, ...] in observation order
//!     │
//!     ├──> Duplicate selection (len > 1)
//!     │      ├─ Reporter  -> DedupReport
//!     │      └─ Remover   -> delete everything but the first identity
//! ```
//!
//! ## Example
//!
//! ```
//! use rbdedup_engine::{
//!     index_bindings, Binding, NoisePolicy, RoleRef, ScopedBinding, Subject,
//! };
//!
//! let grant = |name: &str| {
//!     Binding::Scoped(ScopedBinding {
//!         name: name.to_string(),
//!         namespace: "ns".to_string(),
//!         role_ref: RoleRef::cluster_role("view"),
//!         subjects: vec![Subject::user("alice")],
//!     })
//! };
//! let bindings = vec![grant("a"), grant("b")];
//!
//! let dupes = index_bindings(&bindings, NoisePolicy::default()).select_duplicates();
//! let group = dupes.scoped.iter().next().unwrap();
//! assert_eq!(group.key().as_str(), "alice/view/ns");
//! assert_eq!(group.survivor().to_string(), "ns/a");
//! ```

mod binding;
mod error;
mod index;
mod key;
mod noise;
mod remover;
mod report;

pub use binding::{
    Binding, BindingIdentity, BindingKind, BindingRecord, GlobalBinding, RoleRef, ScopedBinding,
    Subject,
};
pub use error::{EngineError, Result};
pub use index::{
    index_bindings, DuplicateGroup, DuplicateGroups, DuplicateSet, IndexBuilder, IngestStats,
    Inventory, KeyIndex,
};
pub use key::{derive_keys, CanonicalKey};
pub use noise::{is_noise, NoisePolicy, DEFAULT_NOISE_PATTERNS};
pub use remover::{
    BindingDeleter, Disposition, FailureMode, PlannedStep, RemovalOutcome, RemovalPlan,
    RemovalReport, RemovalStatus, Remover,
};
pub use report::{render_report, totals};
