use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical key -> binding identities, in the order they were observed.
pub type GroupListing = BTreeMap<String, Vec<String>>;

/// Granularity of the rendered dedup document.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Duplicate groups with their identities
    #[default]
    Dupes,
    /// Group and excess-binding counts per kind
    Totals,
    /// Unfiltered index plus the duplicate listing
    All,
}

impl OutputMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dupes => "dupes",
            Self::Totals => "totals",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct KindListing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolebindings: Option<GroupListing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusterrolebindings: Option<GroupListing>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTotals {
    /// Number of duplicate groups
    pub groups: usize,
    /// Bindings beyond the survivor, summed over all groups
    pub excess_bindings: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub rolebindings: KindTotals,
    pub clusterrolebindings: KindTotals,
}

/// The document written to stdout by `rbdedup dedupe`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<KindListing>,
    #[serde(flatten)]
    pub duplicates: KindListing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Totals>,
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
