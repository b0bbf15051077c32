use crate::binding::BindingKind;
use crate::error::{EngineError, Result};
use crate::key::CanonicalKey;
use serde::Deserialize;
use std::path::Path;

/// Suffixes appended by the project/cluster membership controller to the roles it
/// provisions per user. Those bindings repeat legitimately.
pub const DEFAULT_NOISE_PATTERNS: [&str; 4] = [
    "-projectmember",
    "-projectowner",
    "-clustermember",
    "-clusterowner",
];

/// True if `key` contains any of `patterns`.
#[must_use]
pub fn is_noise<S: AsRef<str>>(key: &str, patterns: &[S]) -> bool {
    patterns
        .iter()
        .any(|pattern| key.contains(pattern.as_ref()))
}

/// Substring patterns, per binding kind, whose keys are never reported.
///
/// The default applies all four membership suffixes to both kinds even though the
/// `-project*` roles only ever back RoleBindings and the `-cluster*` roles only
/// ClusterRoleBindings. Narrowing it is a configuration change, not a code change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoisePolicy {
    scoped: Vec<String>,
    global: Vec<String>,
}

impl Default for NoisePolicy {
    fn default() -> Self {
        Self::uniform(DEFAULT_NOISE_PATTERNS)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNoiseConfig {
    /// Replaces the pattern set of both kinds
    patterns: Option<Vec<String>>,
    rolebindings: Option<Vec<String>>,
    clusterrolebindings: Option<Vec<String>>,
}

impl NoisePolicy {
    /// Policy that filters nothing
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scoped: Vec::new(),
            global: Vec::new(),
        }
    }

    /// Same pattern set for both kinds
    pub fn uniform<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        Self {
            scoped: patterns.clone(),
            global: patterns,
        }
    }

    /// Replace the pattern set of one kind
    #[must_use]
    pub fn with_patterns<I, S>(mut self, kind: BindingKind, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.patterns_mut(kind) = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Add patterns to both kinds, skipping ones already present
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            for kind in BindingKind::ALL {
                let set = self.patterns_mut(kind);
                if !set.contains(&pattern) {
                    set.push(pattern.clone());
                }
            }
        }
    }

    #[must_use]
    pub fn patterns(&self, kind: BindingKind) -> &[String] {
        match kind {
            BindingKind::Scoped => &self.scoped,
            BindingKind::Global => &self.global,
        }
    }

    fn patterns_mut(&mut self, kind: BindingKind) -> &mut Vec<String> {
        match kind {
            BindingKind::Scoped => &mut self.scoped,
            BindingKind::Global => &mut self.global,
        }
    }

    #[must_use]
    pub fn is_noise(&self, kind: BindingKind, key: &CanonicalKey) -> bool {
        is_noise(key.as_str(), self.patterns(kind))
    }

    /// An empty pattern is a substring of every key and would hide everything.
    pub fn validate(&self) -> Result<()> {
        for kind in BindingKind::ALL {
            if self.patterns(kind).iter().any(|p| p.is_empty()) {
                return Err(EngineError::InvalidNoiseConfig(format!(
                    "{kind}: empty pattern would filter every key"
                )));
            }
        }
        Ok(())
    }

    /// Load overrides from a JSON or TOML file on top of `base`.
    pub fn from_file(path: &Path, base: Self) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, base).map_err(|err| match err {
            EngineError::InvalidNoiseConfig(msg) => {
                EngineError::InvalidNoiseConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_bytes(bytes: &[u8], base: Self) -> Result<Self> {
        let raw = parse_raw(bytes)?;
        let mut policy = base;
        if let Some(patterns) = raw.patterns {
            policy = Self::uniform(patterns);
        }
        if let Some(patterns) = raw.rolebindings {
            policy = policy.with_patterns(BindingKind::Scoped, patterns);
        }
        if let Some(patterns) = raw.clusterrolebindings {
            policy = policy.with_patterns(BindingKind::Global, patterns);
        }
        policy.validate()?;
        Ok(policy)
    }
}

fn parse_raw(bytes: &[u8]) -> Result<RawNoiseConfig> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes)
                .map_err(|err| EngineError::InvalidNoiseConfig(format!("{json_err}; {err}")))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                EngineError::InvalidNoiseConfig(format!(
                    "not valid JSON ({json_err}) or TOML ({toml_err})"
                ))
            })?;
            serde_json::to_value(toml_value).map_err(|err| {
                EngineError::InvalidNoiseConfig(format!("failed to convert TOML: {err}"))
            })?
        }
    };

    serde_json::from_value(value).map_err(|err| EngineError::InvalidNoiseConfig(err.to_string()))
}
