//! Per-field merge strategies
//!
//! Provides [`MergeContract`], the declaration of which list fields the
//! downstream merge step must union by key instead of replacing.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use cfunc_resource::{FieldPath, PathSegment};
use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// How the downstream merge step combines a patch field with its target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Patch value replaces the target value (default)
    #[default]
    Replace,

    /// Sequence items are unioned by the value at `key`
    AppendByKey {
        /// Key field inside each item, dotted for nested keys
        key: String,
    },
}

impl MergeStrategy {
    /// Create append-by-key strategy
    #[inline]
    #[must_use]
    pub fn append_by_key(key: impl Into<String>) -> Self {
        Self::AppendByKey { key: key.into() }
    }

    /// Check if this strategy unions list items
    #[inline]
    #[must_use]
    pub fn is_append(&self) -> bool {
        matches!(self, Self::AppendByKey { .. })
    }

    /// Strategy name (for logging/serialization)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::AppendByKey { .. } => "append_by_key",
        }
    }
}

impl Display for MergeStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::AppendByKey { key } => write!(f, "append_by_key({key})"),
        }
    }
}

/// Declared merge strategies, keyed by field path
///
/// Undeclared fields merge with [`MergeStrategy::Replace`]. The contract is
/// authored here and honored downstream; patches are never validated against
/// target contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeContract {
    fields: BTreeMap<FieldPath, MergeStrategy>,
}

impl MergeContract {
    /// Create new empty contract
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Contract with the pod-template lists every workload merges by name
    #[must_use]
    pub fn with_defaults() -> Self {
        let pod_spec = FieldPath::fields(&["spec", "template", "spec"]);
        let mut contract = Self::new();
        for list in ["containers", "initContainers", "volumes"] {
            contract
                .fields
                .insert(pod_spec.child(list), MergeStrategy::append_by_key("name"));
        }
        contract
    }

    /// Declare the strategy for a field
    ///
    /// Re-declaring the same strategy is a no-op.
    ///
    /// # Errors
    /// Returns [`PatchError::ConflictingStrategy`] if the field is already
    /// declared with a different strategy, or [`PatchError::InvalidPath`] if
    /// the path does not name a field
    pub fn declare(&mut self, path: FieldPath, strategy: MergeStrategy) -> Result<(), PatchError> {
        if !matches!(path.last(), Some(PathSegment::Field(_))) {
            return Err(PatchError::InvalidPath(path.to_string()));
        }
        match self.fields.get(&path) {
            Some(existing) if *existing == strategy => Ok(()),
            Some(existing) => Err(PatchError::ConflictingStrategy {
                path: path.to_string(),
                declared: existing.to_string(),
                requested: strategy.to_string(),
            }),
            None => {
                self.fields.insert(path, strategy);
                Ok(())
            }
        }
    }

    /// Merge another contract into this one
    ///
    /// # Errors
    /// Returns error on the first conflicting declaration
    pub fn extend(&mut self, other: &Self) -> Result<(), PatchError> {
        for (path, strategy) in &other.fields {
            self.declare(path.clone(), strategy.clone())?;
        }
        Ok(())
    }

    /// Strategy for a field, `Replace` if undeclared
    #[must_use]
    pub fn strategy_for(&self, path: &FieldPath) -> MergeStrategy {
        self.fields.get(path).cloned().unwrap_or_default()
    }

    /// Check if a field is declared
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.fields.contains_key(path)
    }

    /// Get number of declared fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if contract is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over declarations in path order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &MergeStrategy)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn undeclared_field_replaces() {
        let contract = MergeContract::new();
        let path = FieldPath::fields(&["spec", "ports"]);
        assert_eq!(contract.strategy_for(&path), MergeStrategy::Replace);
    }

    #[test]
    fn defaults_cover_pod_lists() {
        let contract = MergeContract::with_defaults();
        let volumes = FieldPath::from_str("spec.template.spec.volumes").unwrap();
        assert_eq!(contract.strategy_for(&volumes), MergeStrategy::append_by_key("name"));
        assert_eq!(contract.len(), 3);
    }

    #[test]
    fn redeclare_same_is_noop() {
        let mut contract = MergeContract::new();
        let path = FieldPath::fields(&["spec", "sources"]);
        contract
            .declare(path.clone(), MergeStrategy::append_by_key("secret.name"))
            .unwrap();
        contract
            .declare(path, MergeStrategy::append_by_key("secret.name"))
            .unwrap();
        assert_eq!(contract.len(), 1);
    }

    #[test]
    fn conflicting_declaration_rejected() {
        let mut contract = MergeContract::with_defaults();
        let path = FieldPath::from_str("spec.template.spec.volumes").unwrap();
        let err = contract.declare(path, MergeStrategy::Replace).unwrap_err();
        assert!(matches!(err, PatchError::ConflictingStrategy { .. }));
    }

    #[test]
    fn selector_path_rejected() {
        let mut contract = MergeContract::new();
        let path = FieldPath::from_str("spec.volumes[name=a]").unwrap();
        assert!(contract.declare(path, MergeStrategy::Replace).is_err());
    }

    #[test]
    fn strategy_display() {
        assert_eq!(MergeStrategy::append_by_key("name").to_string(), "append_by_key(name)");
        assert_eq!(MergeStrategy::Replace.name(), "replace");
        assert!(MergeStrategy::append_by_key("name").is_append());
    }
}
