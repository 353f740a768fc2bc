//! List-merge patch authoring
//!
//! A [`ListMergeOp`] names a list field on a target resource and the items
//! that must be present in it. Patches built from ops contain only those
//! items; the existing list is never read, so the downstream merge step must
//! union the field by key (see [`MergeContract`]). Applying such a patch
//! twice converges because the union is keyed.

use std::collections::BTreeMap;

use cfunc_resource::{item_key, FieldPath, PathSegment, ResourceDocument, ResourceIdentity};
use serde_yaml::{Sequence, Value};

use crate::error::PatchError;
use crate::strategy::{MergeContract, MergeStrategy};

/// Items to ensure present in one keyed list of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ListMergeOp {
    target: ResourceIdentity,
    path: FieldPath,
    item_key: String,
    items: Vec<Value>,
}

impl ListMergeOp {
    /// Create an empty op
    ///
    /// # Errors
    /// Returns [`PatchError::InvalidPath`] if `path` does not end in a field
    pub fn new(
        target: ResourceIdentity,
        path: FieldPath,
        item_key: impl Into<String>,
    ) -> Result<Self, PatchError> {
        if !matches!(path.last(), Some(PathSegment::Field(_))) {
            return Err(PatchError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            target,
            path,
            item_key: item_key.into(),
            items: Vec::new(),
        })
    }

    /// Add an item, returning the op
    ///
    /// # Errors
    /// Returns error if the item has no key value
    pub fn with_item(mut self, item: Value) -> Result<Self, PatchError> {
        self.push(item)?;
        Ok(self)
    }

    /// Add several items, returning the op
    ///
    /// # Errors
    /// Returns error on the first item without a key value
    pub fn with_items(mut self, items: impl IntoIterator<Item = Value>) -> Result<Self, PatchError> {
        for item in items {
            self.push(item)?;
        }
        Ok(self)
    }

    /// Add an item unless one with the same key is already present
    ///
    /// Returns `false` for a duplicate key; the first item wins.
    ///
    /// # Errors
    /// Returns error if the item has no key value
    pub fn push(&mut self, item: Value) -> Result<bool, PatchError> {
        let Some(key) = key_of(&item, &self.item_key) else {
            return Err(PatchError::missing_item_key(&self.path, &self.item_key));
        };
        if self.contains_key(key) {
            return Ok(false);
        }
        self.items.push(item);
        Ok(true)
    }

    /// Check if an item with this key value is present
    #[must_use]
    pub fn contains_key(&self, value: &str) -> bool {
        self.items
            .iter()
            .any(|item| key_of(item, &self.item_key) == Some(value))
    }

    /// Get target identity
    #[inline]
    #[must_use]
    pub fn target(&self) -> &ResourceIdentity {
        &self.target
    }

    /// Get list field path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Get item key field
    #[inline]
    #[must_use]
    pub fn item_key(&self) -> &str {
        &self.item_key
    }

    /// Get items
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Get number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if op has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Strategy the downstream merge must use for this field
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> MergeStrategy {
        MergeStrategy::append_by_key(&self.item_key)
    }

    /// Write items into a patch document, unioned by key with any items
    /// already written at the same path
    ///
    /// # Errors
    /// Returns error if the patch has a non-list value at the path
    pub fn write_into(&self, patch: &mut ResourceDocument) -> Result<(), PatchError> {
        let Some(PathSegment::Field(field)) = self.path.last() else {
            return Err(PatchError::InvalidPath(self.path.to_string()));
        };
        let parent = self.path.parent().unwrap_or_default();
        let slot = patch
            .ensure_mapping(&parent)?
            .entry(Value::String(field.clone()))
            .or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Sequence(Sequence::new());
        }
        let Some(list) = slot.as_sequence_mut() else {
            return Err(PatchError::InvalidPath(self.path.to_string()));
        };

        for item in &self.items {
            let key = key_of(item, &self.item_key);
            if !list.iter().any(|existing| key_of(existing, &self.item_key) == key) {
                list.push(item.clone());
            }
        }
        Ok(())
    }

    /// Build a standalone patch holding only this op
    ///
    /// # Errors
    /// Returns error if the path cannot be written
    pub fn to_patch(&self) -> Result<ResourceDocument, PatchError> {
        let mut patch = ResourceDocument::new(&self.target);
        self.write_into(&mut patch)?;
        Ok(patch)
    }
}

/// Several list-merge ops folded into one patch for one target
#[derive(Debug, Clone, PartialEq)]
pub struct ListMergePatch {
    target: ResourceIdentity,
    annotations: BTreeMap<String, String>,
    ops: Vec<ListMergeOp>,
}

impl ListMergePatch {
    /// Create an empty patch for a target
    #[inline]
    #[must_use]
    pub fn new(target: ResourceIdentity) -> Self {
        Self {
            target,
            annotations: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    /// Set an annotation on the patch metadata
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add an op
    ///
    /// # Errors
    /// Returns [`PatchError::TargetMismatch`] if the op targets another resource
    pub fn add(&mut self, op: ListMergeOp) -> Result<(), PatchError> {
        if op.target != self.target {
            return Err(PatchError::TargetMismatch {
                expected: self.target.clone(),
                found: op.target,
            });
        }
        self.ops.push(op);
        Ok(())
    }

    /// Add an op, returning the patch
    ///
    /// # Errors
    /// Returns error if the op targets another resource
    pub fn with_op(mut self, op: ListMergeOp) -> Result<Self, PatchError> {
        self.add(op)?;
        Ok(self)
    }

    /// Append items to the list at `path`, keyed by `key`
    ///
    /// # Errors
    /// Returns error on an invalid path or an item without a key value
    pub fn append(
        &mut self,
        path: FieldPath,
        key: &str,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<(), PatchError> {
        let op = ListMergeOp::new(self.target.clone(), path, key)?.with_items(items)?;
        self.ops.push(op);
        Ok(())
    }

    /// Get target identity
    #[inline]
    #[must_use]
    pub fn target(&self) -> &ResourceIdentity {
        &self.target
    }

    /// Get ops in insertion order
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[ListMergeOp] {
        &self.ops
    }

    /// Check if the patch adds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.iter().all(ListMergeOp::is_empty)
    }

    /// Merge declarations required by this patch
    ///
    /// # Errors
    /// Returns error if two ops declare the same field with different keys
    pub fn contract(&self) -> Result<MergeContract, PatchError> {
        let mut contract = MergeContract::new();
        for op in &self.ops {
            contract.declare(op.path.clone(), op.strategy())?;
        }
        Ok(contract)
    }

    /// Build the patch document against the default pod-template contract
    ///
    /// # Errors
    /// Returns error if ops conflict on a path or declare conflicting keys
    pub fn build(&self) -> Result<ResourceDocument, PatchError> {
        self.build_against(&MergeContract::with_defaults())
    }

    /// Build the patch document, checking every op against `contract`
    ///
    /// # Errors
    /// Returns [`PatchError::ConflictingStrategy`] if an op keys a declared
    /// list differently, or error if the patch cannot be written
    pub fn build_against(&self, contract: &MergeContract) -> Result<ResourceDocument, PatchError> {
        let mut declared = contract.clone();
        declared.extend(&self.contract()?)?;

        let mut patch = ResourceDocument::new(&self.target);
        for (key, value) in &self.annotations {
            patch.set_annotation(key, value)?;
        }
        for op in &self.ops {
            op.write_into(&mut patch)?;
        }
        Ok(patch)
    }
}

fn key_of<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item_key(item, key).and_then(Value::as_str)
}
