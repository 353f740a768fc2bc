//! Resource documents
//!
//! A [`ResourceDocument`] is a kind/apiVersion/metadata/spec-shaped YAML
//! mapping. Field insertion order is preserved, so a document built the same
//! way twice serializes to the same bytes.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Sequence, Value};

use crate::digest::ContentDigest;
use crate::identity::ResourceIdentity;
use crate::path::{FieldPath, PathError, PathSegment};

/// A declarative resource document
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    /// Always a `Value::Mapping`
    root: Value,
}

impl ResourceDocument {
    /// Create a skeleton document with identity fields populated
    #[must_use]
    pub fn new(identity: &ResourceIdentity) -> Self {
        let mut metadata = Mapping::new();
        metadata.insert("name".into(), identity.name.clone().into());
        if !identity.namespace.is_empty() {
            metadata.insert("namespace".into(), identity.namespace.clone().into());
        }

        let mut root = Mapping::new();
        root.insert("apiVersion".into(), identity.api_version.clone().into());
        root.insert("kind".into(), identity.kind.clone().into());
        root.insert("metadata".into(), Value::Mapping(metadata));
        Self {
            root: Value::Mapping(root),
        }
    }

    /// Wrap a parsed value
    ///
    /// # Errors
    /// Returns error if the value is not a mapping
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Mapping(_) => Ok(Self { root: value }),
            other => Err(DocumentError::NotAMapping {
                found: value_kind(&other),
            }),
        }
    }

    /// Parse a single YAML document
    ///
    /// # Errors
    /// Returns error if YAML is invalid or not a mapping
    pub fn from_yaml(yaml: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Get the underlying value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Consume into the underlying value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.root
    }

    /// `apiVersion`, empty if absent
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.root.get("apiVersion").and_then(Value::as_str).unwrap_or_default()
    }

    /// `kind`, empty if absent
    #[must_use]
    pub fn kind(&self) -> &str {
        self.root.get("kind").and_then(Value::as_str).unwrap_or_default()
    }

    /// `metadata.name`, empty if absent
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    /// `metadata.namespace`, empty if absent
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    fn metadata_str(&self, field: &str) -> &str {
        self.root
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Identity of this document
    #[must_use]
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(self.api_version(), self.kind(), self.namespace(), self.name())
    }

    /// Get a single label value
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata_entry("labels", key)
    }

    /// Get a single annotation value
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata_entry("annotations", key)
    }

    fn metadata_entry(&self, map: &str, key: &str) -> Option<&str> {
        self.root
            .get("metadata")?
            .get(map)?
            .get(key)?
            .as_str()
    }

    /// All labels with string values
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map(&FieldPath::fields(&["metadata", "labels"]))
    }

    /// All annotations with string values
    #[must_use]
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map(&FieldPath::fields(&["metadata", "annotations"]))
    }

    /// Read a mapping of string values, skipping non-string entries
    #[must_use]
    pub fn string_map(&self, path: &FieldPath) -> BTreeMap<String, String> {
        self.get(path)
            .and_then(Value::as_mapping)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar_string(v)?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set `metadata.namespace`
    ///
    /// # Errors
    /// Returns error if `metadata` exists but is not a mapping
    pub fn set_namespace(&mut self, namespace: &str) -> Result<(), DocumentError> {
        let metadata = self.ensure_mapping(&FieldPath::fields(&["metadata"]))?;
        metadata.insert("namespace".into(), namespace.into());
        Ok(())
    }

    /// Set a label
    ///
    /// # Errors
    /// Returns error if `metadata.labels` exists but is not a mapping
    pub fn set_label(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        let labels = self.ensure_mapping(&FieldPath::fields(&["metadata", "labels"]))?;
        labels.insert(key.into(), value.into());
        Ok(())
    }

    /// Set an annotation
    ///
    /// # Errors
    /// Returns error if `metadata.annotations` exists but is not a mapping
    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        let annotations = self.ensure_mapping(&FieldPath::fields(&["metadata", "annotations"]))?;
        annotations.insert(key.into(), value.into());
        Ok(())
    }

    /// Remove an annotation, dropping the annotations map once empty
    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        let metadata = self.root.get_mut("metadata")?.as_mapping_mut()?;
        let annotations = metadata.get_mut("annotations")?.as_mapping_mut()?;
        let removed = annotations.shift_remove(key)?;
        if annotations.is_empty() {
            metadata.shift_remove("annotations");
        }
        scalar_string(&removed)
    }

    /// Get value at path
    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(&self.root, |current, segment| step(current, segment))
    }

    /// Get string value at path
    #[must_use]
    pub fn get_str(&self, path: &FieldPath) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Get mutable value at path
    #[must_use]
    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut Value> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = step_mut(current, segment)?;
        }
        Some(current)
    }

    /// Get the mapping at path, creating missing mappings, sequences and
    /// keyed elements along the way
    ///
    /// # Errors
    /// Returns error if an existing value along the path has the wrong shape
    pub fn ensure_mapping(&mut self, path: &FieldPath) -> Result<&mut Mapping, DocumentError> {
        let mut current = &mut self.root;
        for (depth, segment) in path.segments().iter().enumerate() {
            current = step_or_insert(current, segment)
                .ok_or_else(|| type_mismatch(path, depth, segment))?;
        }
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current.as_mapping_mut().ok_or_else(|| DocumentError::TypeMismatch {
            path: path.to_string(),
            expected: "mapping",
        })
    }

    /// Set value at path, creating parents
    ///
    /// # Errors
    /// Returns error if the path is root or ends in a keyed selector, or a
    /// parent has the wrong shape
    pub fn set(&mut self, path: &FieldPath, value: Value) -> Result<(), DocumentError> {
        let Some(PathSegment::Field(field)) = path.last() else {
            return Err(DocumentError::InvalidTarget(path.to_string()));
        };
        let field = field.clone();
        let parent = path.parent().unwrap_or_default();
        self.ensure_mapping(&parent)?.insert(Value::String(field), value);
        Ok(())
    }

    /// Serialize to YAML text
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    /// Canonical JSON with sorted keys
    #[must_use]
    pub fn to_canonical_json(&self) -> String {
        canonical_json(&self.root)
    }

    /// Digest of the canonical JSON form
    #[must_use]
    pub fn digest(&self) -> ContentDigest {
        ContentDigest::compute(self.to_canonical_json().as_bytes())
    }
}

impl FromStr for ResourceDocument {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

impl TryFrom<Value> for ResourceDocument {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl Serialize for ResourceDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Build a sequence element whose (possibly dotted) `key` is `value`
#[must_use]
pub fn keyed_item(key: &str, value: &str) -> Value {
    key.rsplit('.').fold(Value::String(value.to_string()), |inner, part| {
        let mut map = Mapping::new();
        map.insert(part.into(), inner);
        Value::Mapping(map)
    })
}

/// Read the (possibly dotted) key of a sequence element
#[must_use]
pub fn item_key<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(item, |current, part| current.get(part))
}

fn step<'a>(current: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match segment {
        PathSegment::Field(field) => current.as_mapping()?.get(field.as_str()),
        PathSegment::Keyed { key, value } => current
            .as_sequence()?
            .iter()
            .find(|item| matches_key(item, key, value)),
    }
}

fn step_mut<'a>(current: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Field(field) => current.as_mapping_mut()?.get_mut(field.as_str()),
        PathSegment::Keyed { key, value } => current
            .as_sequence_mut()?
            .iter_mut()
            .find(|item| matches_key(item, key, value)),
    }
}

fn step_or_insert<'a>(current: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Field(field) => {
            if current.is_null() {
                *current = Value::Mapping(Mapping::new());
            }
            let map = current.as_mapping_mut()?;
            Some(map.entry(Value::String(field.clone())).or_insert(Value::Null))
        }
        PathSegment::Keyed { key, value } => {
            if current.is_null() {
                *current = Value::Sequence(Sequence::new());
            }
            let seq = current.as_sequence_mut()?;
            let index = match seq.iter().position(|item| matches_key(item, key, value)) {
                Some(index) => index,
                None => {
                    seq.push(keyed_item(key, value));
                    seq.len() - 1
                }
            };
            seq.get_mut(index)
        }
    }
}

fn matches_key(item: &Value, key: &str, value: &str) -> bool {
    item_key(item, key).and_then(Value::as_str) == Some(value)
}

fn type_mismatch(path: &FieldPath, depth: usize, segment: &PathSegment) -> DocumentError {
    let at = FieldPath::new(path.segments()[..=depth].to_vec());
    DocumentError::TypeMismatch {
        path: at.to_string(),
        expected: match segment {
            PathSegment::Field(_) => "mapping",
            PathSegment::Keyed { .. } => "sequence",
        },
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Generate canonical JSON (sorted keys)
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<_> = map
                .iter()
                .map(|(k, v)| (canonical_key(k), canonical_json(v)))
                .collect();
            entries.sort();

            let parts: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Sequence(seq) => {
            let parts: Vec<_> = seq.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => format!(
            "{{{}:{}}}",
            quote(&tagged.tag.to_string()),
            canonical_json(&tagged.value)
        ),
    }
}

fn canonical_key(key: &Value) -> String {
    match key {
        Value::String(s) => quote(s),
        other => quote(&canonical_json(other)),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("document must be a mapping, found {found}")]
    NotAMapping { found: &'static str },

    #[error("expected {expected} at '{path}'")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("cannot set value at '{0}'")]
    InvalidTarget(String),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
}
