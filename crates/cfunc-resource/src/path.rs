//! Field paths for addressing within resource documents
//!
//! Provides [`FieldPath`] for hierarchical addressing of fields, including
//! list elements selected by a key field (`volumes[name=data]`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Mapping field
    Field(String),

    /// Sequence element whose `key` (possibly dotted) equals `value`
    Keyed {
        /// Key field inside the element, dotted for nested keys
        key: String,
        /// Expected key value
        value: String,
    },
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Keyed { key, value } => write!(f, "[{key}={value}]"),
        }
    }
}

/// Path within a resource document
///
/// # Examples
/// - `metadata.labels`
/// - `spec.template.spec.volumes[name=consul-configs].projected.sources`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of plain fields
    #[must_use]
    pub fn fields(names: &[&str]) -> Self {
        Self(
            names
                .iter()
                .map(|name| PathSegment::Field((*name).to_string()))
                .collect(),
        )
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Get parent path (if not root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a field, returning new path
    #[must_use]
    pub fn child(&self, field: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Field(field.into()));
        new
    }

    /// Append a keyed element selector, returning new path
    #[must_use]
    pub fn keyed(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Keyed {
            key: key.into(),
            value: value.into(),
        });
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Field(_)) {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut field = String::new();
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !field.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut field)));
                    } else if !matches!(segments.last(), Some(PathSegment::Keyed { .. })) {
                        return Err(PathError::EmptySegment);
                    }
                }
                '[' => {
                    if !field.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut field)));
                    }
                    let mut selector = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        selector.push(c);
                    }
                    if !closed {
                        return Err(PathError::UnclosedSelector(s.to_string()));
                    }
                    let (key, value) = selector
                        .split_once('=')
                        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                        .ok_or_else(|| PathError::InvalidSelector(selector.clone()))?;
                    segments.push(PathSegment::Keyed {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                ']' => return Err(PathError::InvalidSelector(s.to_string())),
                _ => field.push(c),
            }
        }

        if !field.is_empty() {
            segments.push(PathSegment::Field(field));
        } else if s.ends_with('.') {
            return Err(PathError::EmptySegment);
        }

        Ok(Self(segments))
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// Errors related to field paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// `[` without matching `]`
    #[error("unclosed list selector in '{0}'")]
    UnclosedSelector(String),

    /// Selector is not `key=value`
    #[error("invalid list selector: '{0}' (expected key=value)")]
    InvalidSelector(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parse_fields() {
        let path = FieldPath::from_str("metadata.labels").unwrap();
        assert_eq!(path, FieldPath::fields(&["metadata", "labels"]));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn path_parse_keyed() {
        let path =
            FieldPath::from_str("spec.volumes[name=consul-configs].projected.sources").unwrap();
        assert_eq!(
            path.segments()[2],
            PathSegment::Keyed {
                key: "name".to_string(),
                value: "consul-configs".to_string()
            }
        );
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn path_parse_dotted_selector_value() {
        let path = FieldPath::from_str("items[secret.name=a.b]").unwrap();
        assert_eq!(
            path.last(),
            Some(&PathSegment::Keyed {
                key: "secret.name".to_string(),
                value: "a.b".to_string()
            })
        );
    }

    #[test]
    fn path_display_roundtrip() {
        let text = "spec.template.spec.volumes[name=data].secret";
        let path = FieldPath::from_str(text).unwrap();
        assert_eq!(path.to_string(), text);
    }

    #[test]
    fn path_parse_errors() {
        assert_eq!(FieldPath::from_str("a..b"), Err(PathError::EmptySegment));
        assert_eq!(FieldPath::from_str("a."), Err(PathError::EmptySegment));
        assert!(matches!(
            FieldPath::from_str("a[name=x"),
            Err(PathError::UnclosedSelector(_))
        ));
        assert!(matches!(
            FieldPath::from_str("a[name]"),
            Err(PathError::InvalidSelector(_))
        ));
    }

    #[test]
    fn path_empty_is_root() {
        let path = FieldPath::from_str("").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.parent(), None);
    }

    #[test]
    fn path_child_and_prefix() {
        let spec = FieldPath::fields(&["spec"]);
        let volumes = spec.child("volumes").keyed("name", "data");
        assert!(spec.is_prefix_of(&volumes));
        assert!(!volumes.is_prefix_of(&spec));
        assert_eq!(volumes.parent(), Some(spec.child("volumes")));
    }
}
