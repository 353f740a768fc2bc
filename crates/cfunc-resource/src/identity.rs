//! Resource identities
//!
//! Provides [`ResourceIdentity`], the `(kind, apiVersion, namespace, name)`
//! tuple that uniquely addresses a document within a batch.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Unique address of a resource document
///
/// The derived ordering is the stable sort key used for emission order, so
/// two runs over the same documents always agree on their sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentity {
    /// Resource kind (`StatefulSet`, `ConfigMap`, ...)
    pub kind: String,

    /// API group/version (`apps/v1`)
    pub api_version: String,

    /// Namespace, empty for cluster-scoped or unset
    pub namespace: String,

    /// `metadata.name`
    pub name: String,
}

impl ResourceIdentity {
    /// Create a new identity
    #[inline]
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Check whether this identity addresses `name` in `namespace`
    #[inline]
    #[must_use]
    pub fn is_named(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }

    /// Check the kind, ignoring API version
    #[inline]
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl Display for ResourceIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{} {}", self.api_version, self.kind, self.name)
        } else {
            write!(
                f,
                "{}/{} {}/{}",
                self.api_version, self.kind, self.namespace, self.name
            )
        }
    }
}
