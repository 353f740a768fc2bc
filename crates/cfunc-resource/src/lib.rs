//! Config Function Resource Model
//!
//! Declarative resource documents with stable identities and structural
//! addressing.
//!
//! # Core Concepts
//!
//! - [`ResourceDocument`]: kind/apiVersion/metadata/spec-shaped YAML mapping
//! - [`ResourceIdentity`]: `(kind, apiVersion, namespace, name)` address
//! - [`FieldPath`]: hierarchical path with keyed list selectors
//! - [`ContentDigest`]: Blake3 digest of canonical serializations
//! - [`ResourceList`]: function wire format (items + function config)
//!
//! # Example
//!
//! ```rust,ignore
//! use cfunc_resource::{FieldPath, ResourceDocument};
//!
//! let doc = ResourceDocument::from_yaml(text)?;
//! let path: FieldPath = "spec.template.spec.volumes[name=data]".parse()?;
//! let volume = doc.get(&path);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod digest;
mod document;
mod identity;
mod path;
mod stream;

pub use digest::ContentDigest;
pub use document::{item_key, keyed_item, DocumentError, ResourceDocument};
pub use identity::ResourceIdentity;
pub use path::{FieldPath, PathError, PathSegment};
pub use stream::{ResourceList, RESOURCE_LIST_API_VERSION, RESOURCE_LIST_KIND};

/// Re-exported YAML value types used throughout the document API
pub use serde_yaml::{Mapping, Sequence, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
