//! Config Function Patch Authoring
//!
//! Blind list-merge patches and the merge contract they rely on.
//!
//! # Core Concepts
//!
//! - [`ListMergeOp`]: items to ensure present in one keyed list
//! - [`ListMergePatch`]: ops folded into a single patch document
//! - [`MergeStrategy`]: replace (default) or append-by-key
//! - [`MergeContract`]: per-field strategy declarations for the merge step
//!
//! # Example
//!
//! ```rust,ignore
//! use cfunc_patch::ListMergePatch;
//! use cfunc_resource::keyed_item;
//!
//! let mut patch = ListMergePatch::new(target);
//! patch.append(sources_path, "secret.name", [keyed_item("secret.name", "gossip")])?;
//! let document = patch.build()?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod list_merge;
mod strategy;

pub use error::PatchError;
pub use list_merge::{ListMergeOp, ListMergePatch};
pub use strategy::{MergeContract, MergeStrategy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
