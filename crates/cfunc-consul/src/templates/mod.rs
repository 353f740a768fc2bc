//! Template bodies
//!
//! Plain data: every body is YAML with `{{ key }}` placeholders. Canonical
//! labels and namespaces are stamped by the engine, not written here.

pub(crate) mod acl;
pub(crate) mod gossip;
pub(crate) mod server;
pub(crate) mod sidecar;
pub(crate) mod tls;
