//! Error types for the synthesis engine
//!
//! Every failure is fatal for the whole invocation. A [`ConfigurationError`]
//! names what went wrong; an [`EngineError`] wraps it with the module and
//! resource it was raised for.

use std::fmt::{self, Display, Formatter};

use cfunc_patch::PatchError;
use cfunc_resource::{DocumentError, ResourceIdentity};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Function config lacks a required identity field
    #[error("function config must specify {field}")]
    MissingIdentity {
        /// Missing field path
        field: &'static str,
    },

    /// Correlation descriptor present but unusable
    #[error("malformed correlation descriptor on {resource}: {reason}")]
    MalformedDescriptor {
        /// Resource carrying the descriptor
        resource: ResourceIdentity,
        /// What is wrong with it
        reason: String,
    },

    /// Template or gate references a key the configuration does not provide
    #[error("unresolved reference '{field}'")]
    UnresolvedReference {
        /// Referenced key
        field: String,
    },

    /// Rendered template is not a single resource document
    #[error("invalid template: {message}")]
    InvalidTemplate {
        /// Parser or shape diagnostic
        message: String,
    },

    /// Override value cannot be used
    #[error("invalid value for '{key}': {reason}")]
    InvalidOverride {
        /// Override key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Existing resource holds a fact that cannot be interpreted
    #[error("cannot read {fact} from {resource}: {reason}")]
    InvalidFact {
        /// Fact name
        fact: &'static str,
        /// Resource holding it
        resource: ResourceIdentity,
        /// Why it was rejected
        reason: String,
    },

    /// Module id registered twice
    #[error("module '{id}' is already registered")]
    DuplicateModule {
        /// Module id
        id: String,
    },

    /// Contribution kind registered twice
    #[error("contribution kind '{kind}' is already registered")]
    DuplicateContribution {
        /// Contribution kind
        kind: String,
    },

    /// Patch authoring failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Document access failed
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl ConfigurationError {
    /// Create malformed descriptor error
    #[inline]
    #[must_use]
    pub fn malformed_descriptor(resource: ResourceIdentity, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            resource,
            reason: reason.into(),
        }
    }

    /// Create unresolved reference error
    #[inline]
    #[must_use]
    pub fn unresolved(field: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            field: field.into(),
        }
    }

    /// Create invalid override error
    #[inline]
    #[must_use]
    pub fn invalid_override(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal failure of one invocation
#[derive(Debug)]
pub struct EngineError {
    kind: ConfigurationError,
    module: Option<String>,
    resource: Option<ResourceIdentity>,
}

impl EngineError {
    /// Create from a configuration error without context
    #[inline]
    #[must_use]
    pub fn new(kind: ConfigurationError) -> Self {
        Self {
            kind,
            module: None,
            resource: None,
        }
    }

    /// Attach the offending module id
    #[inline]
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attach the offending resource identity
    #[inline]
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceIdentity) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Get the underlying error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ConfigurationError {
        &self.kind
    }

    /// Get the offending module id
    #[inline]
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Get the offending resource identity
    #[inline]
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceIdentity> {
        self.resource.as_ref()
    }

    /// Consume into the underlying error
    #[inline]
    #[must_use]
    pub fn into_kind(self) -> ConfigurationError {
        self.kind
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "module '{module}': ")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, "{resource}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for EngineError {}

impl From<ConfigurationError> for EngineError {
    fn from(kind: ConfigurationError) -> Self {
        Self::new(kind)
    }
}
