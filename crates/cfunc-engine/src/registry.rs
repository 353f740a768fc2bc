//! Template Module Registry
//!
//! A module is a pure render strategy keyed by id and gated by a toggle.
//! The registry renders every open module, in id order, from one
//! [`CanonicalConfig`].

use std::collections::BTreeMap;
use std::fmt;

use cfunc_resource::ResourceDocument;
use tracing::{debug, info};

use crate::error::{ConfigurationError, EngineError};
use crate::reconcile::CanonicalConfig;
use crate::template;

/// Render closure signature
pub type RenderFn =
    dyn Fn(&CanonicalConfig) -> Result<Option<ResourceDocument>, ConfigurationError> + Send + Sync;

/// When a module renders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Gate {
    /// Always rendered
    #[default]
    Always,

    /// Rendered when the named toggle is on
    Toggle(String),
}

impl Gate {
    /// Create toggle gate
    #[inline]
    #[must_use]
    pub fn toggle(key: impl Into<String>) -> Self {
        Self::Toggle(key.into())
    }

    /// Evaluate against a snapshot
    ///
    /// # Errors
    /// Returns [`ConfigurationError::UnresolvedReference`] if the toggle is
    /// not declared
    pub fn is_open(&self, config: &CanonicalConfig) -> Result<bool, ConfigurationError> {
        match self {
            Self::Always => Ok(true),
            Self::Toggle(key) => config
                .toggle(key)
                .ok_or_else(|| ConfigurationError::unresolved(format!("toggles.{key}"))),
        }
    }
}

enum RenderStrategy {
    Template(String),
    Function(Box<RenderFn>),
}

/// One synthesizable resource
pub struct TemplateModule {
    id: String,
    gate: Gate,
    strategy: RenderStrategy,
}

impl TemplateModule {
    /// Module rendered from placeholder template text
    #[must_use]
    pub fn template(id: impl Into<String>, gate: Gate, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gate,
            strategy: RenderStrategy::Template(text.into()),
        }
    }

    /// Module rendered by a closure; `None` emits nothing
    #[must_use]
    pub fn from_fn<F>(id: impl Into<String>, gate: Gate, render: F) -> Self
    where
        F: Fn(&CanonicalConfig) -> Result<Option<ResourceDocument>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.into(),
            gate,
            strategy: RenderStrategy::Function(Box::new(render)),
        }
    }

    /// Get module id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get gate
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Render ignoring the gate
    ///
    /// # Errors
    /// Returns error on unresolved references or invalid output
    pub fn render(&self, config: &CanonicalConfig) -> Result<Option<ResourceDocument>, ConfigurationError> {
        match &self.strategy {
            RenderStrategy::Template(text) => template::render_document(text, config).map(Some),
            RenderStrategy::Function(render) => render(config),
        }
    }
}

impl fmt::Debug for TemplateModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            RenderStrategy::Template(_) => "template",
            RenderStrategy::Function(_) => "function",
        };
        f.debug_struct("TemplateModule")
            .field("id", &self.id)
            .field("gate", &self.gate)
            .field("strategy", &strategy)
            .finish()
    }
}

/// A document together with the module that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// Producing module id
    pub module: String,
    /// Rendered document
    pub document: ResourceDocument,
}

impl Rendered {
    /// Create rendered output
    #[inline]
    #[must_use]
    pub fn new(module: impl Into<String>, document: ResourceDocument) -> Self {
        Self {
            module: module.into(),
            document,
        }
    }
}

/// Registry of template modules keyed by id
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, TemplateModule>,
}

impl ModuleRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Register a module
    ///
    /// # Errors
    /// Returns [`ConfigurationError::DuplicateModule`] if the id is taken
    pub fn register(&mut self, module: TemplateModule) -> Result<(), ConfigurationError> {
        if self.modules.contains_key(&module.id) {
            return Err(ConfigurationError::DuplicateModule { id: module.id });
        }
        self.modules.insert(module.id.clone(), module);
        Ok(())
    }

    /// Register a module, returning the registry
    ///
    /// # Errors
    /// Returns error if the id is taken
    pub fn with_module(mut self, module: TemplateModule) -> Result<Self, ConfigurationError> {
        self.register(module)?;
        Ok(self)
    }

    /// Check if module exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Get a module
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TemplateModule> {
        self.modules.get(id)
    }

    /// Module ids in render order
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Get number of registered modules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Render every open module
    ///
    /// Fails fast: the first error aborts and nothing is returned.
    ///
    /// # Errors
    /// Returns the first module failure, tagged with its module id
    pub fn render_all(&self, config: &CanonicalConfig) -> Result<Vec<Rendered>, EngineError> {
        let mut rendered = Vec::new();
        for module in self.modules.values() {
            let tag = |err: ConfigurationError| EngineError::new(err).with_module(module.id.as_str());
            if !module.gate.is_open(config).map_err(tag)? {
                debug!(module = module.id.as_str(), "gate closed");
                continue;
            }
            if let Some(document) = module.render(config).map_err(tag)? {
                rendered.push(Rendered::new(module.id.as_str(), document));
            }
        }
        info!(rendered = rendered.len(), registered = self.modules.len(), "rendered modules");
        Ok(rendered)
    }
}
