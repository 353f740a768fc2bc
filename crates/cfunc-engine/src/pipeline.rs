//! Invocation pipeline
//!
//! One [`Engine::run`] call is one function invocation: identity, scope,
//! reconcile, render, propagate, correlate. Inputs are never mutated, and
//! any failure discards everything synthesized so far.

use cfunc_resource::ResourceDocument;
use tracing::{debug, info, info_span};

use crate::config::EngineConfig;
use crate::correlate::Correlator;
use crate::error::{ConfigurationError, EngineError};
use crate::instance::FunctionInstance;
use crate::propagate::MetadataPropagator;
use crate::reconcile::{CanonicalConfig, ConfigSchema, Overrides, Reconciler};
use crate::registry::{ModuleRegistry, Rendered, TemplateModule};
use crate::scope;
use crate::state::{FunctionState, STATE_MODULE_ID};

/// Everything one function contributes: schema, modules and correlations
#[derive(Debug)]
pub struct FunctionDefinition {
    app_name: String,
    schema: ConfigSchema,
    modules: ModuleRegistry,
    correlator: Option<Correlator>,
}

impl FunctionDefinition {
    /// Create definition for an application name
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            schema: ConfigSchema::new(),
            modules: ModuleRegistry::new(),
            correlator: None,
        }
    }

    /// Set configuration schema
    #[inline]
    #[must_use]
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Add a template module
    ///
    /// # Errors
    /// Returns error if the module id is taken
    pub fn with_module(mut self, module: TemplateModule) -> Result<Self, ConfigurationError> {
        self.modules.register(module)?;
        Ok(self)
    }

    /// Set correlator
    #[inline]
    #[must_use]
    pub fn with_correlator(mut self, correlator: Correlator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    /// Get application name
    #[inline]
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Get schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Get module registry
    #[inline]
    #[must_use]
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Get correlator
    #[inline]
    #[must_use]
    pub fn correlator(&self) -> Option<&Correlator> {
        self.correlator.as_ref()
    }
}

/// Runs a [`FunctionDefinition`] against resource batches
#[derive(Debug)]
pub struct Engine {
    definition: FunctionDefinition,
    config: EngineConfig,
}

impl Engine {
    /// Create engine
    ///
    /// # Errors
    /// Returns [`ConfigurationError::DuplicateModule`] if the definition
    /// registers the reserved state record id
    pub fn new(definition: FunctionDefinition, config: EngineConfig) -> Result<Self, ConfigurationError> {
        if definition.modules.contains(STATE_MODULE_ID) {
            return Err(ConfigurationError::DuplicateModule {
                id: STATE_MODULE_ID.to_string(),
            });
        }
        Ok(Self { definition, config })
    }

    /// Get definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    /// Get engine config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve the canonical configuration for a batch
    ///
    /// # Errors
    /// Returns error for a function config without identity, invalid
    /// overrides or unreadable facts
    pub fn resolve(
        &self,
        batch: &[ResourceDocument],
        function_config: &ResourceDocument,
    ) -> Result<CanonicalConfig, EngineError> {
        let tag = |err: ConfigurationError| EngineError::new(err).with_resource(function_config.identity());

        let instance = FunctionInstance::from_function_config(
            function_config,
            &self.definition.app_name,
            &self.config,
        )
        .map_err(tag)?;
        let scoped = scope::resolve(batch, &instance, &self.config);
        debug!(scoped = scoped.len(), batch = batch.len(), "resolved instance scope");

        let overrides = Overrides::from_function_config(function_config).map_err(tag)?;
        Reconciler::new(&self.definition.schema, &self.config)
            .reconcile(instance, &scoped, &overrides)
            .map_err(tag)
    }

    /// Produce the synthesized documents for a batch
    ///
    /// Output is sorted by identity then module id, so it does not depend
    /// on input order.
    ///
    /// # Errors
    /// Returns the first failure; nothing is emitted in that case
    pub fn synthesize(
        &self,
        batch: &[ResourceDocument],
        function_config: &ResourceDocument,
    ) -> Result<Vec<Rendered>, EngineError> {
        let span = info_span!("synthesize", function = function_config.name());
        let _guard = span.enter();

        let canonical = self.resolve(batch, function_config)?;

        let mut rendered = self.definition.modules.render_all(&canonical)?;
        let state = FunctionState::render(&canonical, &self.config)
            .map_err(|err| EngineError::new(err).with_module(STATE_MODULE_ID))?;
        rendered.push(Rendered::new(STATE_MODULE_ID, state));

        let propagator = MetadataPropagator::new(canonical.instance(), &self.config);
        for output in &mut rendered {
            propagator.propagate(&mut output.document).map_err(|err| {
                EngineError::new(err)
                    .with_module(output.module.as_str())
                    .with_resource(output.document.identity())
            })?;
        }

        if let Some(correlator) = &self.definition.correlator {
            rendered.extend(correlator.correlate(batch, &canonical)?);
        }

        rendered.sort_by(|a, b| {
            a.document
                .identity()
                .cmp(&b.document.identity())
                .then_with(|| a.module.cmp(&b.module))
        });
        for output in &rendered {
            debug!(
                module = output.module.as_str(),
                resource = %output.document.identity(),
                digest = %output.document.digest(),
                "emitting"
            );
        }
        info!(
            instance = canonical.instance().name(),
            namespace = canonical.instance().namespace(),
            synthesized = rendered.len(),
            "synthesis complete"
        );
        Ok(rendered)
    }

    /// Run one invocation: the input batch followed by synthesized documents
    ///
    /// # Errors
    /// Returns the first failure; the input is untouched either way
    pub fn run(
        &self,
        batch: &[ResourceDocument],
        function_config: &ResourceDocument,
    ) -> Result<Vec<ResourceDocument>, EngineError> {
        let synthesized = self.synthesize(batch, function_config)?;
        let mut output = batch.to_vec();
        output.extend(synthesized.into_iter().map(|rendered| rendered.document));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Gate;
    use cfunc_resource::ResourceIdentity;
    use pretty_assertions::assert_eq;

    fn definition() -> FunctionDefinition {
        FunctionDefinition::new("demo")
            .with_schema(
                ConfigSchema::new()
                    .with_toggle("extra_enabled")
                    .with_derived_name("secret_name", "secret"),
            )
            .with_module(TemplateModule::template(
                "service",
                Gate::Always,
                "apiVersion: v1\nkind: Service\nmetadata:\n  name: {{ name }}\n",
            ))
            .unwrap()
            .with_module(TemplateModule::template(
                "extra",
                Gate::toggle("extra_enabled"),
                "apiVersion: v1\nkind: Secret\nmetadata:\n  name: {{ names.secret_name }}\n",
            ))
            .unwrap()
    }

    fn function_config(data: &str) -> ResourceDocument {
        ResourceDocument::from_yaml(&format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: db\n  namespace: ns\ndata:\n{data}"
        ))
        .unwrap()
    }

    fn engine() -> Engine {
        Engine::new(definition(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn reserved_state_id_rejected() {
        let definition = FunctionDefinition::new("demo")
            .with_module(TemplateModule::from_fn(STATE_MODULE_ID, Gate::Always, |_| Ok(None)))
            .unwrap();
        assert!(matches!(
            Engine::new(definition, EngineConfig::default()),
            Err(ConfigurationError::DuplicateModule { .. })
        ));
    }

    #[test]
    fn synthesize_defaults() {
        let rendered = engine().synthesize(&[], &function_config("  {}\n")).unwrap();
        let ids: Vec<_> = rendered
            .iter()
            .map(|r| (r.module.as_str(), r.document.identity()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (STATE_MODULE_ID, ResourceIdentity::new("v1", "ConfigMap", "ns", "db")),
                ("service", ResourceIdentity::new("v1", "Service", "ns", "db")),
            ]
        );
        let service = &rendered[1].document;
        assert_eq!(service.label("app.kubernetes.io/name"), Some("demo"));
        assert_eq!(service.label("app.kubernetes.io/instance"), Some("db"));
    }

    #[test]
    fn toggle_override_enables_module() {
        let rendered = engine()
            .synthesize(&[], &function_config("  extra_enabled: \"true\"\n"))
            .unwrap();
        let secret = rendered.iter().find(|r| r.module == "extra").unwrap();
        assert_eq!(secret.document.name(), "db-ns-secret");
    }

    #[test]
    fn missing_name_fails_with_function_config_identity() {
        let fc = ResourceDocument::from_yaml("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  namespace: ns\n").unwrap();
        let err = engine().synthesize(&[], &fc).unwrap_err();
        assert!(matches!(err.kind(), ConfigurationError::MissingIdentity { .. }));
        assert_eq!(err.resource().map(|r| r.kind.as_str()), Some("ConfigMap"));
    }

    #[test]
    fn run_keeps_inputs_first_and_untouched() {
        let input = ResourceDocument::from_yaml("apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\n  namespace: other\n").unwrap();
        let batch = vec![input.clone()];
        let output = engine().run(&batch, &function_config("  {}\n")).unwrap();
        assert_eq!(output[0], input);
        assert_eq!(batch[0], input);
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn invalid_override_emits_nothing() {
        let err = engine()
            .run(&[], &function_config("  extra_enabled: maybe\n"))
            .unwrap_err();
        assert!(matches!(err.kind(), ConfigurationError::InvalidOverride { .. }));
    }
}
