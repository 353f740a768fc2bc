//! Cross-Resource Correlator
//!
//! Resources anywhere in the batch can ask an instance for a contribution by
//! carrying a YAML descriptor in a designated annotation:
//!
//! ```yaml
//! metadata:
//!   name: db          # target instance name (required)
//!   namespace: ns     # target instance namespace (required)
//! kind: sidecar       # contribution kind (optional, default "sidecar")
//! parameters: {}      # contribution parameters (optional)
//! ```
//!
//! Every descriptor in the batch is validated before addressing is decided,
//! so a malformed descriptor aborts the run even if it names another
//! instance. Requests for other instances are skipped silently.

use std::collections::BTreeMap;
use std::fmt;

use cfunc_resource::{ResourceDocument, ResourceIdentity, Value};
use tracing::{debug, info};

use crate::error::{ConfigurationError, EngineError};
use crate::instance::FunctionInstance;
use crate::reconcile::CanonicalConfig;
use crate::registry::{Gate, Rendered};

/// Contribution kind used when a descriptor names none
pub const DEFAULT_CONTRIBUTION_KIND: &str = "sidecar";

/// Typed correlation request parsed from an annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationRequest {
    /// Target instance name
    pub target_name: String,
    /// Target instance namespace
    pub target_namespace: String,
    /// Resource carrying the request
    pub requester: ResourceIdentity,
    /// Requested contribution kind
    pub kind: String,
    /// Free-form contribution parameters
    pub parameters: BTreeMap<String, String>,
}

impl CorrelationRequest {
    /// Parse a descriptor carried by `requester`
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MalformedDescriptor`] if the descriptor
    /// is not a YAML mapping, lacks `metadata.name` or `metadata.namespace`,
    /// or has a non-string kind or non-scalar parameters
    pub fn parse(requester: &ResourceDocument, descriptor: &str) -> Result<Self, ConfigurationError> {
        let identity = requester.identity();
        let malformed =
            |reason: &str| ConfigurationError::malformed_descriptor(identity.clone(), reason);

        let value: Value = serde_yaml::from_str(descriptor)
            .map_err(|err| malformed(&format!("invalid YAML: {err}")))?;
        if !value.is_mapping() {
            return Err(malformed("descriptor must be a mapping"));
        }

        let metadata = |field: &str| {
            value
                .get("metadata")
                .and_then(|m| m.get(field))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let target_name = metadata("name")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed("metadata.name missing"))?;
        let target_namespace =
            metadata("namespace").ok_or_else(|| malformed("metadata.namespace missing"))?;

        let kind = match value.get("kind") {
            None | Some(Value::Null) => DEFAULT_CONTRIBUTION_KIND.to_string(),
            Some(Value::String(kind)) if !kind.is_empty() => kind.clone(),
            Some(_) => return Err(malformed("kind must be a non-empty string")),
        };

        let mut parameters = BTreeMap::new();
        match value.get("parameters") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(map)) => {
                for (key, value) in map {
                    let (Some(key), Some(value)) = (key.as_str(), scalar(value)) else {
                        return Err(malformed("parameters must map strings to scalars"));
                    };
                    parameters.insert(key.to_string(), value);
                }
            }
            Some(_) => return Err(malformed("parameters must be a mapping")),
        }

        Ok(Self {
            target_name,
            target_namespace,
            requester: identity.clone(),
            kind,
            parameters,
        })
    }

    /// Check whether the request is addressed to the instance
    #[inline]
    #[must_use]
    pub fn is_addressed_to(&self, instance: &FunctionInstance) -> bool {
        instance.is_addressed_by(&self.target_name, &self.target_namespace)
    }

    /// Get a parameter
    #[inline]
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A contribution an instance makes to a requesting resource
pub trait Contribution: Send + Sync + fmt::Debug {
    /// Contribution kind matched against request kinds
    fn kind(&self) -> &str;

    /// Gate controlling whether addressed requests are served
    fn gate(&self) -> Gate {
        Gate::Always
    }

    /// Build the documents for one request
    ///
    /// `target` is the requesting resource as found in the batch; it is only
    /// read, never mutated.
    ///
    /// # Errors
    /// Returns error if the contribution cannot be rendered
    fn contribute(
        &self,
        request: &CorrelationRequest,
        target: &ResourceDocument,
        config: &CanonicalConfig,
    ) -> Result<Vec<ResourceDocument>, ConfigurationError>;
}

/// Scans the whole batch for requests addressed to this instance
#[derive(Debug)]
pub struct Correlator {
    annotation: String,
    contributions: BTreeMap<String, Box<dyn Contribution>>,
}

impl Correlator {
    /// Create correlator reading `annotation`
    #[inline]
    #[must_use]
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            contributions: BTreeMap::new(),
        }
    }

    /// Register a contribution
    ///
    /// # Errors
    /// Returns [`ConfigurationError::DuplicateContribution`] if the kind is taken
    pub fn register(&mut self, contribution: Box<dyn Contribution>) -> Result<(), ConfigurationError> {
        let kind = contribution.kind().to_string();
        if self.contributions.contains_key(&kind) {
            return Err(ConfigurationError::DuplicateContribution { kind });
        }
        self.contributions.insert(kind, contribution);
        Ok(())
    }

    /// Register a contribution, returning the correlator
    ///
    /// # Errors
    /// Returns error if the kind is taken
    pub fn with_contribution(
        mut self,
        contribution: impl Contribution + 'static,
    ) -> Result<Self, ConfigurationError> {
        self.register(Box::new(contribution))?;
        Ok(self)
    }

    /// Get annotation key
    #[inline]
    #[must_use]
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Registered contribution kinds
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.contributions.keys().map(String::as_str).collect()
    }

    /// Parse every descriptor in the batch
    ///
    /// # Errors
    /// Returns the first malformed descriptor
    pub fn requests<'a>(
        &self,
        batch: &'a [ResourceDocument],
    ) -> Result<Vec<(CorrelationRequest, &'a ResourceDocument)>, EngineError> {
        let mut requests = Vec::new();
        for document in batch {
            let Some(descriptor) = document.annotation(&self.annotation) else {
                continue;
            };
            let request = CorrelationRequest::parse(document, descriptor)
                .map_err(|err| EngineError::new(err).with_resource(document.identity()))?;
            requests.push((request, document));
        }
        Ok(requests)
    }

    /// Serve every request addressed to the instance
    ///
    /// # Errors
    /// Returns error for malformed descriptors, unknown contribution kinds
    /// addressed to this instance, or contribution failures
    pub fn correlate(
        &self,
        batch: &[ResourceDocument],
        config: &CanonicalConfig,
    ) -> Result<Vec<Rendered>, EngineError> {
        let instance = config.instance();
        let mut rendered = Vec::new();

        for (request, target) in self.requests(batch)? {
            if !request.is_addressed_to(instance) {
                debug!(
                    requester = %request.requester,
                    target_name = request.target_name.as_str(),
                    target_namespace = request.target_namespace.as_str(),
                    "correlation request addressed elsewhere"
                );
                continue;
            }

            let module = format!("correlate/{}", request.kind);
            let tag = |err: ConfigurationError| {
                EngineError::new(err)
                    .with_module(module.as_str())
                    .with_resource(request.requester.clone())
            };

            let Some(contribution) = self.contributions.get(&request.kind) else {
                return Err(tag(ConfigurationError::malformed_descriptor(
                    request.requester.clone(),
                    format!("unknown contribution kind '{}'", request.kind),
                )));
            };
            if !contribution.gate().is_open(config).map_err(tag)? {
                info!(requester = %request.requester, kind = request.kind.as_str(), "contribution disabled, request skipped");
                continue;
            }

            let documents = contribution.contribute(&request, target, config).map_err(tag)?;
            info!(
                requester = %request.requester,
                kind = request.kind.as_str(),
                documents = documents.len(),
                "served correlation request"
            );
            rendered.extend(
                documents
                    .into_iter()
                    .map(|document| Rendered::new(module.as_str(), document)),
            );
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::DiscoveredFacts;

    const ANNOTATION: &str = "example.com/inject";

    #[derive(Debug)]
    struct Marker;

    impl Contribution for Marker {
        fn kind(&self) -> &str {
            "sidecar"
        }

        fn gate(&self) -> Gate {
            Gate::toggle("sidecar_enabled")
        }

        fn contribute(
            &self,
            request: &CorrelationRequest,
            _target: &ResourceDocument,
            _config: &CanonicalConfig,
        ) -> Result<Vec<ResourceDocument>, ConfigurationError> {
            Ok(vec![ResourceDocument::new(&request.requester)])
        }
    }

    fn config(enabled: bool) -> CanonicalConfig {
        CanonicalConfig::new(
            FunctionInstance::new("db", "ns", "consul-server"),
            [("sidecar_enabled".to_string(), enabled)].into_iter().collect(),
            [].into_iter().collect(),
            DiscoveredFacts::new("db-server", 1),
        )
    }

    fn requester(name: &str, descriptor: &str) -> ResourceDocument {
        let mut doc = ResourceDocument::new(&ResourceIdentity::new("apps/v1", "Deployment", "app", name));
        doc.set_annotation(ANNOTATION, descriptor).unwrap();
        doc
    }

    fn correlator() -> Correlator {
        Correlator::new(ANNOTATION).with_contribution(Marker).unwrap()
    }

    #[test]
    fn parse_full_descriptor() {
        let doc = requester("web", "metadata: {name: db, namespace: ns}\nkind: sidecar\nparameters: {image: x, replicas: 2}\n");
        let request = CorrelationRequest::parse(&doc, doc.annotation(ANNOTATION).unwrap()).unwrap();
        assert_eq!(request.target_name, "db");
        assert_eq!(request.kind, "sidecar");
        assert_eq!(request.parameter("replicas"), Some("2"));
        assert_eq!(request.requester.name, "web");
    }

    #[test]
    fn parse_defaults_kind() {
        let doc = requester("web", "metadata: {name: db, namespace: ns}\n");
        let request = CorrelationRequest::parse(&doc, doc.annotation(ANNOTATION).unwrap()).unwrap();
        assert_eq!(request.kind, DEFAULT_CONTRIBUTION_KIND);
        assert!(request.parameters.is_empty());
    }

    #[test]
    fn parse_rejects_malformed() {
        for descriptor in [
            "metadata: {namespace: ns}\n",
            "metadata: {name: db}\n",
            "just text",
            "metadata: {name: db, namespace: ns}\nparameters: [a]\n",
            "metadata: {name: db, namespace: ns}\nkind: 3\n",
            "metadata: {name: [",
        ] {
            let doc = requester("web", descriptor);
            let err = CorrelationRequest::parse(&doc, descriptor).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::MalformedDescriptor { .. }),
                "{descriptor}"
            );
        }
    }

    #[test]
    fn addressed_request_served() {
        let batch = vec![requester("web", "metadata: {name: db, namespace: ns}\n")];
        let rendered = correlator().correlate(&batch, &config(true)).unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].module, "correlate/sidecar");
        assert_eq!(rendered[0].document.name(), "web");
    }

    #[test]
    fn request_for_other_instance_skipped() {
        let batch = vec![
            requester("web", "metadata: {name: other, namespace: ns}\n"),
            requester("api", "metadata: {name: db, namespace: elsewhere}\n"),
        ];
        assert!(correlator().correlate(&batch, &config(true)).unwrap().is_empty());
    }

    #[test]
    fn disabled_contribution_skipped() {
        let batch = vec![requester("web", "metadata: {name: db, namespace: ns}\n")];
        assert!(correlator().correlate(&batch, &config(false)).unwrap().is_empty());
    }

    #[test]
    fn malformed_descriptor_aborts_even_when_not_addressed() {
        let batch = vec![
            requester("web", "metadata: {name: db, namespace: ns}\n"),
            requester("bad", "metadata: {name: other}\n"),
        ];
        let err = correlator().correlate(&batch, &config(true)).unwrap_err();
        assert_eq!(err.resource().map(|r| r.name.as_str()), Some("bad"));
    }

    #[test]
    fn unknown_kind_addressed_here_fails() {
        let batch = vec![requester("web", "metadata: {name: db, namespace: ns}\nkind: backup\n")];
        let err = correlator().correlate(&batch, &config(true)).unwrap_err();
        assert_eq!(err.module(), Some("correlate/backup"));
        assert!(matches!(err.kind(), ConfigurationError::MalformedDescriptor { .. }));
    }

    #[test]
    fn unknown_kind_elsewhere_ignored() {
        let batch = vec![requester("web", "metadata: {name: x, namespace: ns}\nkind: backup\n")];
        assert!(correlator().correlate(&batch, &config(true)).unwrap().is_empty());
    }

    #[test]
    fn duplicate_kind_rejected() {
        let err = correlator().with_contribution(Marker).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateContribution { .. }));
    }
}
