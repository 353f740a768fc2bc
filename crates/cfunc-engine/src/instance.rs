//! Function instance identity
//!
//! A [`FunctionInstance`] is "this" invocation: the name and namespace from
//! the function config plus the two canonical labels stamped on everything
//! the instance manages.

use cfunc_resource::{FieldPath, ResourceDocument};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::ConfigurationError;

/// Canonical label values of an instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CanonicalLabels {
    /// Application name label value
    pub name: String,
    /// Instance label value
    pub instance: String,
}

/// Identity of the invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionInstance {
    name: String,
    namespace: String,
    labels: CanonicalLabels,
}

impl FunctionInstance {
    /// Create an instance with default labels (`app_name`, `name`)
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, app_name: &str) -> Self {
        let name = name.into();
        Self {
            labels: CanonicalLabels {
                name: app_name.to_string(),
                instance: name.clone(),
            },
            name,
            namespace: namespace.into(),
        }
    }

    /// Read the instance from a function config document
    ///
    /// Non-empty canonical labels on the config override the defaults.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MissingIdentity`] if `metadata.name` is
    /// absent or empty
    pub fn from_function_config(
        function_config: &ResourceDocument,
        app_name: &str,
        config: &EngineConfig,
    ) -> Result<Self, ConfigurationError> {
        let name = function_config.name();
        if name.is_empty() {
            return Err(ConfigurationError::MissingIdentity {
                field: "metadata.name",
            });
        }

        let mut instance = Self::new(name, function_config.namespace(), app_name);
        let labels = function_config.string_map(&FieldPath::fields(&["metadata", "labels"]));
        if let Some(value) = labels.get(&config.name_label).filter(|v| !v.is_empty()) {
            instance.labels.name.clone_from(value);
        }
        if let Some(value) = labels.get(&config.instance_label).filter(|v| !v.is_empty()) {
            instance.labels.instance.clone_from(value);
        }
        Ok(instance)
    }

    /// Override the canonical labels
    #[inline]
    #[must_use]
    pub fn with_labels(mut self, name: impl Into<String>, instance: impl Into<String>) -> Self {
        self.labels = CanonicalLabels {
            name: name.into(),
            instance: instance.into(),
        };
        self
    }

    /// Get instance name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get instance namespace (may be empty)
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get canonical labels
    #[inline]
    #[must_use]
    pub fn labels(&self) -> &CanonicalLabels {
        &self.labels
    }

    /// Label key/value pairs in stamping order
    #[must_use]
    pub fn label_pairs<'a>(&'a self, config: &'a EngineConfig) -> [(&'a str, &'a str); 2] {
        [
            (config.name_label.as_str(), self.labels.name.as_str()),
            (config.instance_label.as_str(), self.labels.instance.as_str()),
        ]
    }

    /// Deterministic default for a derived name: `{name}-{namespace}-{suffix}`
    #[must_use]
    pub fn default_name(&self, suffix: &str) -> String {
        format!("{}-{}-{suffix}", self.name, self.namespace)
    }

    /// Check whether a correlation target names this instance
    #[inline]
    #[must_use]
    pub fn is_addressed_by(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace == namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_config(yaml: &str) -> ResourceDocument {
        ResourceDocument::from_yaml(yaml).unwrap()
    }

    #[test]
    fn instance_defaults() {
        let doc = function_config("kind: ConfigMap\nmetadata: {name: db, namespace: ns}\n");
        let instance =
            FunctionInstance::from_function_config(&doc, "consul-server", &EngineConfig::default())
                .unwrap();
        assert_eq!(instance.name(), "db");
        assert_eq!(instance.namespace(), "ns");
        assert_eq!(instance.labels().name, "consul-server");
        assert_eq!(instance.labels().instance, "db");
    }

    #[test]
    fn instance_label_overrides() {
        let doc = function_config(
            r#"
kind: ConfigMap
metadata:
  name: db
  labels:
    app.kubernetes.io/name: consul
    app.kubernetes.io/instance: ""
"#,
        );
        let instance =
            FunctionInstance::from_function_config(&doc, "consul-server", &EngineConfig::default())
                .unwrap();
        assert_eq!(instance.labels().name, "consul");
        assert_eq!(instance.labels().instance, "db");
        assert_eq!(instance.namespace(), "");
    }

    #[test]
    fn instance_requires_name() {
        let doc = function_config("kind: ConfigMap\nmetadata: {namespace: ns}\n");
        let err = FunctionInstance::from_function_config(&doc, "app", &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingIdentity { .. }));
    }

    #[test]
    fn default_name_pattern() {
        let instance = FunctionInstance::new("myinstance", "mynamespace", "consul-server");
        assert_eq!(instance.default_name("acl"), "myinstance-mynamespace-acl");
        assert!(instance.is_addressed_by("myinstance", "mynamespace"));
        assert!(!instance.is_addressed_by("myinstance", "other"));
    }
}
