//! Function state record
//!
//! The only persistence across invocations: a ConfigMap named after the
//! instance that records every toggle and derived name chosen in run N, and
//! is read back among the scoped resources of run N+1.

use std::collections::BTreeMap;

use cfunc_resource::{FieldPath, Mapping, ResourceDocument, ResourceIdentity, Value};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::ConfigurationError;
use crate::reconcile::{is_resource_name, parse_toggle, CanonicalConfig, ConfigSchema, Setting};

/// Module id of the state record
pub const STATE_MODULE_ID: &str = "function-state";

/// Settings recovered from a previous run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionState {
    source: Option<ResourceIdentity>,
    toggles: BTreeMap<String, bool>,
    names: BTreeMap<String, String>,
}

impl FunctionState {
    /// Find and read the state record among scoped resources
    ///
    /// When several records match, the smallest identity wins. Keys the
    /// schema does not declare are ignored.
    #[must_use]
    pub fn recover(
        scoped: &[&ResourceDocument],
        schema: &ConfigSchema,
        config: &EngineConfig,
    ) -> Option<Self> {
        let record = scoped
            .iter()
            .filter(|doc| is_state_record(doc, config))
            .min_by_key(|doc| doc.identity())?;

        let mut state = Self {
            source: Some(record.identity()),
            ..Self::default()
        };
        for (key, value) in record.string_map(&FieldPath::fields(&["data"])) {
            match schema.setting(&key) {
                Some(Setting::Toggle) => match parse_toggle(&key, &value) {
                    Ok(on) => {
                        state.toggles.insert(key, on);
                    }
                    Err(err) => warn!(%err, "ignoring recorded toggle"),
                },
                Some(Setting::DerivedName { .. }) => {
                    if is_resource_name(&value) {
                        state.names.insert(key, value);
                    } else {
                        warn!(key = key.as_str(), value = value.as_str(), "ignoring recorded name");
                    }
                }
                _ => debug!(key = key.as_str(), "ignoring recorded key"),
            }
        }
        Some(state)
    }

    /// Identity of the record this state was read from
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&ResourceIdentity> {
        self.source.as_ref()
    }

    /// Recorded toggles
    #[inline]
    #[must_use]
    pub fn toggles(&self) -> &BTreeMap<String, bool> {
        &self.toggles
    }

    /// Recorded derived names
    #[inline]
    #[must_use]
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// Render the state record for the current snapshot
    ///
    /// # Errors
    /// Returns error if the document cannot be assembled
    pub fn render(
        canonical: &CanonicalConfig,
        config: &EngineConfig,
    ) -> Result<ResourceDocument, ConfigurationError> {
        let instance = canonical.instance();
        let mut document = ResourceDocument::new(&ResourceIdentity::new(
            "v1",
            "ConfigMap",
            instance.namespace(),
            instance.name(),
        ));
        for (key, value) in instance.label_pairs(config) {
            document.set_label(key, value)?;
        }
        document.set_annotation(&config.state_annotation, "true")?;

        let mut entries: BTreeMap<&str, String> = canonical
            .toggles()
            .iter()
            .map(|(key, on)| (key.as_str(), on.to_string()))
            .collect();
        entries.extend(canonical.names().iter().map(|(k, v)| (k.as_str(), v.clone())));

        let data: Mapping = entries
            .into_iter()
            .map(|(key, value)| (Value::from(key), Value::from(value)))
            .collect();
        document.set(&FieldPath::fields(&["data"]), Value::Mapping(data))?;
        Ok(document)
    }
}

/// Check whether a resource is a function state record
#[must_use]
pub fn is_state_record(document: &ResourceDocument, config: &EngineConfig) -> bool {
    document.annotation(&config.state_annotation) == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::FunctionInstance;
    use crate::reconcile::DiscoveredFacts;
    use pretty_assertions::assert_eq;

    fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_toggle("tls_enabled")
            .with_derived_name("acl_secret_name", "acl")
    }

    fn record(name: &str, data: &str) -> ResourceDocument {
        ResourceDocument::from_yaml(&format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n  namespace: ns\n  annotations:\n    cfunc/function-state: \"true\"\ndata:\n{data}"
        ))
        .unwrap()
    }

    #[test]
    fn recover_reads_declared_keys() {
        let doc = record("db", "  acl_secret_name: legacy-acl-secret\n  tls_enabled: \"true\"\n  other: x\n");
        let state = FunctionState::recover(&[&doc], &schema(), &EngineConfig::default()).unwrap();
        assert_eq!(state.names().get("acl_secret_name").map(String::as_str), Some("legacy-acl-secret"));
        assert_eq!(state.toggles().get("tls_enabled"), Some(&true));
        assert_eq!(state.names().len(), 1);
    }

    #[test]
    fn recover_skips_unmarked_resources() {
        let mut doc = record("db", "  acl_secret_name: x\n");
        doc.remove_annotation("cfunc/function-state");
        assert!(FunctionState::recover(&[&doc], &schema(), &EngineConfig::default()).is_none());
    }

    #[test]
    fn recover_prefers_smallest_identity() {
        let a = record("a", "  acl_secret_name: from-a\n");
        let b = record("b", "  acl_secret_name: from-b\n");
        for batch in [[&a, &b], [&b, &a]] {
            let state = FunctionState::recover(&batch, &schema(), &EngineConfig::default()).unwrap();
            assert_eq!(state.names()["acl_secret_name"], "from-a");
        }
    }

    #[test]
    fn recover_ignores_bad_toggle_and_empty_name() {
        let doc = record("db", "  tls_enabled: sometimes\n  acl_secret_name: \"\"\n");
        let state = FunctionState::recover(&[&doc], &schema(), &EngineConfig::default()).unwrap();
        assert!(state.toggles().is_empty());
        assert!(state.names().is_empty());
    }

    #[test]
    fn recover_ignores_names_that_are_not_resource_names() {
        let doc = record("db", "  acl_secret_name: \"a #b\"\n");
        let state = FunctionState::recover(&[&doc], &schema(), &EngineConfig::default()).unwrap();
        assert!(state.names().is_empty());
    }

    #[test]
    fn render_records_snapshot() {
        let canonical = CanonicalConfig::new(
            FunctionInstance::new("db", "ns", "consul-server"),
            [("tls_enabled".to_string(), true)].into_iter().collect(),
            [("acl_secret_name".to_string(), "db-ns-acl".to_string())].into_iter().collect(),
            DiscoveredFacts::new("db-server", 1),
        );
        let doc = FunctionState::render(&canonical, &EngineConfig::default()).unwrap();

        let expected = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: db
  namespace: ns
  labels:
    app.kubernetes.io/name: consul-server
    app.kubernetes.io/instance: db
  annotations:
    cfunc/function-state: 'true'
data:
  acl_secret_name: db-ns-acl
  tls_enabled: 'true'
"#;
        assert_eq!(doc.to_yaml().unwrap(), expected);
        assert!(is_state_record(&doc, &EngineConfig::default()));

        let state = FunctionState::recover(&[&doc], &schema(), &EngineConfig::default()).unwrap();
        assert_eq!(state.toggles().get("tls_enabled"), Some(&true));
    }
}
