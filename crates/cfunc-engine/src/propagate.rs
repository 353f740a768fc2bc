//! Metadata Propagator
//!
//! Stamps canonical labels and namespace onto synthesized resources. Labels
//! are mirrored into pod templates and match-label selectors of workload
//! kinds, and into the selector of Services. A
//! `<preserve prefix><label>: "true"` annotation skips that label everywhere
//! and is stripped afterwards.

use std::collections::BTreeSet;

use cfunc_resource::{FieldPath, ResourceDocument, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ConfigurationError;
use crate::instance::FunctionInstance;

/// Nested label locations for a kind
fn label_paths(kind: &str) -> Vec<FieldPath> {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => vec![
            FieldPath::fields(&["spec", "template", "metadata", "labels"]),
            FieldPath::fields(&["spec", "selector", "matchLabels"]),
        ],
        "Job" => vec![FieldPath::fields(&["spec", "template", "metadata", "labels"])],
        "CronJob" => vec![FieldPath::fields(&[
            "spec",
            "jobTemplate",
            "spec",
            "template",
            "metadata",
            "labels",
        ])],
        "Service" => vec![FieldPath::fields(&["spec", "selector"])],
        _ => Vec::new(),
    }
}

/// Applies instance metadata to synthesized resources
#[derive(Debug, Clone, Copy)]
pub struct MetadataPropagator<'a> {
    instance: &'a FunctionInstance,
    config: &'a EngineConfig,
}

impl<'a> MetadataPropagator<'a> {
    /// Create propagator for an instance
    #[inline]
    #[must_use]
    pub fn new(instance: &'a FunctionInstance, config: &'a EngineConfig) -> Self {
        Self { instance, config }
    }

    /// Propagate metadata onto one document in place
    ///
    /// # Errors
    /// Returns error if a label location exists with a non-mapping value
    pub fn propagate(&self, document: &mut ResourceDocument) -> Result<(), ConfigurationError> {
        let preserved = self.take_preserve_markers(document);

        let mut paths = vec![FieldPath::fields(&["metadata", "labels"])];
        paths.extend(label_paths(document.kind()));

        for (key, value) in self.instance.label_pairs(self.config) {
            if preserved.contains(key) {
                debug!(resource = %document.identity(), label = key, "label preserved");
                continue;
            }
            for path in &paths {
                document
                    .ensure_mapping(path)?
                    .insert(Value::from(key), Value::from(value));
            }
        }

        if !self.instance.namespace().is_empty() {
            document.set_namespace(self.instance.namespace())?;
        }
        Ok(())
    }

    /// Remove every preserve marker, returning the labels marked `"true"`
    fn take_preserve_markers(&self, document: &mut ResourceDocument) -> BTreeSet<String> {
        let prefix = self.config.preserve_label_prefix.as_str();
        let markers: Vec<(String, String)> = document
            .annotations()
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix) && key.len() > prefix.len())
            .collect();

        let mut preserved = BTreeSet::new();
        for (marker, value) in markers {
            document.remove_annotation(&marker);
            if value == "true" {
                preserved.insert(marker[prefix.len()..].to_string());
            }
        }
        preserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn instance() -> FunctionInstance {
        FunctionInstance::new("db", "ns", "consul-server")
    }

    fn propagate(yaml: &str) -> ResourceDocument {
        let mut doc = ResourceDocument::from_yaml(yaml).unwrap();
        let config = EngineConfig::default();
        let instance = instance();
        MetadataPropagator::new(&instance, &config).propagate(&mut doc).unwrap();
        doc
    }

    fn labels_at(doc: &ResourceDocument, path: &str) -> Vec<(String, String)> {
        doc.string_map(&path.parse().unwrap()).into_iter().collect()
    }

    fn canonical() -> Vec<(String, String)> {
        vec![
            ("app.kubernetes.io/instance".to_string(), "db".to_string()),
            ("app.kubernetes.io/name".to_string(), "consul-server".to_string()),
        ]
    }

    #[test]
    fn stamps_metadata_and_namespace() {
        let doc = propagate("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n");
        assert_eq!(labels_at(&doc, "metadata.labels"), canonical());
        assert_eq!(doc.namespace(), "ns");
    }

    #[test]
    fn workload_template_and_selector() {
        let doc = propagate(
            "apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: x\nspec:\n  selector:\n    matchLabels:\n      app.kubernetes.io/name: old\n    matchExpressions: []\n",
        );
        assert_eq!(labels_at(&doc, "spec.template.metadata.labels"), canonical());
        assert_eq!(labels_at(&doc, "spec.selector.matchLabels"), canonical());
        assert_eq!(
            doc.get(&"spec.selector.matchExpressions".parse().unwrap()),
            Some(&Value::Sequence(Vec::new()))
        );
    }

    #[test]
    fn service_selector() {
        let doc = propagate("apiVersion: v1\nkind: Service\nmetadata:\n  name: x\n");
        assert_eq!(labels_at(&doc, "spec.selector"), canonical());
    }

    #[test]
    fn job_and_cronjob_templates() {
        let job = propagate("apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: x\n");
        assert_eq!(labels_at(&job, "spec.template.metadata.labels"), canonical());
        assert!(job.get(&"spec.selector".parse().unwrap()).is_none());

        let cron = propagate("apiVersion: batch/v1\nkind: CronJob\nmetadata:\n  name: x\n");
        assert_eq!(
            labels_at(&cron, "spec.jobTemplate.spec.template.metadata.labels"),
            canonical()
        );
    }

    #[test]
    fn preserved_label_kept_and_marker_stripped() {
        let doc = propagate(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: x
  labels:
    app.kubernetes.io/name: custom
  annotations:
    cfunc/preserve-label/app.kubernetes.io/name: "true"
"#,
        );
        assert_eq!(doc.label("app.kubernetes.io/name"), Some("custom"));
        assert_eq!(doc.label("app.kubernetes.io/instance"), Some("db"));
        assert!(doc
            .get(&"spec.template.metadata.labels".parse().unwrap())
            .and_then(|labels| labels.get("app.kubernetes.io/name"))
            .is_none());
        assert!(doc.annotations().is_empty());
    }

    #[test]
    fn marker_not_true_is_stripped_and_ignored() {
        let doc = propagate(
            r#"
kind: ConfigMap
metadata:
  name: x
  labels:
    app.kubernetes.io/name: custom
  annotations:
    cfunc/preserve-label/app.kubernetes.io/name: "false"
    other: kept
"#,
        );
        assert_eq!(doc.label("app.kubernetes.io/name"), Some("consul-server"));
        assert_eq!(doc.annotation("other"), Some("kept"));
        assert_eq!(doc.annotations().len(), 1);
    }

    #[test]
    fn empty_namespace_left_alone() {
        let mut doc = ResourceDocument::from_yaml("kind: ConfigMap\nmetadata:\n  name: x\n  namespace: keep\n").unwrap();
        let config = EngineConfig::default();
        let instance = FunctionInstance::new("db", "", "consul-server");
        MetadataPropagator::new(&instance, &config).propagate(&mut doc).unwrap();
        assert_eq!(doc.namespace(), "keep");
    }

    #[test]
    fn propagation_is_idempotent() {
        let once = propagate("apiVersion: apps/v1\nkind: DaemonSet\nmetadata:\n  name: x\n");
        let config = EngineConfig::default();
        let instance = instance();
        let mut twice = once.clone();
        MetadataPropagator::new(&instance, &config).propagate(&mut twice).unwrap();
        assert_eq!(once.to_yaml().unwrap(), twice.to_yaml().unwrap());
    }
}
