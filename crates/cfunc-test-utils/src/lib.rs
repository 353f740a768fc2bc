//! Testing utilities for the config function workspace
//!
//! Shared fixtures: function configs, workloads, labelled resources and
//! byte-stable renderings of output batches.

#![allow(missing_docs)]

use cfunc_resource::{ResourceDocument, ResourceIdentity, Value};

pub const NAME_LABEL: &str = "app.kubernetes.io/name";
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Builder for function config documents
#[derive(Debug, Clone)]
pub struct FunctionConfigBuilder {
    document: ResourceDocument,
}

impl FunctionConfigBuilder {
    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.document
            .set(&format!("data.{key}").parse().unwrap(), Value::from(value))
            .unwrap();
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.document.set_label(key, value).unwrap();
        self
    }

    pub fn build(self) -> ResourceDocument {
        self.document
    }
}

pub fn function_config(name: &str, namespace: &str) -> FunctionConfigBuilder {
    let mut document = ResourceDocument::new(&ResourceIdentity::new("v1", "ConfigMap", namespace, name));
    document
        .set(&"data".parse().unwrap(), Value::Mapping(Default::default()))
        .unwrap();
    FunctionConfigBuilder { document }
}

/// A resource carrying the instance label of `instance`
pub fn managed(kind: &str, namespace: &str, name: &str, instance: &str) -> ResourceDocument {
    let mut document = ResourceDocument::new(&ResourceIdentity::new("v1", kind, namespace, name));
    document.set_label(INSTANCE_LABEL, instance).unwrap();
    document
}

/// An unlabelled Deployment with one container and the given volumes
pub fn workload(namespace: &str, name: &str, volumes: &str) -> ResourceDocument {
    ResourceDocument::from_yaml(&format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  namespace: {namespace}
spec:
  template:
    spec:
      containers:
        - name: app
          image: example/app:1
      volumes: {volumes}
"#
    ))
    .unwrap()
}

/// Existing server StatefulSet with a replica count
pub fn statefulset(namespace: &str, name: &str, instance: &str, replicas: &str) -> ResourceDocument {
    ResourceDocument::from_yaml(&format!(
        r#"apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: {name}
  namespace: {namespace}
  labels:
    {INSTANCE_LABEL}: {instance}
spec:
  replicas: {replicas}
"#
    ))
    .unwrap()
}

pub fn annotate(mut document: ResourceDocument, key: &str, value: &str) -> ResourceDocument {
    document.set_annotation(key, value).unwrap();
    document
}

/// Correlation descriptor addressed to `name` in `namespace`
pub fn descriptor(name: &str, namespace: &str) -> String {
    format!("metadata:\n  name: {name}\n  namespace: {namespace}\n")
}

/// Multi-document YAML of a batch, in order
pub fn to_stream(documents: &[ResourceDocument]) -> String {
    documents
        .iter()
        .map(|document| document.to_yaml().unwrap())
        .collect::<Vec<_>>()
        .join("---\n")
}

pub fn identities(documents: &[ResourceDocument]) -> Vec<ResourceIdentity> {
    documents.iter().map(ResourceDocument::identity).collect()
}

pub fn find<'a>(documents: &'a [ResourceDocument], kind: &str, name: &str) -> Option<&'a ResourceDocument> {
    documents
        .iter()
        .find(|document| document.kind() == kind && document.name() == name)
}
