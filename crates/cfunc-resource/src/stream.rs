//! ResourceList stream format
//!
//! Reads and writes the configuration-function wire format:
//!
//! ```yaml
//! apiVersion: config.kubernetes.io/v1alpha1
//! kind: ResourceList
//! functionConfig: { ... }
//! items: [ ... ]
//! ```
//!
//! A plain multi-document YAML stream is also accepted; every document is
//! then an item and there is no function config.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::document::{DocumentError, ResourceDocument};

/// API version of the ResourceList envelope
pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1alpha1";

/// Kind of the ResourceList envelope
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

/// Batch of documents plus the distinguished function configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceList {
    /// Resource documents, in stream order
    pub items: Vec<ResourceDocument>,

    /// Function configuration, if the envelope carried one
    pub function_config: Option<ResourceDocument>,
}

impl ResourceList {
    /// Create from items and function config
    #[inline]
    #[must_use]
    pub fn new(items: Vec<ResourceDocument>, function_config: Option<ResourceDocument>) -> Self {
        Self {
            items,
            function_config,
        }
    }

    /// Parse a ResourceList envelope or a multi-document stream
    ///
    /// # Errors
    /// Returns error on invalid YAML or non-mapping items
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let mut documents = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(content) {
            let value = Value::deserialize(doc)?;
            if !value.is_null() {
                documents.push(value);
            }
        }

        if let [single] = documents.as_slice() {
            if single.get("kind").and_then(Value::as_str) == Some(RESOURCE_LIST_KIND) {
                return Self::from_envelope(single);
            }
        }

        let items = documents
            .into_iter()
            .map(ResourceDocument::from_value)
            .collect::<Result<_, _>>()?;
        Ok(Self::new(items, None))
    }

    fn from_envelope(envelope: &Value) -> Result<Self, DocumentError> {
        let items = match envelope.get("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .cloned()
                .map(ResourceDocument::from_value)
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(DocumentError::TypeMismatch {
                    path: "items".to_string(),
                    expected: "sequence",
                })
            }
        };

        let function_config = match envelope.get("functionConfig") {
            None | Some(Value::Null) => None,
            Some(value) => Some(ResourceDocument::from_value(value.clone())?),
        };

        Ok(Self::new(items, function_config))
    }

    /// Serialize as a ResourceList envelope
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, DocumentError> {
        let mut envelope = Mapping::new();
        envelope.insert("apiVersion".into(), RESOURCE_LIST_API_VERSION.into());
        envelope.insert("kind".into(), RESOURCE_LIST_KIND.into());
        if let Some(function_config) = &self.function_config {
            envelope.insert("functionConfig".into(), function_config.value().clone());
        }
        envelope.insert(
            "items".into(),
            Value::Sequence(self.items.iter().map(|item| item.value().clone()).collect()),
        );
        Ok(serde_yaml::to_string(&Value::Mapping(envelope))?)
    }
}
