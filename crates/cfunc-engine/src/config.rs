//! Engine configuration

use serde::{Deserialize, Serialize};

/// Metadata conventions shared by every function run through the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Label holding the application name
    pub name_label: String,
    /// Label holding the instance name
    pub instance_label: String,
    /// Annotation prefix marking a label as preserved
    pub preserve_label_prefix: String,
    /// Annotation marking the function state record
    pub state_annotation: String,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With application name label key
    #[inline]
    #[must_use]
    pub fn with_name_label(mut self, key: impl Into<String>) -> Self {
        self.name_label = key.into();
        self
    }

    /// With instance label key
    #[inline]
    #[must_use]
    pub fn with_instance_label(mut self, key: impl Into<String>) -> Self {
        self.instance_label = key.into();
        self
    }

    /// With preserve-label annotation prefix
    #[inline]
    #[must_use]
    pub fn with_preserve_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.preserve_label_prefix = prefix.into();
        self
    }

    /// With function state annotation key
    #[inline]
    #[must_use]
    pub fn with_state_annotation(mut self, key: impl Into<String>) -> Self {
        self.state_annotation = key.into();
        self
    }

    /// Annotation key that preserves `label`
    #[must_use]
    pub fn preserve_marker(&self, label: &str) -> String {
        format!("{}{label}", self.preserve_label_prefix)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_label: "app.kubernetes.io/name".to_string(),
            instance_label: "app.kubernetes.io/instance".to_string(),
            preserve_label_prefix: "cfunc/preserve-label/".to_string(),
            state_annotation: "cfunc/function-state".to_string(),
        }
    }
}
