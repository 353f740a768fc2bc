//! Configuration state reconciliation
//!
//! Builds the single [`CanonicalConfig`] snapshot every module renders from,
//! in two phases: gather (defaults, recovered state, overrides, discovered
//! facts) and then freeze. Precedence is explicit > recovered > default.

use std::collections::BTreeMap;

use cfunc_resource::{FieldPath, ResourceDocument, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::ConfigurationError;
use crate::instance::FunctionInstance;
use crate::state::FunctionState;

/// Kind of a declared configuration key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// Feature toggle, default off
    Toggle,

    /// Derived name, default `{name}-{namespace}-{suffix}`
    DerivedName {
        /// Default-name suffix
        suffix: String,
    },
}

/// Where the workload whose facts are discovered lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRule {
    /// Workload kind (`StatefulSet`)
    pub kind: String,
    /// Name suffix; the workload is named `{name}-{suffix}`
    pub name_suffix: String,
}

impl WorkloadRule {
    /// Workload name for an instance
    #[must_use]
    pub fn workload_name(&self, instance: &FunctionInstance) -> String {
        format!("{}-{}", instance.name(), self.name_suffix)
    }
}

/// Configuration keys a function understands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSchema {
    settings: BTreeMap<String, Setting>,
    workload: Option<WorkloadRule>,
}

impl ConfigSchema {
    /// Create new empty schema
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature toggle
    #[must_use]
    pub fn with_toggle(mut self, key: impl Into<String>) -> Self {
        self.settings.insert(key.into(), Setting::Toggle);
        self
    }

    /// Declare a derived name
    #[must_use]
    pub fn with_derived_name(mut self, key: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.settings.insert(
            key.into(),
            Setting::DerivedName {
                suffix: suffix.into(),
            },
        );
        self
    }

    /// Declare the workload facts are discovered from
    #[must_use]
    pub fn with_workload(mut self, kind: impl Into<String>, name_suffix: impl Into<String>) -> Self {
        self.workload = Some(WorkloadRule {
            kind: kind.into(),
            name_suffix: name_suffix.into(),
        });
        self
    }

    /// Get the declaration for a key
    #[inline]
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&Setting> {
        self.settings.get(key)
    }

    /// Declared toggle keys, in key order
    pub fn toggles(&self) -> impl Iterator<Item = &str> {
        self.settings
            .iter()
            .filter(|(_, setting)| matches!(setting, Setting::Toggle))
            .map(|(key, _)| key.as_str())
    }

    /// Declared derived names and their suffixes, in key order
    pub fn derived_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().filter_map(|(key, setting)| match setting {
            Setting::DerivedName { suffix } => Some((key.as_str(), suffix.as_str())),
            Setting::Toggle => None,
        })
    }

    /// Get workload rule
    #[inline]
    #[must_use]
    pub fn workload(&self) -> Option<&WorkloadRule> {
        self.workload.as_ref()
    }
}

/// Explicit settings from the function config `data`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    values: BTreeMap<String, String>,
}

impl Overrides {
    /// Read the `data` mapping of a function config
    ///
    /// Scalar values are taken as strings; null values count as absent.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidOverride`] for non-scalar values
    /// or a non-mapping `data`
    pub fn from_function_config(function_config: &ResourceDocument) -> Result<Self, ConfigurationError> {
        let data = match function_config.get(&FieldPath::fields(&["data"])) {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Mapping(data)) => data,
            Some(_) => return Err(ConfigurationError::invalid_override("data", "expected a mapping")),
        };

        let mut values = BTreeMap::new();
        for (key, value) in data {
            let Some(key) = key.as_str() else {
                return Err(ConfigurationError::invalid_override(
                    format!("{key:?}"),
                    "keys must be strings",
                ));
            };
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => return Err(ConfigurationError::invalid_override(key, "expected a scalar")),
            };
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    /// Get an override value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterate overrides in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check if there are no overrides
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Largest replica count accepted from a workload
pub const MAX_REPLICAS: u32 = 10_000;

/// Operational facts read from resources already present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFacts {
    workload: String,
    replicas: u32,
}

impl DiscoveredFacts {
    /// Facts for a workload with `replicas` members named `{workload}-{i}`
    #[inline]
    #[must_use]
    pub fn new(workload: impl Into<String>, replicas: u32) -> Self {
        Self {
            workload: workload.into(),
            replicas,
        }
    }

    /// Get workload name
    #[inline]
    #[must_use]
    pub fn workload(&self) -> &str {
        &self.workload
    }

    /// Get replica count
    #[inline]
    #[must_use]
    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// Expected member hostnames, in ordinal order
    pub fn hostnames(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.replicas).map(move |i| format!("{}-{i}", self.workload))
    }
}

/// Immutable configuration snapshot for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalConfig {
    instance: FunctionInstance,
    toggles: BTreeMap<String, bool>,
    names: BTreeMap<String, String>,
    facts: DiscoveredFacts,
}

impl CanonicalConfig {
    /// Assemble a snapshot from resolved parts
    #[must_use]
    pub fn new(
        instance: FunctionInstance,
        toggles: BTreeMap<String, bool>,
        names: BTreeMap<String, String>,
        facts: DiscoveredFacts,
    ) -> Self {
        Self {
            instance,
            toggles,
            names,
            facts,
        }
    }

    /// Get instance identity
    #[inline]
    #[must_use]
    pub fn instance(&self) -> &FunctionInstance {
        &self.instance
    }

    /// Get a toggle, `None` if undeclared
    #[inline]
    #[must_use]
    pub fn toggle(&self, key: &str) -> Option<bool> {
        self.toggles.get(key).copied()
    }

    /// Check a toggle, treating undeclared as off
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> bool {
        self.toggle(key).unwrap_or(false)
    }

    /// All toggles in key order
    #[inline]
    #[must_use]
    pub fn toggles(&self) -> &BTreeMap<String, bool> {
        &self.toggles
    }

    /// Get a derived name
    #[inline]
    #[must_use]
    pub fn name(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    /// All derived names in key order
    #[inline]
    #[must_use]
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// Get discovered facts
    #[inline]
    #[must_use]
    pub fn facts(&self) -> &DiscoveredFacts {
        &self.facts
    }

    /// Resolve a dotted reference to a typed scalar
    ///
    /// `facts.replicas` is a number and `toggles.<key>` a bool; every other
    /// key is a string, whatever its text looks like.
    #[must_use]
    pub fn lookup_scalar(&self, key: &str) -> Option<Value> {
        if key == "facts.replicas" {
            return Some(Value::Number(self.facts.replicas.into()));
        }
        match key.strip_prefix("toggles.") {
            Some(toggle) => self.toggle(toggle).map(Value::Bool),
            None => self.lookup(key).map(Value::String),
        }
    }

    /// Resolve a dotted reference to its text value
    ///
    /// Keys: `name`, `namespace`, `labels.name`, `labels.instance`,
    /// `toggles.<key>`, `names.<key>`, `facts.workload`, `facts.replicas`,
    /// `facts.hostnames` (comma-joined `{workload}-{i}`, used for server
    /// certificate SANs).
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.instance.name().to_string()),
            "namespace" => Some(self.instance.namespace().to_string()),
            "labels.name" => Some(self.instance.labels().name.clone()),
            "labels.instance" => Some(self.instance.labels().instance.clone()),
            "facts.workload" => Some(self.facts.workload.clone()),
            "facts.replicas" => Some(self.facts.replicas.to_string()),
            "facts.hostnames" => Some(self.facts.hostnames().collect::<Vec<_>>().join(",")),
            _ => {
                if let Some(toggle) = key.strip_prefix("toggles.") {
                    self.toggle(toggle).map(|on| on.to_string())
                } else if let Some(name) = key.strip_prefix("names.") {
                    self.name(name).map(str::to_string)
                } else {
                    None
                }
            }
        }
    }
}

static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("invalid DNS-1123 regex")
});

/// Check that a derived name is a DNS-1123 subdomain (the rule for
/// Secret and ConfigMap names)
#[must_use]
pub fn is_resource_name(value: &str) -> bool {
    value.len() <= 253 && DNS_SUBDOMAIN.is_match(value)
}

/// Parse a toggle value (`true`/`false`, case-insensitive)
///
/// # Errors
/// Returns [`ConfigurationError::InvalidOverride`] for any other value
pub fn parse_toggle(key: &str, value: &str) -> Result<bool, ConfigurationError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigurationError::invalid_override(
            key,
            format!("expected true or false, found '{value}'"),
        ))
    }
}

/// Config State Reconciler
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    schema: &'a ConfigSchema,
    config: &'a EngineConfig,
}

impl<'a> Reconciler<'a> {
    /// Create reconciler for a schema
    #[inline]
    #[must_use]
    pub fn new(schema: &'a ConfigSchema, config: &'a EngineConfig) -> Self {
        Self { schema, config }
    }

    /// Resolve the canonical configuration
    ///
    /// # Errors
    /// Returns error for invalid override values or unreadable facts
    pub fn reconcile(
        &self,
        instance: FunctionInstance,
        scoped: &[&ResourceDocument],
        overrides: &Overrides,
    ) -> Result<CanonicalConfig, ConfigurationError> {
        let mut toggles: BTreeMap<String, bool> = self
            .schema
            .toggles()
            .map(|key| (key.to_string(), false))
            .collect();
        let mut names: BTreeMap<String, String> = self
            .schema
            .derived_names()
            .map(|(key, suffix)| (key.to_string(), instance.default_name(suffix)))
            .collect();

        if let Some(state) = FunctionState::recover(scoped, self.schema, self.config) {
            info!(
                instance = instance.name(),
                source = ?state.source(),
                toggles = state.toggles().len(),
                names = state.names().len(),
                "recovered function state"
            );
            toggles.extend(state.toggles().iter().map(|(k, v)| (k.clone(), *v)));
            names.extend(state.names().iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        for (key, value) in overrides.iter() {
            match self.schema.setting(key) {
                Some(Setting::Toggle) => {
                    toggles.insert(key.to_string(), parse_toggle(key, value)?);
                }
                Some(Setting::DerivedName { .. }) => {
                    if !is_resource_name(value) {
                        return Err(ConfigurationError::invalid_override(
                            key,
                            format!("'{value}' is not a DNS-1123 resource name"),
                        ));
                    }
                    names.insert(key.to_string(), value.to_string());
                }
                None => warn!(key, "ignoring unknown function config key"),
            }
        }

        let facts = self.discover(&instance, scoped)?;
        debug!(
            workload = facts.workload(),
            replicas = facts.replicas(),
            "discovered facts"
        );

        Ok(CanonicalConfig::new(instance, toggles, names, facts))
    }

    fn discover(
        &self,
        instance: &FunctionInstance,
        scoped: &[&ResourceDocument],
    ) -> Result<DiscoveredFacts, ConfigurationError> {
        let Some(rule) = self.schema.workload() else {
            return Ok(DiscoveredFacts::new(instance.name(), 1));
        };
        let workload = rule.workload_name(instance);
        // Patches share the workload identity; only a declared count counts
        let replicas_path = FieldPath::fields(&["spec", "replicas"]);
        let existing = scoped
            .iter()
            .filter(|doc| doc.kind() == rule.kind && doc.name() == workload)
            .filter(|doc| doc.get(&replicas_path).is_some())
            .min_by_key(|doc| (doc.identity(), doc.to_canonical_json()));

        let replicas = match existing {
            Some(doc) => read_replicas(doc)?,
            None => 1,
        };
        Ok(DiscoveredFacts::new(workload, replicas))
    }
}

fn read_replicas(workload: &ResourceDocument) -> Result<u32, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidFact {
        fact: "spec.replicas",
        resource: workload.identity(),
        reason,
    };
    let replicas = match workload.get(&FieldPath::fields(&["spec", "replicas"])) {
        None | Some(Value::Null) => return Ok(1),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid(format!("'{n}' is not a replica count")))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid(format!("'{s}' is not a replica count")))?,
        Some(_) => return Err(invalid("expected an integer".to_string())),
    };
    if replicas > MAX_REPLICAS {
        return Err(invalid(format!("{replicas} exceeds the limit of {MAX_REPLICAS}")));
    }
    Ok(replicas)
}
