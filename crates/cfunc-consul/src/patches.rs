//! List-merge patches on the server StatefulSet
//!
//! Optional features add config sources, containers and volumes to the
//! server without re-rendering it, so the StatefulSet template stays
//! feature-agnostic.

use cfunc_engine::{template, CanonicalConfig, ConfigurationError};
use cfunc_patch::{ListMergePatch, MergeContract, MergeStrategy, PatchError};
use cfunc_resource::{keyed_item, FieldPath, ResourceDocument, ResourceIdentity, Value};

use crate::names::GOSSIP_SECRET_NAME;
use crate::templates::tls;

pub(crate) fn pod_spec() -> FieldPath {
    FieldPath::fields(&["spec", "template", "spec"])
}

fn consul_container() -> FieldPath {
    pod_spec().child("containers").keyed("name", "consul")
}

fn config_sources() -> FieldPath {
    pod_spec()
        .child("volumes")
        .keyed("name", "consul-configs")
        .child("projected")
        .child("sources")
}

fn server(config: &CanonicalConfig) -> ResourceIdentity {
    ResourceIdentity::new(
        "apps/v1",
        "StatefulSet",
        config.instance().namespace(),
        config.facts().workload(),
    )
}

pub(crate) fn derived_name<'a>(config: &'a CanonicalConfig, key: &str) -> Result<&'a str, ConfigurationError> {
    config
        .name(key)
        .ok_or_else(|| ConfigurationError::unresolved(format!("names.{key}")))
}

/// Render a template that must produce a YAML list
pub(crate) fn render_items(text: &str, config: &CanonicalConfig) -> Result<Vec<Value>, ConfigurationError> {
    match template::render_value(text, config)? {
        Value::Sequence(items) => Ok(items),
        _ => Err(ConfigurationError::InvalidTemplate {
            message: "expected a list of items".to_string(),
        }),
    }
}

/// Merge strategies the server patches rely on
///
/// # Errors
/// Never fails for the built-in declarations; the `Result` mirrors
/// [`MergeContract::declare`]
pub fn server_contract() -> Result<MergeContract, PatchError> {
    let mut contract = MergeContract::with_defaults();
    for field in ["env", "ports", "volumeMounts"] {
        contract.declare(consul_container().child(field), MergeStrategy::append_by_key("name"))?;
    }
    Ok(contract)
}

pub(crate) fn gossip_config_source(config: &CanonicalConfig) -> Result<Option<ResourceDocument>, ConfigurationError> {
    let secret = derived_name(config, GOSSIP_SECRET_NAME)?;
    let mut patch = ListMergePatch::new(server(config));
    patch.append(config_sources(), "secret.name", [keyed_item("secret.name", secret)])?;
    Ok(Some(patch.build()?))
}

pub(crate) fn tls_config_source(config: &CanonicalConfig) -> Result<Option<ResourceDocument>, ConfigurationError> {
    let configmap = format!("{}-server-tls", config.instance().name());
    let mut patch = ListMergePatch::new(server(config));
    patch.append(config_sources(), "configMap.name", [keyed_item("configMap.name", &configmap)])?;
    Ok(Some(patch.build()?))
}

/// TLS wiring of the server pods
///
/// `preserve_marker` keeps the application name label of the target as is.
pub(crate) fn tls_statefulset_patch(
    config: &CanonicalConfig,
    preserve_marker: &str,
) -> Result<Option<ResourceDocument>, ConfigurationError> {
    let mut patch = ListMergePatch::new(server(config)).with_annotation(preserve_marker, "true");
    patch.append(pod_spec().child("initContainers"), "name", render_items(tls::INIT_CONTAINERS, config)?)?;
    patch.append(consul_container().child("env"), "name", render_items(tls::CONSUL_ENV, config)?)?;
    patch.append(consul_container().child("ports"), "name", render_items(tls::CONSUL_PORTS, config)?)?;
    patch.append(
        consul_container().child("volumeMounts"),
        "name",
        render_items(tls::CONSUL_VOLUME_MOUNTS, config)?,
    )?;
    patch.append(pod_spec().child("volumes"), "name", render_items(tls::VOLUMES, config)?)?;

    let mut document = patch.build_against(&server_contract()?)?;
    document.set(
        &consul_container().child("readinessProbe"),
        template::render_value(tls::CONSUL_READINESS_PROBE, config)?,
    )?;
    Ok(Some(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::TLS_SERVER_SECRET_NAME;
    use cfunc_engine::{DiscoveredFacts, FunctionInstance};
    use pretty_assertions::assert_eq;

    fn config() -> CanonicalConfig {
        CanonicalConfig::new(
            FunctionInstance::new("db", "ns", "consul-server"),
            [].into_iter().collect(),
            [
                (GOSSIP_SECRET_NAME.to_string(), "db-ns-gossip".to_string()),
                (TLS_SERVER_SECRET_NAME.to_string(), "db-ns-tls-server".to_string()),
            ]
            .into_iter()
            .collect(),
            DiscoveredFacts::new("db-server", 3),
        )
    }

    #[test]
    fn gossip_source_patch() {
        let patch = gossip_config_source(&config()).unwrap().unwrap();
        let expected = r"apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: db-server
  namespace: ns
spec:
  template:
    spec:
      volumes:
      - name: consul-configs
        projected:
          sources:
          - secret:
              name: db-ns-gossip
";
        assert_eq!(patch.to_yaml().unwrap(), expected);
    }

    #[test]
    fn tls_source_keyed_by_configmap() {
        let patch = tls_config_source(&config()).unwrap().unwrap();
        let source = config_sources()
            .keyed("configMap.name", "db-server-tls")
            .child("configMap")
            .child("name");
        assert_eq!(patch.get_str(&source), Some("db-server-tls"));
    }

    #[test]
    fn tls_patch_wires_consul_container() {
        let patch = tls_statefulset_patch(&config(), "cfunc/preserve-label/app.kubernetes.io/name")
            .unwrap()
            .unwrap();
        assert_eq!(
            patch.annotation("cfunc/preserve-label/app.kubernetes.io/name"),
            Some("true")
        );
        let secret = pod_spec().child("volumes").keyed("name", "tls-secret").child("secret").child("secretName");
        assert_eq!(patch.get_str(&secret), Some("db-ns-tls-server"));
        let port = consul_container().child("ports").keyed("name", "https").child("name");
        assert_eq!(patch.get_str(&port), Some("https"));
        assert!(patch.get(&consul_container().child("readinessProbe")).is_some());
        let init = pod_spec().child("initContainers").keyed("name", "consul-server-tls-setup").child("name");
        assert_eq!(patch.get_str(&init), Some("consul-server-tls-setup"));
    }

    #[test]
    fn missing_derived_name_is_unresolved() {
        let config = CanonicalConfig::new(
            FunctionInstance::new("db", "ns", "consul-server"),
            [].into_iter().collect(),
            [].into_iter().collect(),
            DiscoveredFacts::new("db-server", 1),
        );
        let err = gossip_config_source(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnresolvedReference { ref field } if field == "names.gossip_secret_name"
        ));
    }

    #[test]
    fn contract_covers_consul_container_lists() {
        let contract = server_contract().unwrap();
        assert!(contract.strategy_for(&consul_container().child("env")).is_append());
        assert!(contract.strategy_for(&pod_spec().child("volumes")).is_append());
        assert!(!contract.strategy_for(&consul_container().child("readinessProbe")).is_append());
    }
}
