//! Agent sidecar contribution
//!
//! A workload anywhere in the batch asks for a Consul agent by carrying
//! [`SIDECAR_ANNOTATION`] with a descriptor naming this instance. The answer
//! is one list-merge patch on that workload, plus the client TLS ConfigMap
//! when TLS is on.

use std::collections::BTreeSet;

use cfunc_engine::{
    template, CanonicalConfig, ConfigurationError, Contribution, CorrelationRequest, Gate,
    DEFAULT_CONTRIBUTION_KIND,
};
use cfunc_patch::{ListMergeOp, ListMergePatch};
use cfunc_resource::{Mapping, ResourceDocument, Value};
use tracing::{debug, info};

use crate::names::{
    GOSSIP_ENABLED, GOSSIP_SECRET_NAME, SIDECAR_INJECTOR_ENABLED, TLS_CA_SECRET_NAME,
    TLS_CLIENT_SECRET_NAME, TLS_CLI_SECRET_NAME, TLS_ENABLED, TLS_SECRETS,
};
use crate::patches::{derived_name, pod_spec, render_items};
use crate::templates::sidecar;

/// Annotation carrying sidecar requests
pub const SIDECAR_ANNOTATION: &str = "config.bzub.dev/consul-agent-sidecar-injector";

const SOURCE_KINDS: [&str; 2] = ["secret", "configMap"];

/// Injects a Consul agent into requesting workloads
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarContribution;

impl Contribution for SidecarContribution {
    fn kind(&self) -> &str {
        DEFAULT_CONTRIBUTION_KIND
    }

    fn gate(&self) -> Gate {
        Gate::toggle(SIDECAR_INJECTOR_ENABLED)
    }

    fn contribute(
        &self,
        request: &CorrelationRequest,
        target: &ResourceDocument,
        config: &CanonicalConfig,
    ) -> Result<Vec<ResourceDocument>, ConfigurationError> {
        let tls = config.is_enabled(TLS_ENABLED);

        let mut containers = render_items(sidecar::CONTAINERS, config)?;
        if let Some(image) = request.parameter("image") {
            for container in containers.iter_mut().filter_map(Value::as_mapping_mut) {
                container.insert("image".into(), image.into());
            }
        }

        let required = required_sources(config)?;
        let mut volumes = render_items(sidecar::VOLUMES, config)?;
        for volume in &mut volumes {
            require_sources(volume, &required);
        }
        let mut volume_op =
            ListMergeOp::new(request.requester.clone(), pod_spec().child("volumes"), "name")?
                .with_items(volumes)?;

        if tls {
            let secrets = TLS_SECRETS
                .iter()
                .map(|key| derived_name(config, key).map(str::to_string))
                .collect::<Result<BTreeSet<_>, _>>()?;
            for (name, volume) in flip_target_volumes(target, &secrets) {
                if volume_op.push(volume)? {
                    info!(target = %request.requester, volume = name.as_str(), "optional TLS volume made mandatory");
                } else {
                    debug!(target = %request.requester, volume = name.as_str(), "volume name taken by sidecar");
                }
            }
        }

        let mut patch = ListMergePatch::new(request.requester.clone());
        patch.append(pod_spec().child("containers"), "name", containers)?;
        patch.add(volume_op)?;
        let mut documents = vec![patch.build()?];

        if tls {
            let mut configmap = template::render_document(sidecar::CLIENT_TLS_CONFIGMAP, config)?;
            if !request.requester.namespace.is_empty() {
                configmap.set_namespace(&request.requester.namespace)?;
            }
            documents.push(configmap);
        }
        Ok(documents)
    }
}

/// Source names the sidecar cannot start without
fn required_sources(config: &CanonicalConfig) -> Result<BTreeSet<String>, ConfigurationError> {
    let mut required = BTreeSet::new();
    if config.is_enabled(GOSSIP_ENABLED) {
        required.insert(derived_name(config, GOSSIP_SECRET_NAME)?.to_string());
    }
    if config.is_enabled(TLS_ENABLED) {
        let instance = config.instance();
        required.insert(format!("{}-{}-client-tls", instance.name(), instance.namespace()));
        for key in [TLS_CA_SECRET_NAME, TLS_CLI_SECRET_NAME, TLS_CLIENT_SECRET_NAME] {
            required.insert(derived_name(config, key)?.to_string());
        }
    }
    Ok(required)
}

/// Flip `optional: true` to `false` when the reference names one of `names`
fn make_mandatory(reference: &mut Mapping, name_key: &str, names: &BTreeSet<String>) -> bool {
    let named = reference
        .get(name_key)
        .and_then(Value::as_str)
        .is_some_and(|name| names.contains(name));
    if !named || reference.get("optional") != Some(&Value::Bool(true)) {
        return false;
    }
    reference.insert("optional".into(), Value::Bool(false));
    true
}

fn require_sources(volume: &mut Value, names: &BTreeSet<String>) -> bool {
    let Some(sources) = volume
        .get_mut("projected")
        .and_then(|projected| projected.get_mut("sources"))
        .and_then(Value::as_sequence_mut)
    else {
        return false;
    };
    let mut changed = false;
    for source in sources {
        for kind in SOURCE_KINDS {
            if let Some(reference) = source.get_mut(kind).and_then(Value::as_mapping_mut) {
                changed |= make_mandatory(reference, "name", names);
            }
        }
    }
    changed
}

/// Copies of target volumes whose optional TLS secret becomes mandatory
fn flip_target_volumes(target: &ResourceDocument, secrets: &BTreeSet<String>) -> Vec<(String, Value)> {
    let Some(volumes) = target
        .get(&pod_spec().child("volumes"))
        .and_then(Value::as_sequence)
    else {
        return Vec::new();
    };
    volumes
        .iter()
        .filter_map(|volume| {
            let name = volume.get("name").and_then(Value::as_str)?.to_string();
            let mut flipped = volume.clone();
            let direct = flipped
                .get_mut("secret")
                .and_then(Value::as_mapping_mut)
                .is_some_and(|secret| make_mandatory(secret, "secretName", secrets));
            let projected = require_sources(&mut flipped, secrets);
            (direct || projected).then_some((name, flipped))
        })
        .collect()
}
