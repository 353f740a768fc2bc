//! Consul Server Config Function
//!
//! Stands up a Consul server instance (StatefulSet, Services, configuration)
//! with optional gossip encryption, agent TLS and ACL bootstrap, and injects
//! Consul agent sidecars into workloads that ask for one.
//!
//! # Core Concepts
//!
//! - [`definition`]: the module table, toggles, derived names and workload rule
//! - [`SidecarContribution`]: answers [`SIDECAR_ANNOTATION`] requests
//! - [`server_contract`]: merge strategies the server patches rely on
//!
//! # Example
//!
//! ```rust,ignore
//! use cfunc_engine::EngineConfig;
//!
//! let engine = cfunc_consul::engine(EngineConfig::default())?;
//! let output = engine.run(&items, &function_config)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod names;
mod patches;
mod sidecar;
mod templates;

use cfunc_engine::{
    ConfigSchema, ConfigurationError, Correlator, Engine, EngineConfig, FunctionDefinition, Gate,
    TemplateModule,
};

use names::{ACL_BOOTSTRAP_ENABLED, DERIVED_NAMES, GOSSIP_ENABLED, TLS_ENABLED, TOGGLES};
use templates::{acl, gossip, server, tls};

pub use patches::server_contract;
pub use sidecar::{SidecarContribution, SIDECAR_ANNOTATION};

/// Application name label value
pub const APP_NAME: &str = "consul-server";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Toggles, derived names and the server workload rule
#[must_use]
pub fn schema() -> ConfigSchema {
    let schema = TOGGLES
        .iter()
        .fold(ConfigSchema::new(), |schema, key| schema.with_toggle(*key));
    DERIVED_NAMES
        .iter()
        .fold(schema, |schema, (key, suffix)| schema.with_derived_name(*key, *suffix))
        .with_workload("StatefulSet", "server")
}

/// Build the Consul function definition
///
/// `config` supplies the preserve-label prefix used by the TLS patch.
///
/// # Errors
/// Returns error if two modules share an id
pub fn definition(config: &EngineConfig) -> Result<FunctionDefinition, ConfigurationError> {
    let templated = [
        ("server-configmap", Gate::Always, server::CONFIGMAP),
        ("server-statefulset", Gate::Always, server::STATEFULSET),
        ("server-service", Gate::Always, server::SERVICE),
        ("server-dns-service", Gate::Always, server::DNS_SERVICE),
        ("server-ui-service", Gate::Always, server::UI_SERVICE),
        ("gossip-job", Gate::toggle(GOSSIP_ENABLED), gossip::JOB),
        ("gossip-serviceaccount", Gate::toggle(GOSSIP_ENABLED), gossip::SERVICE_ACCOUNT),
        ("gossip-role", Gate::toggle(GOSSIP_ENABLED), gossip::ROLE),
        ("gossip-rolebinding", Gate::toggle(GOSSIP_ENABLED), gossip::ROLE_BINDING),
        ("tls-job", Gate::toggle(TLS_ENABLED), tls::JOB),
        ("tls-serviceaccount", Gate::toggle(TLS_ENABLED), tls::SERVICE_ACCOUNT),
        ("tls-role", Gate::toggle(TLS_ENABLED), tls::ROLE),
        ("tls-rolebinding", Gate::toggle(TLS_ENABLED), tls::ROLE_BINDING),
        ("tls-server-configmap", Gate::toggle(TLS_ENABLED), tls::SERVER_CONFIGMAP),
        ("acl-job", Gate::toggle(ACL_BOOTSTRAP_ENABLED), acl::JOB),
        ("acl-serviceaccount", Gate::toggle(ACL_BOOTSTRAP_ENABLED), acl::SERVICE_ACCOUNT),
        ("acl-role", Gate::toggle(ACL_BOOTSTRAP_ENABLED), acl::ROLE),
        ("acl-rolebinding", Gate::toggle(ACL_BOOTSTRAP_ENABLED), acl::ROLE_BINDING),
    ];

    let mut definition = FunctionDefinition::new(APP_NAME).with_schema(schema());
    for (id, gate, text) in templated {
        definition = definition.with_module(TemplateModule::template(id, gate, text))?;
    }

    let preserve_marker = config.preserve_marker(&config.name_label);
    let correlator = Correlator::new(SIDECAR_ANNOTATION).with_contribution(SidecarContribution)?;
    Ok(definition
        .with_module(TemplateModule::from_fn(
            "gossip-config-source",
            Gate::toggle(GOSSIP_ENABLED),
            patches::gossip_config_source,
        ))?
        .with_module(TemplateModule::from_fn(
            "tls-config-source",
            Gate::toggle(TLS_ENABLED),
            patches::tls_config_source,
        ))?
        .with_module(TemplateModule::from_fn(
            "tls-statefulset-patch",
            Gate::toggle(TLS_ENABLED),
            move |canonical| patches::tls_statefulset_patch(canonical, &preserve_marker),
        ))?
        .with_correlator(correlator))
}

/// Ready-to-run engine for the Consul function
///
/// # Errors
/// Returns error if the definition cannot be assembled
pub fn engine(config: EngineConfig) -> Result<Engine, ConfigurationError> {
    let definition = definition(&config)?;
    Engine::new(definition, config)
}
