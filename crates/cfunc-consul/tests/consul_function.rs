//! Behaviour of the Consul function end to end

use std::collections::BTreeSet;

use cfunc_consul::names::{
    ACL_BOOTSTRAP_ENABLED, GOSSIP_ENABLED, SIDECAR_INJECTOR_ENABLED, TLS_ENABLED,
};
use cfunc_consul::SIDECAR_ANNOTATION;
use cfunc_engine::{ConfigurationError, Engine, EngineConfig, Rendered};
use cfunc_resource::{FieldPath, ResourceDocument, ResourceIdentity, Value};
use cfunc_test_utils::{
    annotate, descriptor, find, function_config, managed, statefulset, to_stream, workload,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const UNCONDITIONAL: [&str; 6] = [
    "function-state",
    "server-configmap",
    "server-dns-service",
    "server-service",
    "server-statefulset",
    "server-ui-service",
];

fn engine() -> Engine {
    cfunc_consul::engine(EngineConfig::default()).unwrap()
}

fn all_features(name: &str, namespace: &str) -> ResourceDocument {
    function_config(name, namespace)
        .with_data(TLS_ENABLED, "true")
        .with_data(GOSSIP_ENABLED, "true")
        .with_data(ACL_BOOTSTRAP_ENABLED, "true")
        .with_data(SIDECAR_INJECTOR_ENABLED, "true")
        .build()
}

fn modules(rendered: &[Rendered]) -> BTreeSet<&str> {
    rendered.iter().map(|r| r.module.as_str()).collect()
}

fn documents(rendered: Vec<Rendered>) -> Vec<ResourceDocument> {
    rendered.into_iter().map(|r| r.document).collect()
}

fn path(text: &str) -> FieldPath {
    text.parse().unwrap()
}

#[test]
fn minimal_instance_renders_only_unconditional_modules() {
    let fc = function_config("db", "ns").with_data(TLS_ENABLED, "false").build();
    let rendered = engine().synthesize(&[], &fc).unwrap();
    assert_eq!(modules(&rendered), UNCONDITIONAL.into_iter().collect());
    assert!(rendered.iter().all(|r| r.document.namespace() == "ns"));
    assert!(rendered
        .iter()
        .all(|r| r.document.label("app.kubernetes.io/instance") == Some("db")));
}

#[test]
fn all_features_render_every_module() {
    let rendered = engine().synthesize(&[], &all_features("db", "ns")).unwrap();
    assert_eq!(rendered.len(), 22);
    assert!(modules(&rendered).contains("tls-statefulset-patch"));
    assert!(modules(&rendered).contains("gossip-config-source"));
    assert!(modules(&rendered).contains("acl-rolebinding"));
}

#[test]
fn server_statefulset_carries_canonical_labels_everywhere() {
    let output = documents(engine().synthesize(&[], &function_config("db", "ns").build()).unwrap());
    let sts = find(&output, "StatefulSet", "db-server").unwrap();
    for location in [
        "metadata.labels",
        "spec.template.metadata.labels",
        "spec.selector.matchLabels",
    ] {
        let labels = sts.string_map(&path(location));
        assert_eq!(labels.get("app.kubernetes.io/name").map(String::as_str), Some("consul-server"));
        assert_eq!(labels.get("app.kubernetes.io/instance").map(String::as_str), Some("db"));
    }
    let service = find(&output, "Service", "db-server").unwrap();
    assert_eq!(service.string_map(&path("spec.selector")).len(), 2);
}

#[test]
fn derived_names_default_then_recovered() {
    let fc = function_config("myinstance", "mynamespace")
        .with_data(ACL_BOOTSTRAP_ENABLED, "true")
        .build();
    let first = documents(engine().synthesize(&[], &fc).unwrap());
    let state = find(&first, "ConfigMap", "myinstance").unwrap();
    assert_eq!(
        state.get_str(&path("data.acl_secret_name")),
        Some("myinstance-mynamespace-acl")
    );
    let job = find(&first, "Job", "myinstance-acl-bootstrap").unwrap();
    assert!(job.to_yaml().unwrap().contains("myinstance-mynamespace-acl"));

    let mut recorded = annotate(
        managed("ConfigMap", "mynamespace", "myinstance", "myinstance"),
        "cfunc/function-state",
        "true",
    );
    recorded
        .set(&path("data.acl_secret_name"), Value::from("legacy-acl-secret"))
        .unwrap();
    let second = documents(engine().synthesize(&[recorded], &fc).unwrap());
    let job = find(&second, "Job", "myinstance-acl-bootstrap").unwrap();
    let script = job.to_yaml().unwrap();
    assert!(script.contains("legacy-acl-secret"));
    assert!(!script.contains("myinstance-mynamespace-acl"));
    let state = find(&second, "ConfigMap", "myinstance").unwrap();
    assert_eq!(state.get_str(&path("data.acl_secret_name")), Some("legacy-acl-secret"));
}

#[test]
fn override_beats_recorded_state() {
    let previous = documents(engine().synthesize(&[], &all_features("db", "ns")).unwrap());
    let fc = function_config("db", "ns")
        .with_data(GOSSIP_ENABLED, "true")
        .with_data("gossip_secret_name", "rotated-gossip")
        .build();
    let output = documents(engine().synthesize(&previous, &fc).unwrap());
    let patch = output
        .iter()
        .find(|doc| doc.kind() == "StatefulSet" && doc.to_yaml().unwrap().contains("rotated-gossip"));
    assert!(patch.is_some());
    // Toggles recorded by the previous run stay on
    assert!(find(&output, "Job", "db-tls").is_some());
}

#[test]
fn rerun_on_own_output_is_a_fixpoint() {
    let engine = engine();
    let fc = all_features("db", "ns");
    let first = engine.run(&[], &fc).unwrap();
    let again = documents(engine.synthesize(&first, &fc).unwrap());
    let fresh = documents(engine.synthesize(&[], &fc).unwrap());
    assert_eq!(to_stream(&again), to_stream(&fresh));
}

#[test]
fn identical_inputs_give_identical_digests() {
    let engine = engine();
    let batch = vec![statefulset("ns", "db-server", "db", "3")];
    let fc = all_features("db", "ns");
    let first = engine.run(&batch, &fc).unwrap();
    let second = engine.run(&batch, &fc).unwrap();
    let digests = |docs: &[ResourceDocument]| docs.iter().map(ResourceDocument::digest).collect::<Vec<_>>();
    assert_eq!(digests(&first), digests(&second));
}

#[test]
fn replicas_flow_into_server_and_tls_job() {
    let batch = vec![statefulset("ns", "db-server", "db", "3")];
    let output = documents(engine().synthesize(&batch, &all_features("db", "ns")).unwrap());
    let sts = output
        .iter()
        .find(|doc| doc.kind() == "StatefulSet" && doc.get(&path("spec.replicas")).is_some())
        .unwrap();
    assert_eq!(sts.get(&path("spec.replicas")).and_then(Value::as_u64), Some(3));
    assert_eq!(
        sts.get_str(&path(
            "spec.template.spec.containers[name=consul].env[name=CONSUL_REPLICAS].value"
        )),
        Some("3")
    );
    let job = find(&output, "Job", "db-tls").unwrap();
    let script = job.to_yaml().unwrap();
    assert!(script.contains("db-server-0,db-server-1,db-server-2"));
    assert!(!script.contains("db-server-3"));
}

#[test]
fn bad_replica_count_fails() {
    let batch = vec![statefulset("ns", "db-server", "db", "lots")];
    let err = engine().run(&batch, &function_config("db", "ns").build()).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationError::InvalidFact { .. }));
}

#[test]
fn tls_patch_preserves_target_name_label() {
    let fc = function_config("db", "ns").with_data(TLS_ENABLED, "true").build();
    let rendered = engine().synthesize(&[], &fc).unwrap();
    let patch = &rendered
        .iter()
        .find(|r| r.module == "tls-statefulset-patch")
        .unwrap()
        .document;
    assert_eq!(patch.label("app.kubernetes.io/name"), None);
    assert_eq!(patch.label("app.kubernetes.io/instance"), Some("db"));
    assert!(patch.annotations().is_empty());
    assert_eq!(
        patch.identity(),
        ResourceIdentity::new("apps/v1", "StatefulSet", "ns", "db-server")
    );
}

#[test]
fn sidecar_request_gets_one_patch_and_flip() {
    let requester = annotate(
        workload(
            "apps",
            "web",
            "[{name: ca, secret: {secretName: db-ns-tls-ca, optional: true}}]",
        ),
        SIDECAR_ANNOTATION,
        &descriptor("db", "ns"),
    );
    let batch = vec![requester.clone()];
    let fc = function_config("db", "ns")
        .with_data(TLS_ENABLED, "true")
        .with_data(SIDECAR_INJECTOR_ENABLED, "true")
        .build();

    let output = engine().run(&batch, &fc).unwrap();
    assert_eq!(output[0], requester);

    let patches: Vec<_> = output[1..]
        .iter()
        .filter(|doc| doc.identity() == requester.identity())
        .collect();
    assert_eq!(patches.len(), 1);
    let patch = patches[0];
    assert!(patch
        .get(&path("spec.template.spec.containers[name=consul-agent]"))
        .is_some());
    assert_eq!(
        patch
            .get(&path("spec.template.spec.volumes[name=ca].secret.optional"))
            .and_then(Value::as_bool),
        Some(false)
    );
    // Correlation output describes someone else's resource
    assert_eq!(patch.label("app.kubernetes.io/instance"), None);

    let client_tls = find(&output, "ConfigMap", "db-ns-client-tls").unwrap();
    assert_eq!(client_tls.namespace(), "apps");
}

#[test]
fn numeric_gossip_secret_name_stays_a_string() {
    let requester = annotate(workload("apps", "web", "[]"), SIDECAR_ANNOTATION, &descriptor("db", "ns"));
    let fc = function_config("db", "ns")
        .with_data(GOSSIP_ENABLED, "true")
        .with_data(SIDECAR_INJECTOR_ENABLED, "true")
        .with_data("gossip_secret_name", "12345")
        .build();
    let output = engine().run(&[requester.clone()], &fc).unwrap();

    let patch = output[1..]
        .iter()
        .find(|doc| doc.identity() == requester.identity())
        .unwrap();
    assert_eq!(
        patch
            .get(&path(
                "spec.template.spec.volumes[name=consul-configs].projected.sources[secret.name=12345].secret.optional"
            ))
            .and_then(Value::as_bool),
        Some(false)
    );

    let state = find(&output, "ConfigMap", "db").unwrap();
    assert_eq!(state.get_str(&path("data.gossip_secret_name")), Some("12345"));
    let source = output
        .iter()
        .filter(|doc| doc.kind() == "StatefulSet" && doc.name() == "db-server")
        .find_map(|doc| {
            doc.get(&path(
                "spec.template.spec.volumes[name=consul-configs].projected.sources[secret.name=12345].secret.name",
            ))
            .cloned()
        });
    assert_eq!(source, Some(Value::from("12345")));
}

#[test]
fn name_that_is_not_a_resource_name_fails() {
    let fc = function_config("db", "ns")
        .with_data(GOSSIP_ENABLED, "true")
        .with_data("gossip_secret_name", "a #b")
        .build();
    let err = engine().run(&[], &fc).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationError::InvalidOverride { .. }));
}

#[test]
fn sidecar_disabled_skips_addressed_request() {
    let requester = annotate(workload("apps", "web", "[]"), SIDECAR_ANNOTATION, &descriptor("db", "ns"));
    let rendered = engine()
        .synthesize(&[requester], &function_config("db", "ns").build())
        .unwrap();
    assert!(rendered.iter().all(|r| !r.module.starts_with("correlate/")));
}

#[test]
fn malformed_sidecar_descriptor_aborts() {
    let requester = annotate(workload("apps", "web", "[]"), SIDECAR_ANNOTATION, "just a string");
    let err = engine()
        .run(&[requester], &all_features("db", "ns"))
        .unwrap_err();
    assert!(matches!(err.kind(), ConfigurationError::MalformedDescriptor { .. }));
}

fn two_instance_batch() -> Vec<ResourceDocument> {
    vec![
        statefulset("ns", "a-server", "a", "2"),
        statefulset("ns", "b-server", "b", "5"),
        annotate(
            managed("ConfigMap", "ns", "b", "b"),
            "cfunc/function-state",
            "true",
        ),
        annotate(workload("apps", "web", "[]"), SIDECAR_ANNOTATION, &descriptor("a", "ns")),
        annotate(workload("apps", "api", "[]"), SIDECAR_ANNOTATION, &descriptor("b", "ns")),
    ]
}

#[test]
fn instances_in_one_batch_stay_isolated() {
    let engine = engine();
    let batch = two_instance_batch();
    let a = documents(engine.synthesize(&batch, &all_features("a", "ns")).unwrap());
    let b = documents(engine.synthesize(&batch, &all_features("b", "ns")).unwrap());

    let b_ids: BTreeSet<_> = b.iter().map(ResourceDocument::identity).collect();
    assert!(a.iter().all(|doc| !b_ids.contains(&doc.identity())));

    let b_inputs: BTreeSet<_> = ["b-server", "b", "api"].into_iter().collect();
    assert!(a.iter().all(|doc| !b_inputs.contains(doc.name())));

    let a_sts = a
        .iter()
        .find(|doc| doc.name() == "a-server" && doc.get(&path("spec.replicas")).is_some())
        .unwrap();
    assert_eq!(a_sts.get(&path("spec.replicas")).and_then(Value::as_u64), Some(2));
}

proptest! {
    #[test]
    fn batch_order_does_not_matter(shuffled in Just(two_instance_batch()).prop_shuffle()) {
        let engine = engine();
        let fc = all_features("a", "ns");
        let baseline = documents(engine.synthesize(&two_instance_batch(), &fc).unwrap());
        let reordered = documents(engine.synthesize(&shuffled, &fc).unwrap());
        prop_assert_eq!(to_stream(&baseline), to_stream(&reordered));
    }
}
