//! Consul agent sidecar
//!
//! Every secret or ConfigMap source starts out `optional: true`; sources
//! backed by an enabled feature are made mandatory when the patch is built.

pub(crate) const CONTAINERS: &str = r#"- name: consul-agent
  image: docker.io/library/consul:1.7.1
  command:
    - consul
    - agent
    - -bind=0.0.0.0
    - -config-dir=/consul/configs
    - -retry-join={{ name }}-server.{{ namespace }}.svc.cluster.local
  env:
    - name: CONSUL_HTTP_ADDR
      value: https://127.0.0.1:8500
    - name: CONSUL_CACERT
      value: /consul/tls/consul-agent-ca.pem
    - name: CONSUL_CLIENT_CERT
      value: /consul/tls/dc1-cli-consul-0.pem
    - name: CONSUL_CLIENT_KEY
      value: /consul/tls/dc1-cli-consul-0-key.pem
  readinessProbe:
    exec:
      command:
        - /bin/sh
        - -ec
        - |
          curl \
            --cacert $(CONSUL_CACERT) \
            --cert $(CONSUL_CLIENT_CERT) \
            --key $(CONSUL_CLIENT_KEY) \
            $(CONSUL_HTTP_ADDR)/v1/status/leader 2>/dev/null |\
          grep -E '".+"'
  volumeMounts:
    - name: consul-data
      mountPath: /consul/data
    - name: consul-configs
      mountPath: /consul/configs
    - name: consul-tls-secret
      mountPath: /consul/tls
"#;

pub(crate) const VOLUMES: &str = r#"- name: consul-data
  emptyDir: {}
- name: consul-configs
  projected:
    sources:
      - configMap:
          name: {{ name }}-{{ namespace }}-agent
          optional: true
      - secret:
          name: {{ names.gossip_secret_name }}
          optional: true
      - configMap:
          name: {{ name }}-{{ namespace }}-client-tls
          optional: true
- name: consul-tls-secret
  projected:
    sources:
      - secret:
          name: {{ names.tls_ca_secret_name }}
          optional: true
      - secret:
          name: {{ names.tls_cli_secret_name }}
          optional: true
      - secret:
          name: {{ names.tls_client_secret_name }}
          optional: true
"#;

pub(crate) const CLIENT_TLS_CONFIGMAP: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {{ name }}-{{ namespace }}-client-tls
data:
  00-agent-tls.hcl: |-
    cert_file = "/consul/tls/dc1-client-consul-0.pem"
    key_file = "/consul/tls/dc1-client-consul-0-key.pem"
"#;
