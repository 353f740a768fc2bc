//! Agent TLS: certificate generation and server wiring

pub(crate) const JOB: &str = r#"apiVersion: batch/v1
kind: Job
metadata:
  name: {{ name }}-tls
spec:
  template:
    spec:
      serviceAccountName: {{ name }}-tls
      restartPolicy: OnFailure
      initContainers:
        - name: generate-tls
          image: docker.io/library/consul:1.7.1
          command:
            - /bin/sh
            - -ec
            - |-
              tls_dir=/tls/generated
              cd "${tls_dir}"
              consul tls ca create
              consul tls cert create -cli
              consul tls cert create -client
              for host in $(echo "{{ facts.hostnames }}" | tr ',' ' '); do
                consul tls cert create -server \
                  "-additional-dnsname=${host}.{{ name }}-server.{{ namespace }}.svc.cluster.local"
              done
          volumeMounts:
            - mountPath: /tls/generated
              name: tls-generated
      containers:
        - name: create-tls-secret
          image: k8s.gcr.io/hyperkube:v1.17.1
          command:
            - /bin/sh
            - -ec
            - |-
              tls_dir="/tls/generated"

              secret="{{ names.tls_server_secret_name }}"
              kubectl create secret generic "${secret}" "--from-file=${tls_dir}"

              secret="{{ names.tls_ca_secret_name }}"
              kubectl create secret generic "${secret}" \
                "--from-file=${tls_dir}/consul-agent-ca.pem"

              secret="{{ names.tls_cli_secret_name }}"
              kubectl create secret generic "${secret}" \
                "--from-file=${tls_dir}/dc1-cli-consul-0.pem" \
                "--from-file=${tls_dir}/dc1-cli-consul-0-key.pem"

              secret="{{ names.tls_client_secret_name }}"
              kubectl create secret generic "${secret}" \
                "--from-file=${tls_dir}/dc1-client-consul-0.pem" \
                "--from-file=${tls_dir}/dc1-client-consul-0-key.pem"
          envFrom:
            - configMapRef:
                name: {{ name }}
          volumeMounts:
            - mountPath: /tls/generated
              name: tls-generated
      volumes:
        - name: tls-generated
          emptyDir: {}
"#;

pub(crate) const SERVICE_ACCOUNT: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: {{ name }}-tls
"#;

pub(crate) const ROLE: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: {{ name }}-tls
rules:
  - apiGroups:
      - ""
    resources:
      - secrets
    verbs:
      - get
      - list
      - create
"#;

pub(crate) const ROLE_BINDING: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: {{ name }}-tls
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: {{ name }}-tls
subjects:
  - kind: ServiceAccount
    name: {{ name }}-tls
"#;

pub(crate) const SERVER_CONFIGMAP: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {{ name }}-server-tls
data:
  01-default-agent-tls.json: |-
    {
      "verify_incoming": true,
      "verify_outgoing": true,
      "verify_server_hostname": true,
      "ca_file": "/consul/tls/consul-agent-ca.pem",
      "cert_file": "/consul/tls/server-consul.pem",
      "key_file": "/consul/tls/server-consul-key.pem",
      "ports": {
        "http": -1,
        "https": 8501
      }
    }
"#;

// Fragments merged into the server StatefulSet.

pub(crate) const INIT_CONTAINERS: &str = r#"- name: consul-server-tls-setup
  image: docker.io/library/alpine:3.11
  command:
    - /bin/sh
    - -ec
    - |-
      index="$(hostname|sed 's/.*-\(.*$\)/\1/')"
      cp /consul/tls/secret/consul-agent-ca.pem /consul/tls
      cp /consul/tls/secret/dc1-server-consul-${index}.pem \
         /consul/tls/server-consul.pem
      cp /consul/tls/secret/dc1-server-consul-${index}-key.pem \
         /consul/tls/server-consul-key.pem
      cp /consul/tls/secret/dc1-cli-consul-0.pem /consul/tls
      cp /consul/tls/secret/dc1-cli-consul-0-key.pem /consul/tls
  volumeMounts:
    - name: tls-secret
      mountPath: /consul/tls/secret
    - name: tls
      mountPath: /consul/tls
"#;

pub(crate) const CONSUL_ENV: &str = r#"- name: CONSUL_HTTP_ADDR
  value: https://127.0.0.1:8501
- name: CONSUL_CACERT
  value: /consul/tls/consul-agent-ca.pem
- name: CONSUL_CLIENT_CERT
  value: /consul/tls/dc1-cli-consul-0.pem
- name: CONSUL_CLIENT_KEY
  value: /consul/tls/dc1-cli-consul-0-key.pem
"#;

pub(crate) const CONSUL_PORTS: &str = r#"- containerPort: 8501
  name: https
  protocol: TCP
"#;

pub(crate) const CONSUL_VOLUME_MOUNTS: &str = r#"- name: tls
  mountPath: /consul/tls
"#;

pub(crate) const CONSUL_READINESS_PROBE: &str = r#"exec:
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
"#;

pub(crate) const VOLUMES: &str = r#"- name: tls-secret
  secret:
    secretName: {{ names.tls_server_secret_name }}
- name: tls
  emptyDir: {}
"#;
