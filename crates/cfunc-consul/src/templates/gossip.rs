//! Gossip encryption key generation

pub(crate) const JOB: &str = r#"apiVersion: batch/v1
kind: Job
metadata:
  name: {{ name }}-gossip-encryption
spec:
  template:
    spec:
      serviceAccountName: {{ name }}-gossip-encryption
      restartPolicy: OnFailure
      initContainers:
        - name: generate-gossip-encryption-config
          image: docker.io/library/consul:1.7.1
          command:
            - /bin/sh
            - -ec
            - |-
              config_file=/config/generated/01-gossip-encryption.json
              cat <<EOF > "${config_file}"
              {
                "encrypt": "$(consul keygen)",
                "encrypt_verify_incoming": true,
                "encrypt_verify_outgoing": true
              }
              EOF
          volumeMounts:
            - mountPath: /config/generated
              name: config-generated
      containers:
        - name: create-gossip-encryption-config-secret
          image: k8s.gcr.io/hyperkube:v1.17.1
          command:
            - /bin/sh
            - -ec
            - |-
              secret="{{ names.gossip_secret_name }}"
              config_dir="/config/generated"
              kubectl create secret generic "--from-file=${config_dir}" "${secret}"
          envFrom:
            - configMapRef:
                name: {{ name }}
          volumeMounts:
            - mountPath: /config/generated
              name: config-generated
      volumes:
        - name: config-generated
          emptyDir: {}
"#;

pub(crate) const SERVICE_ACCOUNT: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: {{ name }}-gossip-encryption
"#;

pub(crate) const ROLE: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: {{ name }}-gossip-encryption
rules:
  - apiGroups:
      - ""
    resources:
      - secrets
    verbs:
      - create
"#;

pub(crate) const ROLE_BINDING: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: {{ name }}-gossip-encryption
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: {{ name }}-gossip-encryption
subjects:
  - kind: ServiceAccount
    name: {{ name }}-gossip-encryption
"#;
