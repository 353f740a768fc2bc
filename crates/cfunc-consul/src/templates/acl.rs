//! ACL bootstrap

pub(crate) const JOB: &str = r#"apiVersion: batch/v1
kind: Job
metadata:
  name: {{ name }}-acl-bootstrap
spec:
  template:
    spec:
      serviceAccountName: {{ name }}-acl-bootstrap
      restartPolicy: OnFailure
      containers:
        - name: consul-acl-bootstrap
          image: k8s.gcr.io/hyperkube:v1.17.1
          command:
            - /bin/sh
            - -ec
            - |-
              secret_dir="/consul/acl-bootstrap"
              secret_name="{{ names.acl_secret_name }}"
              exec_pod="{{ facts.workload }}-0"

              echo "[INFO] Performing consul acl bootstrap."
              output="$(kubectl exec "${exec_pod}" -- consul acl bootstrap)"

              if [ "${output}" = "" ]; then
                echo "[ERROR] No consul acl bootstrap output. Is consul up and running?"
                exit 1
              fi

              echo "${output}"|grep AccessorID|awk '{print $2}'|tr -d '\n' >\
                "${secret_dir}/accessor_id.txt"
              echo "${output}"|grep SecretID|awk '{print $2}'|tr -d '\n' >\
                "${secret_dir}/secret_id.txt"

              kubectl create secret generic \
                "--from-file=${secret_dir}" "${secret_name}"
          envFrom:
            - configMapRef:
                name: {{ name }}
          volumeMounts:
            - mountPath: /consul/acl-bootstrap
              name: consul-init
      volumes:
        - name: consul-init
          emptyDir: {}
"#;

pub(crate) const SERVICE_ACCOUNT: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: {{ name }}-acl-bootstrap
"#;

pub(crate) const ROLE: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: {{ name }}-acl-bootstrap
rules:
  - apiGroups:
      - ""
    resources:
      - secrets
    verbs:
      - create
  - apiGroups:
      - ""
    resources:
      - pods/exec
    verbs:
      - create
    resourceNames:
      - {{ facts.workload }}-0
  - apiGroups:
      - ""
    resources:
      - pods
    verbs:
      - get
    resourceNames:
      - {{ facts.workload }}-0
"#;

pub(crate) const ROLE_BINDING: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: {{ name }}-acl-bootstrap
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: {{ name }}-acl-bootstrap
subjects:
  - kind: ServiceAccount
    name: {{ name }}-acl-bootstrap
"#;
