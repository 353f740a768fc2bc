//! Consul server: configuration, StatefulSet and Services

pub(crate) const CONFIGMAP: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: {{ name }}-{{ namespace }}-server
data:
  00-agent-defaults.hcl: |-
    datacenter = "dc1"
    data_dir = "/consul/data"
  00-acl-defaults.hcl: |-
    acl = {
      enabled = true
      default_policy = "allow"
      enable_token_persistence = true
    }
  00-connect-defaults.hcl: |-
    connect = {
      enabled = true
    }
"#;

pub(crate) const STATEFULSET: &str = r#"apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: {{ facts.workload }}
spec:
  replicas: {{ facts.replicas }}
  serviceName: {{ name }}-server
  podManagementPolicy: Parallel
  updateStrategy:
    type: RollingUpdate
  selector:
    matchLabels: {}
  template:
    metadata:
      labels: {}
    spec:
      securityContext:
        fsGroup: 1000
      containers:
        - name: consul
          image: docker.io/library/consul:1.7.1
          command:
            - consul
            - agent
            - -advertise=$(POD_IP)
            - -bind=0.0.0.0
            - -bootstrap-expect=$(CONSUL_REPLICAS)
            - -client=0.0.0.0
            - -config-dir=/consul/config
            - -ui
            - -retry-join={{ name }}-server.$(NAMESPACE).svc.cluster.local
            - -server
          env:
            - name: POD_IP
              valueFrom:
                fieldRef:
                  fieldPath: status.podIP
            - name: NAMESPACE
              valueFrom:
                fieldRef:
                  fieldPath: metadata.namespace
            - name: CONSUL_REPLICAS
              value: "{{ facts.replicas }}"
          volumeMounts:
            - name: consul-data
              mountPath: /consul/data
            - name: consul-configs
              mountPath: /consul/config
          lifecycle:
            preStop:
              exec:
                command:
                  - /bin/sh
                  - -c
                  - consul leave
          ports:
            - containerPort: 8500
              name: http
              protocol: TCP
            - containerPort: 8301
              name: serflan-tcp
              protocol: TCP
            - containerPort: 8301
              name: serflan-udp
              protocol: UDP
            - containerPort: 8302
              name: serfwan-tcp
              protocol: TCP
            - containerPort: 8302
              name: serfwan-udp
              protocol: UDP
            - containerPort: 8300
              name: server
              protocol: TCP
            - containerPort: 8600
              name: dns-tcp
              protocol: TCP
            - containerPort: 8600
              name: dns-udp
              protocol: UDP
          readinessProbe:
            exec:
              command:
                - /bin/sh
                - -ec
                - |
                  curl http://127.0.0.1:8500/v1/status/leader 2>/dev/null | \
                  grep -E '".+"'
      volumes:
        - name: consul-data
          emptyDir: {}
        - name: consul-configs
          projected:
            sources:
              - configMap:
                  name: {{ name }}-{{ namespace }}-server
"#;

pub(crate) const SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: {{ name }}-server
spec:
  clusterIP: None
  publishNotReadyAddresses: true
  ports:
    - name: http
      port: 8500
      targetPort: http
    - name: serflan-tcp
      protocol: TCP
      port: 8301
      targetPort: serflan-tcp
    - name: serflan-udp
      protocol: UDP
      port: 8301
      targetPort: serflan-udp
    - name: serfwan-tcp
      protocol: TCP
      port: 8302
      targetPort: serfwan-tcp
    - name: serfwan-udp
      protocol: UDP
      port: 8302
      targetPort: serfwan-udp
    - name: server
      port: 8300
      targetPort: server
    - name: dns-tcp
      protocol: TCP
      port: 8600
      targetPort: dns-tcp
    - name: dns-udp
      protocol: UDP
      port: 8600
      targetPort: dns-udp
"#;

pub(crate) const DNS_SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: {{ name }}-server-dns
spec:
  ports:
    - name: dns-tcp
      port: 53
      protocol: TCP
      targetPort: dns-tcp
    - name: dns-udp
      port: 53
      protocol: UDP
      targetPort: dns-udp
"#;

pub(crate) const UI_SERVICE: &str = r#"apiVersion: v1
kind: Service
metadata:
  name: {{ name }}-server-ui
spec:
  ports:
    - name: http
      port: 80
      targetPort: 8500
"#;
