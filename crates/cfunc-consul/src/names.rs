//! Function config keys

/// Enables TLS certificate generation and server TLS wiring
pub const TLS_ENABLED: &str = "tls_enabled";
/// Enables gossip encryption key generation
pub const GOSSIP_ENABLED: &str = "gossip_enabled";
/// Enables the ACL bootstrap job
pub const ACL_BOOTSTRAP_ENABLED: &str = "acl_bootstrap_enabled";
/// Enables agent sidecar contributions
pub const SIDECAR_INJECTOR_ENABLED: &str = "sidecar_injector_enabled";

/// Secret holding the ACL bootstrap token
pub const ACL_SECRET_NAME: &str = "acl_secret_name";
/// Secret holding the gossip encryption config
pub const GOSSIP_SECRET_NAME: &str = "gossip_secret_name";
/// Secret holding all generated TLS material
pub const TLS_SERVER_SECRET_NAME: &str = "tls_server_secret_name";
/// Secret holding the CA certificate
pub const TLS_CA_SECRET_NAME: &str = "tls_ca_secret_name";
/// Secret holding the CLI certificate
pub const TLS_CLI_SECRET_NAME: &str = "tls_cli_secret_name";
/// Secret holding the client certificate
pub const TLS_CLIENT_SECRET_NAME: &str = "tls_client_secret_name";

/// Every feature toggle
pub const TOGGLES: [&str; 4] = [
    TLS_ENABLED,
    GOSSIP_ENABLED,
    ACL_BOOTSTRAP_ENABLED,
    SIDECAR_INJECTOR_ENABLED,
];

/// Every derived name with its default suffix
pub const DERIVED_NAMES: [(&str, &str); 6] = [
    (ACL_SECRET_NAME, "acl"),
    (GOSSIP_SECRET_NAME, "gossip"),
    (TLS_SERVER_SECRET_NAME, "tls-server"),
    (TLS_CA_SECRET_NAME, "tls-ca"),
    (TLS_CLI_SECRET_NAME, "tls-cli"),
    (TLS_CLIENT_SECRET_NAME, "tls-client"),
];

/// Secrets produced by the TLS job
pub(crate) const TLS_SECRETS: [&str; 4] = [
    TLS_SERVER_SECRET_NAME,
    TLS_CA_SECRET_NAME,
    TLS_CLI_SECRET_NAME,
    TLS_CLIENT_SECRET_NAME,
];
