use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use url::Url;

use crate::credential::store::{normalize_thumbprint, StoreLocation};

/// How the application is deployed. Selects the credential strategy used to
/// reach the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Authenticate with a service-principal certificate from the local store.
    OnPremises,
    /// Authenticate with ambient identity material supplied by the platform.
    CloudHosted,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::OnPremises => "on-premises",
            DeploymentMode::CloudHosted => "cloud-hosted",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-premises" => Ok(DeploymentMode::OnPremises),
            "cloud-hosted" => Ok(DeploymentMode::CloudHosted),
            other => Err(anyhow::anyhow!(
                "unknown deployment mode: {} (expected on-premises | cloud-hosted)",
                other
            )),
        }
    }
}

/// Runtime configuration, assembled once at startup. Missing or malformed
/// values fail the load; nothing is re-read from the environment later.
#[derive(Debug, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    pub credentials: CredentialConfig,
    /// Ordered list of secret names resolved for the index page.
    pub secret_names: Vec<String>,
    /// Plain display value shown in the page header.
    pub site_title: String,
    /// Plain display value naming the environment (dev, staging, ...).
    pub environment: String,
}

impl Config {
    pub fn deployment_mode(&self) -> DeploymentMode {
        match self.credentials {
            CredentialConfig::OnPremises(_) => DeploymentMode::OnPremises,
            CredentialConfig::CloudHosted(_) => DeploymentMode::CloudHosted,
        }
    }

    /// Vault namespace requests are scoped to, when configured.
    pub fn tenant_id(&self) -> Option<&str> {
        match &self.credentials {
            CredentialConfig::OnPremises(sp) => Some(&sp.tenant_id),
            CredentialConfig::CloudHosted(ambient) => ambient.tenant_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Base URL of the vault server.
    pub addr: Url,
    /// KV v2 mount the secrets live under. Default: "secret".
    pub mount: String,
    /// Auth mount for TLS-certificate login. Default: "cert".
    pub cert_auth_mount: String,
    /// Auth mount for workload-token login. Default: "kubernetes".
    pub k8s_auth_mount: String,
    /// Accept self-signed vault TLS certificates. Default: false.
    pub insecure_skip_verify: bool,
    /// Per-request timeout for vault calls.
    pub request_timeout: Duration,
}

/// Credential inputs, split by deployment mode so each mode's required
/// fields are enforced at load time instead of at first use.
#[derive(Debug, Clone)]
pub enum CredentialConfig {
    OnPremises(ServicePrincipalConfig),
    CloudHosted(AmbientConfig),
}

/// Inputs for the certificate-based service principal (on-premises).
#[derive(Debug, Clone)]
pub struct ServicePrincipalConfig {
    /// Vault namespace, sent as X-Vault-Namespace.
    pub tenant_id: String,
    /// Certificate role name presented at login.
    pub client_id: String,
    /// SHA-256 fingerprint of the service principal's certificate,
    /// normalized (lowercase, no separators).
    pub certificate_thumbprint: String,
    pub store_location: StoreLocation,
    /// Store subdirectory. Default: "my".
    pub store_name: String,
    /// Explicit store directory, overriding location + name.
    pub store_path: Option<PathBuf>,
}

/// Inputs for the ambient-identity credential (cloud-hosted).
#[derive(Debug, Clone)]
pub struct AmbientConfig {
    pub tenant_id: Option<String>,
    /// Role assumed when exchanging the workload identity token.
    pub managed_identity_client_id: Option<String>,
    /// Vault token injected by the platform (VAULT_TOKEN), if any.
    pub ambient_token: Option<String>,
    /// Path to the platform-provided workload identity token.
    pub identity_token_file: PathBuf,
}

const DEFAULT_SECRET_NAMES: &str = "the-king-of-austria,the-king-of-prussia,the-king-of-england";
const DEFAULT_IDENTITY_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Assemble the configuration from the given variable lookup. Split out from
/// `load` so tests can feed in maps instead of mutating the process env.
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mode = get("VAULTVIEW_DEPLOYMENT_MODE")
        .context("VAULTVIEW_DEPLOYMENT_MODE is not set (on-premises | cloud-hosted)")?
        .parse::<DeploymentMode>()
        .context("VAULTVIEW_DEPLOYMENT_MODE is invalid")?;

    let addr = get("VAULTVIEW_VAULT_ADDR").context("VAULTVIEW_VAULT_ADDR is not set")?;
    let addr = Url::parse(&addr).context("VAULTVIEW_VAULT_ADDR is not a valid URL")?;
    anyhow::ensure!(
        matches!(addr.scheme(), "http" | "https"),
        "VAULTVIEW_VAULT_ADDR must be an http(s) URL, got scheme {}",
        addr.scheme()
    );

    let request_timeout = match get("VAULTVIEW_REQUEST_TIMEOUT_SECS") {
        Some(raw) => Duration::from_secs(
            raw.parse()
                .context("VAULTVIEW_REQUEST_TIMEOUT_SECS is not a number")?,
        ),
        None => Duration::from_secs(10),
    };

    let vault = VaultConfig {
        addr,
        mount: get("VAULTVIEW_VAULT_MOUNT").unwrap_or_else(|| "secret".into()),
        cert_auth_mount: get("VAULTVIEW_CERT_AUTH_MOUNT").unwrap_or_else(|| "cert".into()),
        k8s_auth_mount: get("VAULTVIEW_K8S_AUTH_MOUNT").unwrap_or_else(|| "kubernetes".into()),
        insecure_skip_verify: get("VAULTVIEW_VAULT_SKIP_VERIFY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
        request_timeout,
    };

    let credentials = match mode {
        DeploymentMode::OnPremises => {
            let tenant_id = get("VAULTVIEW_TENANT_ID")
                .context("VAULTVIEW_TENANT_ID must be set for on-premises deployments")?;
            let client_id = get("VAULTVIEW_CLIENT_ID")
                .context("VAULTVIEW_CLIENT_ID must be set for on-premises deployments")?;
            let thumbprint = get("VAULTVIEW_CERT_THUMBPRINT")
                .context("VAULTVIEW_CERT_THUMBPRINT must be set for on-premises deployments")?;
            let thumbprint = normalize_thumbprint(&thumbprint);
            anyhow::ensure!(!thumbprint.is_empty(), "VAULTVIEW_CERT_THUMBPRINT is empty");

            let store_location = match get("VAULTVIEW_CERT_STORE_LOCATION") {
                Some(raw) => raw
                    .parse::<StoreLocation>()
                    .context("VAULTVIEW_CERT_STORE_LOCATION is invalid")?,
                None => StoreLocation::LocalMachine,
            };

            CredentialConfig::OnPremises(ServicePrincipalConfig {
                tenant_id,
                client_id,
                certificate_thumbprint: thumbprint,
                store_location,
                store_name: get("VAULTVIEW_CERT_STORE_NAME").unwrap_or_else(|| "my".into()),
                store_path: get("VAULTVIEW_CERT_STORE_PATH").map(PathBuf::from),
            })
        }
        DeploymentMode::CloudHosted => CredentialConfig::CloudHosted(AmbientConfig {
            tenant_id: get("VAULTVIEW_TENANT_ID"),
            managed_identity_client_id: get("VAULTVIEW_MANAGED_IDENTITY_CLIENT_ID"),
            ambient_token: get("VAULT_TOKEN"),
            identity_token_file: get("VAULTVIEW_IDENTITY_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_TOKEN_FILE)),
        }),
    };

    let secret_names: Vec<String> = get("VAULTVIEW_SECRET_NAMES")
        .unwrap_or_else(|| DEFAULT_SECRET_NAMES.into())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    anyhow::ensure!(
        !secret_names.is_empty(),
        "VAULTVIEW_SECRET_NAMES must name at least one secret"
    );

    Ok(Config {
        vault,
        credentials,
        secret_names,
        site_title: get("VAULTVIEW_SITE_TITLE").unwrap_or_else(|| "vaultview".into()),
        environment: get("VAULTVIEW_ENVIRONMENT").unwrap_or_else(|| "development".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn cloud_hosted_loads_with_defaults() {
        let cfg = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "cloud-hosted"),
            ("VAULTVIEW_VAULT_ADDR", "http://127.0.0.1:8200"),
        ])
        .unwrap();

        assert_eq!(cfg.deployment_mode(), DeploymentMode::CloudHosted);
        assert_eq!(cfg.vault.mount, "secret");
        assert_eq!(cfg.vault.request_timeout, Duration::from_secs(10));
        assert_eq!(
            cfg.secret_names,
            vec![
                "the-king-of-austria",
                "the-king-of-prussia",
                "the-king-of-england"
            ]
        );
        assert_eq!(cfg.tenant_id(), None);
    }

    #[test]
    fn on_premises_requires_certificate_inputs() {
        let err = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "on-premises"),
            ("VAULTVIEW_VAULT_ADDR", "https://vault.internal:8200"),
            ("VAULTVIEW_TENANT_ID", "tenant-xyz"),
            ("VAULTVIEW_CLIENT_ID", "client-abc"),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("VAULTVIEW_CERT_THUMBPRINT"));
    }

    #[test]
    fn on_premises_normalizes_thumbprint() {
        let cfg = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "on-premises"),
            ("VAULTVIEW_VAULT_ADDR", "https://vault.internal:8200"),
            ("VAULTVIEW_TENANT_ID", "tenant-xyz"),
            ("VAULTVIEW_CLIENT_ID", "client-abc"),
            ("VAULTVIEW_CERT_THUMBPRINT", "AB:CD:12:34"),
        ])
        .unwrap();

        match cfg.credentials {
            CredentialConfig::OnPremises(sp) => {
                assert_eq!(sp.certificate_thumbprint, "abcd1234");
                assert_eq!(sp.store_location, StoreLocation::LocalMachine);
                assert_eq!(sp.store_name, "my");
            }
            CredentialConfig::CloudHosted(_) => panic!("expected on-premises credentials"),
        }
    }

    #[test]
    fn unknown_deployment_mode_fails() {
        let err = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "hybrid"),
            ("VAULTVIEW_VAULT_ADDR", "http://127.0.0.1:8200"),
        ])
        .unwrap_err();

        assert!(format!("{:#}", err).contains("unknown deployment mode"));
    }

    #[test]
    fn unknown_store_location_fails() {
        let err = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "on-premises"),
            ("VAULTVIEW_VAULT_ADDR", "https://vault.internal:8200"),
            ("VAULTVIEW_TENANT_ID", "t"),
            ("VAULTVIEW_CLIENT_ID", "c"),
            ("VAULTVIEW_CERT_THUMBPRINT", "abcd"),
            ("VAULTVIEW_CERT_STORE_LOCATION", "registry"),
        ])
        .unwrap_err();

        assert!(format!("{:#}", err).contains("certificate store location"));
    }

    #[test]
    fn vault_addr_must_be_http() {
        let err = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "cloud-hosted"),
            ("VAULTVIEW_VAULT_ADDR", "ftp://vault.internal"),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn secret_names_are_trimmed_and_ordered() {
        let cfg = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "cloud-hosted"),
            ("VAULTVIEW_VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULTVIEW_SECRET_NAMES", " alpha , beta ,, gamma "),
        ])
        .unwrap();

        assert_eq!(cfg.secret_names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn malformed_timeout_fails() {
        let err = load_from(&[
            ("VAULTVIEW_DEPLOYMENT_MODE", "cloud-hosted"),
            ("VAULTVIEW_VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULTVIEW_REQUEST_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("VAULTVIEW_REQUEST_TIMEOUT_SECS"));
    }
}
