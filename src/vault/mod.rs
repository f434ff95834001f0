//! Client for the vault's HTTP API: session login, KV v2 reads, health.
//!
//! One client per resolution pass. The session token is established lazily on
//! the first read and dropped with the client; there are no retries and no
//! caching.

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::{Config, VaultConfig};
use crate::credential::{AmbientSource, Credential};
use crate::errors::ResolveError;
use crate::resolver::SecretValue;

const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const TOKEN_HEADER: &str = "X-Vault-Token";

pub struct VaultClient {
    http: reqwest::Client,
    addr: Url,
    mount: String,
    cert_auth_mount: String,
    k8s_auth_mount: String,
    namespace: Option<String>,
    credential: Credential,
    /// Session token for this pass, set on first use.
    token: Option<String>,
}

impl VaultClient {
    /// Build the per-pass HTTP client. Certificate credentials attach their
    /// TLS identity here, so a bad identity surfaces as a credential
    /// construction failure before any request is made.
    pub fn new(config: &Config, credential: Credential) -> Result<Self, ResolveError> {
        let vault = &config.vault;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(vault.request_timeout)
            .connect_timeout(Duration::from_secs(5));

        if vault.insecure_skip_verify {
            tracing::warn!("vault TLS verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Credential::Certificate(cert) = &credential {
            builder = builder.identity(cert.identity.clone());
        }

        let http = builder
            .build()
            .context("failed to build vault HTTP client")
            .map_err(|e| {
                ResolveError::credential_construction(&vault.addr, credential.describe(), e)
            })?;

        Ok(Self {
            http,
            addr: vault.addr.clone(),
            mount: vault.mount.clone(),
            cert_auth_mount: vault.cert_auth_mount.clone(),
            k8s_auth_mount: vault.k8s_auth_mount.clone(),
            namespace: config.tenant_id().map(String::from),
            credential,
            token: None,
        })
    }

    /// KV v2 read: GET /v1/{mount}/data/{name}, extracting the "value" field
    /// of the secret data. Any failure, including the lazy session login, is
    /// a retrieval failure for `name` carrying the vault address.
    pub async fn read_secret(&mut self, name: &str) -> Result<SecretValue, ResolveError> {
        let token = self
            .ensure_token()
            .await
            .map_err(|e| ResolveError::secret_retrieval(name, &self.addr, e))?;

        self.fetch_value(name, &token)
            .await
            .map_err(|e| ResolveError::secret_retrieval(name, &self.addr, e))
    }

    /// Session token for the pass, logging in first if the credential
    /// requires an exchange.
    async fn ensure_token(&mut self) -> anyhow::Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        let token = match &self.credential {
            Credential::AmbientIdentity(ambient) => match &ambient.source {
                AmbientSource::Token(token) => token.clone(),
                AmbientSource::WorkloadJwt { jwt, role } => {
                    let url = self.auth_url(&self.k8s_auth_mount)?;
                    self.login(url, json!({ "jwt": jwt, "role": role }))
                        .await
                        .context("workload identity login failed")?
                }
            },
            Credential::Certificate(cert) => {
                let url = self.auth_url(&self.cert_auth_mount)?;
                self.login(url, json!({ "name": cert.client_id }))
                    .await
                    .context("certificate login failed")?
            }
        };

        self.token = Some(token.clone());
        Ok(token)
    }

    /// POST to an auth mount's login endpoint, returning the client token.
    async fn login(&self, url: Url, body: serde_json::Value) -> anyhow::Result<String> {
        let mut req = self.http.post(url);
        if let Some(ns) = &self.namespace {
            req = req.header(NAMESPACE_HEADER, ns);
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .context("vault login request failed")?
            .error_for_status()
            .context("vault rejected the login")?;

        let auth: AuthResponse = resp
            .json()
            .await
            .context("vault login response was not valid JSON")?;
        Ok(auth.auth.client_token)
    }

    async fn fetch_value(&self, name: &str, token: &str) -> anyhow::Result<SecretValue> {
        let url = self.secret_url(name)?;
        tracing::debug!("reading secret {} from {}", name, self.addr);

        let mut req = self.http.get(url).header(TOKEN_HEADER, token);
        if let Some(ns) = &self.namespace {
            req = req.header(NAMESPACE_HEADER, ns);
        }

        let resp = req
            .send()
            .await
            .context("vault request failed")?
            .error_for_status()
            .context("vault returned an error")?;

        let body: SecretResponse = resp
            .json()
            .await
            .context("vault response was not valid JSON")?;
        let value = body
            .data
            .data
            .get("value")
            .ok_or_else(|| anyhow!("secret has no \"value\" field"))?
            .as_str()
            .ok_or_else(|| anyhow!("secret \"value\" field is not a string"))?;

        Ok(SecretValue::new(value.to_string()))
    }

    fn secret_url(&self, name: &str) -> anyhow::Result<Url> {
        let mut url = self.addr.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("vault address cannot be a base URL"))?
            .pop_if_empty()
            .push("v1")
            .extend(self.mount.split('/'))
            .push("data")
            .extend(name.split('/'));
        Ok(url)
    }

    fn auth_url(&self, mount: &str) -> anyhow::Result<Url> {
        let mut url = self.addr.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("vault address cannot be a base URL"))?
            .pop_if_empty()
            .push("v1")
            .push("auth")
            .extend(mount.split('/'))
            .push("login");
        Ok(url)
    }
}

/// Unauthenticated health probe (GET /v1/sys/health). True when the vault
/// answers 200: initialized, unsealed, active.
pub async fn health(vault: &VaultConfig) -> anyhow::Result<bool> {
    let mut url = vault.addr.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("vault address cannot be a base URL"))?
        .pop_if_empty()
        .extend(["v1", "sys", "health"]);

    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(vault.request_timeout);
    if vault.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }
    let client = builder.build().context("failed to build health probe client")?;

    let resp = client
        .get(url)
        .send()
        .await
        .context("vault health request failed")?;
    Ok(resp.status().is_success())
}

// ── Wire DTOs ────────────────────────────────────────────────

#[derive(Deserialize)]
struct AuthResponse {
    auth: AuthData,
}

#[derive(Deserialize)]
struct AuthData {
    client_token: String,
}

#[derive(Deserialize)]
struct SecretResponse {
    data: SecretData,
}

#[derive(Deserialize)]
struct SecretData {
    data: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AmbientConfig, CredentialConfig};
    use std::path::PathBuf;

    fn client_for(addr: &str) -> VaultClient {
        let config = Config {
            vault: VaultConfig {
                addr: Url::parse(addr).unwrap(),
                mount: "secret".into(),
                cert_auth_mount: "cert".into(),
                k8s_auth_mount: "kubernetes".into(),
                insecure_skip_verify: false,
                request_timeout: Duration::from_secs(5),
            },
            credentials: CredentialConfig::CloudHosted(AmbientConfig {
                tenant_id: Some("tenant-xyz".into()),
                managed_identity_client_id: None,
                ambient_token: Some("unit-token".into()),
                identity_token_file: PathBuf::from("/nonexistent/token"),
            }),
            secret_names: vec![],
            site_title: "vaultview".into(),
            environment: "test".into(),
        };
        let credential = Credential::from_config(&config).unwrap();
        VaultClient::new(&config, credential).unwrap()
    }

    #[test]
    fn secret_url_joins_mount_and_name() {
        let client = client_for("http://127.0.0.1:8200");
        let url = client.secret_url("the-king-of-austria").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8200/v1/secret/data/the-king-of-austria"
        );
    }

    #[test]
    fn secret_url_keeps_nested_names_as_path_segments() {
        let client = client_for("http://127.0.0.1:8200");
        let url = client.secret_url("team/db-password").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8200/v1/secret/data/team/db-password"
        );
    }

    #[test]
    fn auth_url_targets_the_login_endpoint() {
        let client = client_for("https://vault.internal:8200/");
        let url = client.auth_url("kubernetes").unwrap();
        assert_eq!(
            url.as_str(),
            "https://vault.internal:8200/v1/auth/kubernetes/login"
        );
    }

    #[test]
    fn secret_response_parses_kv2_shape() {
        let raw = serde_json::json!({
            "request_id": "8a2db4e9",
            "data": {
                "data": { "value": "A" },
                "metadata": { "version": 1 }
            }
        });
        let parsed: SecretResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.data.data["value"], "A");
    }

    #[test]
    fn auth_response_parses_client_token() {
        let raw = serde_json::json!({
            "auth": {
                "client_token": "s.1234",
                "lease_duration": 3600,
                "renewable": true
            }
        });
        let parsed: AuthResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.auth.client_token, "s.1234");
    }
}
