//! Credential selection.
//!
//! Exactly one of two strategies is active per resolution pass, chosen by the
//! deployment mode: a service-principal certificate pulled from the local
//! store, or ambient identity material supplied by the hosting platform. The
//! branch lives in `Credential::from_config` and nowhere else.

pub mod store;

use std::fs;

use anyhow::Context;

use crate::config::{AmbientConfig, Config, CredentialConfig, ServicePrincipalConfig};
use crate::errors::ResolveError;
use store::CertificateStore;

#[derive(Debug)]
pub enum Credential {
    /// Service-principal certificate from the local store (on-premises).
    Certificate(CertificateCredential),
    /// Ambient identity material from the platform (cloud-hosted).
    AmbientIdentity(AmbientIdentityCredential),
}

impl Credential {
    /// Single selection point for the deployment-mode branch.
    pub fn from_config(config: &Config) -> Result<Self, ResolveError> {
        match &config.credentials {
            CredentialConfig::OnPremises(sp) => Ok(Credential::Certificate(
                CertificateCredential::from_store(config, sp)?,
            )),
            CredentialConfig::CloudHosted(ambient) => Ok(Credential::AmbientIdentity(
                AmbientIdentityCredential::discover(config, ambient)?,
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Certificate(_) => "certificate",
            Credential::AmbientIdentity(_) => "ambient-identity",
        }
    }

    /// Identifier summary for error messages. Never includes key material.
    pub fn describe(&self) -> String {
        match self {
            Credential::Certificate(c) => format!(
                "tenant {}, client {}, thumbprint {}",
                c.tenant_id, c.client_id, c.thumbprint
            ),
            Credential::AmbientIdentity(a) => match &a.source {
                AmbientSource::Token(_) => "ambient vault token".to_string(),
                AmbientSource::WorkloadJwt { role, .. } => {
                    format!("workload identity, role {}", role)
                }
            },
        }
    }
}

/// TLS client identity backed by the certificate found in the store.
#[derive(Debug)]
pub struct CertificateCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub thumbprint: String,
    pub identity: reqwest::Identity,
}

impl CertificateCredential {
    /// Find the configured certificate and turn its PEM bundle into a TLS
    /// client identity. The store handle is scoped to this call and nothing
    /// is written. Runs no network I/O.
    pub fn from_store(
        config: &Config,
        sp: &ServicePrincipalConfig,
    ) -> Result<Self, ResolveError> {
        let store = match &sp.store_path {
            Some(path) => CertificateStore::at_path(path),
            None => CertificateStore::open(sp.store_location, &sp.store_name),
        };
        tracing::debug!(
            "searching {} for certificate {}",
            store.path().display(),
            sp.certificate_thumbprint
        );

        let cert = store.find_by_thumbprint(&sp.certificate_thumbprint)?;

        let identity = reqwest::Identity::from_pem(cert.pem_bytes())
            .context("certificate bundle is not usable as a TLS client identity")
            .map_err(|e| {
                ResolveError::credential_construction(
                    &config.vault.addr,
                    format!(
                        "tenant {}, client {}, thumbprint {}",
                        sp.tenant_id, sp.client_id, sp.certificate_thumbprint
                    ),
                    e,
                )
            })?;

        Ok(Self {
            tenant_id: sp.tenant_id.clone(),
            client_id: sp.client_id.clone(),
            thumbprint: cert.fingerprint().to_string(),
            identity,
        })
    }
}

/// Identity material the platform injected into the environment.
#[derive(Debug)]
pub struct AmbientIdentityCredential {
    pub source: AmbientSource,
}

#[derive(Debug)]
pub enum AmbientSource {
    /// A vault token handed to the process (VAULT_TOKEN). Used directly.
    Token(String),
    /// A workload identity token to exchange at the vault's kubernetes login
    /// under the given role.
    WorkloadJwt { jwt: String, role: String },
}

impl AmbientIdentityCredential {
    /// Pick up whatever identity the platform provides: an injected vault
    /// token if present, otherwise the workload identity token. Never touches
    /// the certificate store.
    pub fn discover(config: &Config, ambient: &AmbientConfig) -> Result<Self, ResolveError> {
        if let Some(token) = &ambient.ambient_token {
            return Ok(Self {
                source: AmbientSource::Token(token.clone()),
            });
        }

        if ambient.identity_token_file.exists() {
            let role = ambient.managed_identity_client_id.clone().ok_or_else(|| {
                ResolveError::credential_construction(
                    &config.vault.addr,
                    format!(
                        "workload token file {}",
                        ambient.identity_token_file.display()
                    ),
                    anyhow::anyhow!(
                        "VAULTVIEW_MANAGED_IDENTITY_CLIENT_ID is required to exchange a workload identity token"
                    ),
                )
            })?;

            let jwt = fs::read_to_string(&ambient.identity_token_file)
                .with_context(|| {
                    format!(
                        "failed to read workload identity token {}",
                        ambient.identity_token_file.display()
                    )
                })
                .map_err(|e| {
                    ResolveError::credential_construction(
                        &config.vault.addr,
                        format!("managed identity client {}", role),
                        e,
                    )
                })?;
            let jwt = jwt.trim().to_string();
            if jwt.is_empty() {
                return Err(ResolveError::credential_construction(
                    &config.vault.addr,
                    format!("managed identity client {}", role),
                    anyhow::anyhow!(
                        "workload identity token {} is empty",
                        ambient.identity_token_file.display()
                    ),
                ));
            }

            return Ok(Self {
                source: AmbientSource::WorkloadJwt { jwt, role },
            });
        }

        Err(ResolveError::credential_construction(
            &config.vault.addr,
            "ambient identity",
            anyhow::anyhow!(
                "no ambient identity material found (VAULT_TOKEN unset, {} missing)",
                ambient.identity_token_file.display()
            ),
        ))
    }
}
