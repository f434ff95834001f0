use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use url::Url;

/// Failures of a single resolution pass. Messages carry the vault address and
/// the identifiers involved, never secret values or certificate material.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The certificate store scan did not yield exactly one match.
    #[error("expected exactly one certificate with thumbprint {thumbprint} in {store}, found {matches}")]
    CertificateNotFound {
        thumbprint: String,
        store: String,
        matches: usize,
    },

    #[error("unable to construct credential for vault {vault_addr} ({detail}): {source}")]
    CredentialConstructionFailed {
        vault_addr: String,
        detail: String,
        source: anyhow::Error,
    },

    #[error("unable to get secret \"{name}\" from vault {vault_addr}: {source}")]
    SecretRetrievalFailed {
        name: String,
        vault_addr: String,
        source: anyhow::Error,
    },
}

impl ResolveError {
    pub fn credential_construction(
        vault_addr: &Url,
        detail: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        ResolveError::CredentialConstructionFailed {
            vault_addr: vault_addr.to_string(),
            detail: detail.into(),
            source,
        }
    }

    pub fn secret_retrieval(name: &str, vault_addr: &Url, source: anyhow::Error) -> Self {
        ResolveError::SecretRetrievalFailed {
            name: name.to_string(),
            vault_addr: vault_addr.to_string(),
            source,
        }
    }
}

/// Application-level errors surfaced to HTTP clients as the error page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::Resolve(e @ ResolveError::CertificateNotFound { .. }) => {
                tracing::error!("certificate lookup failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "certificate_not_found",
                    e.to_string(),
                )
            }
            AppError::Resolve(e @ ResolveError::CredentialConstructionFailed { .. }) => {
                tracing::error!("credential construction failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "credential_construction_failed",
                    e.to_string(),
                )
            }
            AppError::Resolve(e @ ResolveError::SecretRetrievalFailed { .. }) => {
                tracing::error!("secret retrieval failed: {}", e);
                (StatusCode::BAD_GATEWAY, "secret_retrieval_failed", e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let html = crate::web::pages::render_error(status, code, &msg);
        (status, Html(html)).into_response()
    }
}
