//! The resolution pass: select a credential, open a vault session, fetch the
//! requested names in order.

use std::sync::Arc;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::Config;
use crate::credential::Credential;
use crate::errors::ResolveError;
use crate::vault::VaultClient;

/// A resolved secret value. Zeroed on drop; `Debug` never prints the
/// plaintext.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// The plaintext. Callers render it and let it go; nothing stores it
    /// past the request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretValue([REDACTED {} bytes])", self.0.len())
    }
}

/// One resolved name/value pair.
#[derive(Debug, Clone)]
pub struct ResolvedSecret {
    pub name: String,
    pub value: SecretValue,
}

/// The resolved mapping, in request order.
#[derive(Debug, Default)]
pub struct ResolvedSecrets(Vec<ResolvedSecret>);

impl ResolvedSecrets {
    pub fn from_parts(secrets: Vec<ResolvedSecret>) -> Self {
        Self(secrets)
    }

    pub fn get(&self, name: &str) -> Option<&SecretValue> {
        self.0.iter().find(|s| s.name == name).map(|s| &s.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedSecret> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runs one credential-selection and retrieval pass per call.
///
/// Holds no state between passes: the credential, the vault session, and the
/// certificate store handle all live inside `resolve` and die with it.
pub struct SecretResolver {
    config: Arc<Config>,
}

impl SecretResolver {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Resolve every name, in order. The first failure aborts the pass;
    /// later names are not requested and no partial result is returned.
    pub async fn resolve(&self, names: &[String]) -> Result<ResolvedSecrets, ResolveError> {
        let credential = Credential::from_config(&self.config)?;
        tracing::debug!("credential strategy: {}", credential.kind());

        let mut client = VaultClient::new(&self.config, credential)?;

        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let value = client.read_secret(name).await?;
            resolved.push(ResolvedSecret {
                name: name.clone(),
                value,
            });
        }

        tracing::debug!("resolved {} secrets", resolved.len());
        Ok(ResolvedSecrets(resolved))
    }
}
