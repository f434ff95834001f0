//! Read-only PEM certificate store.
//!
//! Mirrors a host certificate store: a directory of PEM bundles keyed by the
//! SHA-256 fingerprint of the leaf certificate. Lookups must match exactly
//! one bundle; the store is never written to.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::errors::ResolveError;

/// Where the certificate store lives on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLocation {
    /// Host-wide store under /etc/vaultview/certs.
    LocalMachine,
    /// Per-user store under ~/.config/vaultview/certs.
    CurrentUser,
}

impl StoreLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreLocation::LocalMachine => "local-machine",
            StoreLocation::CurrentUser => "current-user",
        }
    }

    fn base_dir(self) -> PathBuf {
        match self {
            StoreLocation::LocalMachine => PathBuf::from("/etc/vaultview/certs"),
            StoreLocation::CurrentUser => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/vaultview/certs"),
        }
    }
}

impl FromStr for StoreLocation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-machine" => Ok(StoreLocation::LocalMachine),
            "current-user" => Ok(StoreLocation::CurrentUser),
            other => Err(anyhow::anyhow!(
                "unknown certificate store location: {} (expected local-machine | current-user)",
                other
            )),
        }
    }
}

/// Thumbprints compare case-insensitively and ignore `:` separators, so the
/// output of `openssl x509 -fingerprint -sha256` can be pasted as-is.
pub fn normalize_thumbprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ':' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// A certificate store rooted at one directory.
pub struct CertificateStore {
    path: PathBuf,
}

impl CertificateStore {
    /// Open the conventional store directory for `location` / `name`.
    pub fn open(location: StoreLocation, name: &str) -> Self {
        Self {
            path: location.base_dir().join(name),
        }
    }

    /// Open a store rooted at an explicit directory.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the store for the bundle whose leaf certificate has the given
    /// SHA-256 thumbprint. Exactly one bundle must match; zero or several is
    /// `CertificateNotFound`. No network I/O happens here.
    pub fn find_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> Result<StoreCertificate, ResolveError> {
        let wanted = normalize_thumbprint(thumbprint);
        let mut matches = Vec::new();

        for path in self.bundle_paths() {
            let pem = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("skipping unreadable bundle {}: {}", path.display(), e);
                    continue;
                }
            };
            let fingerprint = match leaf_fingerprint(&pem) {
                Some(fp) => fp,
                None => {
                    tracing::warn!("skipping {}: no certificate in bundle", path.display());
                    continue;
                }
            };
            if fingerprint == wanted {
                matches.push(StoreCertificate {
                    path,
                    pem,
                    fingerprint,
                });
            }
        }

        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(ResolveError::CertificateNotFound {
                thumbprint: wanted,
                store: self.path.display().to_string(),
                matches: matches.len(),
            })
        }
    }

    /// Candidate bundle files, sorted for deterministic scans. A missing
    /// store directory reads as empty.
    fn bundle_paths(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("pem") | Some("crt")
                )
            })
            .collect();
        paths.sort();
        paths
    }
}

/// One matched bundle from the store.
#[derive(Debug)]
pub struct StoreCertificate {
    path: PathBuf,
    pem: Vec<u8>,
    fingerprint: String,
}

impl StoreCertificate {
    /// Full PEM bundle: the certificate plus whatever key material the file
    /// carries.
    pub fn pem_bytes(&self) -> &[u8] {
        &self.pem
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// SHA-256 fingerprint (lowercase hex) of the first certificate in a PEM
/// bundle, or None if the bundle holds no parseable certificate.
fn leaf_fingerprint(pem: &[u8]) -> Option<String> {
    let mut reader = BufReader::new(pem);
    let der = rustls_pemfile::certs(&mut reader).next()?.ok()?;
    Some(hex::encode(Sha256::digest(der.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHA_PEM: &[u8] = include_bytes!("../../tests/fixtures/alpha.pem");
    const BETA_PEM: &[u8] = include_bytes!("../../tests/fixtures/beta.pem");

    // openssl x509 -noout -fingerprint -sha256 on the fixture certs.
    const ALPHA_THUMBPRINT: &str =
        "05:68:48:46:BD:EA:11:72:78:F0:3E:5B:37:D3:C9:9A:5F:72:AD:E7:78:60:97:DE:FC:20:8A:65:0A:DF:FE:37";
    const BETA_THUMBPRINT: &str =
        "16d132e3af75d952c81a63daa98ab9c0efc4f44c3c28934a39707803b55c94f4";

    fn store_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, CertificateStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in files {
            fs::write(dir.path().join(name), bytes).unwrap();
        }
        let store = CertificateStore::at_path(dir.path());
        (dir, store)
    }

    #[test]
    fn normalize_strips_separators_and_case() {
        assert_eq!(normalize_thumbprint("AB:CD: 12"), "abcd12");
        assert_eq!(normalize_thumbprint("abcd12"), "abcd12");
    }

    #[test]
    fn finds_exactly_one_match() {
        let (_dir, store) = store_with(&[("alpha.pem", ALPHA_PEM), ("beta.pem", BETA_PEM)]);

        let cert = store.find_by_thumbprint(ALPHA_THUMBPRINT).unwrap();
        assert_eq!(
            cert.fingerprint(),
            normalize_thumbprint(ALPHA_THUMBPRINT)
        );
        assert_eq!(cert.pem_bytes(), ALPHA_PEM);
    }

    #[test]
    fn zero_matches_is_certificate_not_found() {
        let (_dir, store) = store_with(&[("beta.pem", BETA_PEM)]);

        let err = store.find_by_thumbprint(ALPHA_THUMBPRINT).unwrap_err();
        match err {
            ResolveError::CertificateNotFound { matches, .. } => assert_eq!(matches, 0),
            other => panic!("expected CertificateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_matches_are_rejected() {
        let (_dir, store) = store_with(&[
            ("alpha.pem", ALPHA_PEM),
            ("alpha-copy.pem", ALPHA_PEM),
        ]);

        let err = store.find_by_thumbprint(ALPHA_THUMBPRINT).unwrap_err();
        match err {
            ResolveError::CertificateNotFound { matches, .. } => assert_eq!(matches, 2),
            other => panic!("expected CertificateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn missing_store_reads_as_empty() {
        let store = CertificateStore::at_path("/nonexistent/vaultview-store");

        let err = store.find_by_thumbprint(BETA_THUMBPRINT).unwrap_err();
        match err {
            ResolveError::CertificateNotFound { matches, .. } => assert_eq!(matches, 0),
            other => panic!("expected CertificateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn junk_bundles_are_skipped() {
        let (_dir, store) = store_with(&[
            ("alpha.pem", ALPHA_PEM),
            ("junk.pem", b"not pem at all"),
            ("notes.txt", b"ignored extension"),
        ]);

        let cert = store.find_by_thumbprint(ALPHA_THUMBPRINT).unwrap();
        assert!(cert.path().ends_with("alpha.pem"));
    }

    #[test]
    fn store_location_parses() {
        assert_eq!(
            "local-machine".parse::<StoreLocation>().unwrap(),
            StoreLocation::LocalMachine
        );
        assert_eq!(
            "current-user".parse::<StoreLocation>().unwrap(),
            StoreLocation::CurrentUser
        );
        assert!("registry".parse::<StoreLocation>().is_err());
    }
}
