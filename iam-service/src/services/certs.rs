//! Cert resolution and JWK export.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::Serialize;
use std::sync::Arc;

use super::error::{CryptoError, ServiceError};
use super::store::CredentialStore;
use crate::models::{Application, Cert};

/// Certs are owned by this account.
pub const CERT_OWNER: &str = "admin";

/// Resolves the signing cert for an application, falling back to the
/// system default when the application names none.
#[derive(Clone)]
pub struct CertProvider {
    store: Arc<dyn CredentialStore>,
    default_cert: String,
}

impl CertProvider {
    pub fn new(store: Arc<dyn CredentialStore>, default_cert: impl Into<String>) -> Self {
        Self {
            store,
            default_cert: default_cert.into(),
        }
    }

    pub async fn default_cert(&self) -> Result<Cert, ServiceError> {
        self.get(&self.default_cert).await
    }

    pub async fn for_application(&self, application: &Application) -> Result<Cert, ServiceError> {
        match application.cert.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => self.get(name).await,
            None => self.default_cert().await,
        }
    }

    async fn get(&self, name: &str) -> Result<Cert, ServiceError> {
        self.store
            .get_cert(CERT_OWNER, name)
            .await?
            .ok_or_else(|| CryptoError::CertNotFound(format!("{}/{}", CERT_OWNER, name)).into())
    }
}

/// RFC 7517 public key entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jwk {
    pub kty: &'static str,
    pub alg: &'static str,
    #[serde(rename = "use")]
    pub key_use: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl Jwk {
    pub fn from_cert(cert: &Cert) -> Result<Self, CryptoError> {
        let public_key = RsaPublicKey::from_public_key_pem(&cert.public_key).map_err(|e| {
            CryptoError::MalformedPublicKey {
                cert: cert.full_id(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            kty: "RSA",
            alg: "RS256",
            key_use: "sig",
            kid: cert.name.clone(),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        })
    }
}
