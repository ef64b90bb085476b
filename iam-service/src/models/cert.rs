//! Cert model - an RSA key pair used to sign tokens.

use chrono::{DateTime, Utc};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cert {
    pub owner: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub display_name: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub cert_type: String,
    pub crypto_algorithm: String,
    pub bit_size: i32,
    pub expire_in_years: i32,
    pub public_key: String,
    #[serde(skip_serializing, default)]
    pub private_key: String,
}

impl Cert {
    /// Wraps an existing PEM pair.
    pub fn from_pem(owner: &str, name: &str, public_key: &str, private_key: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            created_time: Utc::now(),
            display_name: name.to_string(),
            scope: "JWT".to_string(),
            cert_type: "x509".to_string(),
            crypto_algorithm: "RSA".to_string(),
            bit_size: 0,
            expire_in_years: 20,
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        }
    }

    /// Generates a fresh key pair. Slow for large `bit_size`; run it off the
    /// async executor.
    pub fn generate(owner: &str, name: &str, bit_size: usize) -> Result<Self, anyhow::Error> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bit_size)
            .map_err(|e| anyhow::anyhow!("Failed to generate RSA key: {}", e))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("Failed to encode private key: {}", e))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| anyhow::anyhow!("Failed to encode public key: {}", e))?;

        let mut cert = Self::from_pem(owner, name, &public_pem, private_pem.as_str());
        cert.bit_size = i32::try_from(bit_size).unwrap_or(i32::MAX);
        Ok(cert)
    }

    pub fn full_id(&self) -> String {
        crate::utils::join_owner_name(&self.owner, &self.name)
    }
}
