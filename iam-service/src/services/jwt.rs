//! RS256 token codec.
//!
//! Keys are parsed from the cert PEM once and cached by content hash, so a
//! rotated cert is picked up without invalidation.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::error::CryptoError;
use crate::models::{Application, Cert, TokenFormat, User, UserShort};
use crate::utils::generate_id;

/// Identity part of the claim set, fixed per application by its token format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimSubject {
    Full(Box<User>),
    Short(UserShort),
}

impl ClaimSubject {
    pub fn owner(&self) -> &str {
        match self {
            ClaimSubject::Full(user) => &user.owner,
            ClaimSubject::Short(user) => &user.owner,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClaimSubject::Full(user) => &user.name,
            ClaimSubject::Short(user) => &user.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub subject: ClaimSubject,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nonce: String,
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jti: String,
}

impl Claims {
    /// Signature checks never look at `exp`; callers compare it here.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct JwtCodec {
    issuer: String,
    encoding_keys: Arc<DashMap<String, EncodingKey>>,
    decoding_keys: Arc<DashMap<String, DecodingKey>>,
}

impl JwtCodec {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            encoding_keys: Arc::new(DashMap::new()),
            decoding_keys: Arc::new(DashMap::new()),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs an access/refresh pair for `user` on behalf of `application`.
    /// Both carry the same claims apart from `exp` and `jti`.
    pub fn sign(
        &self,
        application: &Application,
        cert: &Cert,
        user: &User,
        nonce: &str,
    ) -> Result<TokenPair, CryptoError> {
        let now = Utc::now();
        let expires_at = expiry(now, application.expire_in_hours)?;
        let refresh_expires_at = expiry(now, application.refresh_expire_in_hours)?;

        let subject = match application.token_format {
            TokenFormat::Full => ClaimSubject::Full(Box::new(user.sanitized())),
            TokenFormat::Short => ClaimSubject::Short(user.short()),
        };

        let mut claims = Claims {
            subject,
            nonce: nonce.to_string(),
            iss: self.issuer.clone(),
            sub: user.id.clone(),
            aud: vec![application.client_id.clone()],
            exp: expires_at,
            nbf: now.timestamp(),
            iat: now.timestamp(),
            jti: generate_id(),
        };

        let key = self.encoding_key(cert)?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(cert.name.clone());

        let access_token = encode(&header, &claims, &key)?;

        claims.exp = refresh_expires_at;
        claims.jti = generate_id();
        let refresh_token = encode(&header, &claims, &key)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Checks the signature against `cert` and decodes the claims. Only the
    /// RSA PKCS#1 family is accepted. Expiry is left to the caller.
    pub fn verify(&self, token: &str, cert: &Cert) -> Result<Claims, CryptoError> {
        let header = decode_header(token)?;
        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(CryptoError::UnsupportedAlgorithm(header.alg));
        }

        let key = self.decoding_key(cert)?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &key, &validation)?;
        Ok(data.claims)
    }

    fn encoding_key(&self, cert: &Cert) -> Result<EncodingKey, CryptoError> {
        let fingerprint = fingerprint(&cert.private_key);
        if let Some(key) = self.encoding_keys.get(&fingerprint) {
            return Ok(key.clone());
        }

        let key = EncodingKey::from_rsa_pem(cert.private_key.as_bytes()).map_err(|source| {
            CryptoError::MalformedPrivateKey {
                cert: cert.full_id(),
                source,
            }
        })?;
        self.encoding_keys.insert(fingerprint, key.clone());
        Ok(key)
    }

    fn decoding_key(&self, cert: &Cert) -> Result<DecodingKey, CryptoError> {
        let fingerprint = fingerprint(&cert.public_key);
        if let Some(key) = self.decoding_keys.get(&fingerprint) {
            return Ok(key.clone());
        }

        let key = DecodingKey::from_rsa_pem(cert.public_key.as_bytes()).map_err(|e| {
            CryptoError::MalformedPublicKey {
                cert: cert.full_id(),
                reason: e.to_string(),
            }
        })?;
        self.decoding_keys.insert(fingerprint, key.clone());
        Ok(key)
    }
}

fn expiry(now: DateTime<Utc>, hours: i64) -> Result<i64, CryptoError> {
    Duration::try_hours(hours)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .map(|at| at.timestamp())
        .ok_or(CryptoError::LifetimeOutOfRange(hours))
}

fn fingerprint(pem: &str) -> String {
    hex::encode(Sha256::digest(pem.as_bytes()))
}
