pub mod bootstrap;
pub mod certs;
pub mod database;
pub mod error;
pub mod jwt;
pub mod metrics;
pub mod policy;
pub mod store;
pub mod token_issuer;

use std::sync::Arc;

pub use certs::{CertProvider, Jwk, JwkSet};
pub use error::{CryptoError, OAuthError, ServiceError, StoreError};
pub use jwt::{ClaimSubject, Claims, JwtCodec};
pub use policy::{AccessRequest, Decision, PolicyEngine};
pub use store::{CredentialStore, MemoryStore, PolicyRuleStore};
pub use token_issuer::{pkce_challenge, IssuerOptions, RefreshResponse, TokenIssuer};

/// Everything request handlers need, cheap to clone.
#[derive(Clone)]
pub struct AuthCore {
    pub store: Arc<dyn CredentialStore>,
    pub policy: PolicyEngine,
    pub certs: CertProvider,
    pub jwt: JwtCodec,
    pub issuer: TokenIssuer,
}

impl AuthCore {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        policy: PolicyEngine,
        origin: &str,
        default_cert: &str,
        options: IssuerOptions,
    ) -> Self {
        let certs = CertProvider::new(store.clone(), default_cert);
        let jwt = JwtCodec::new(origin.trim_end_matches('/'));
        let issuer = TokenIssuer::new(store.clone(), certs.clone(), jwt.clone(), options);
        Self {
            store,
            policy,
            certs,
            jwt,
            issuer,
        }
    }
}
