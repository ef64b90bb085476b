//! Built-in records every deployment starts with.

use std::sync::Arc;

use super::certs::CERT_OWNER;
use super::error::{CryptoError, ServiceError};
use super::store::{CredentialStore, PolicyRuleStore};
use crate::models::{Application, Cert, PolicyRule, User};

pub const BUILT_IN_ORGANIZATION: &str = "built-in";
pub const BUILT_IN_APPLICATION: &str = "app-built-in";
const BUILT_IN_ADMIN: &str = "admin";
const BUILT_IN_CERT_BITS: usize = 2048;

/// Creates the built-in cert, application and admin user when missing.
/// Existing rows are left untouched.
pub async fn ensure_built_ins(
    store: &Arc<dyn CredentialStore>,
    cert_name: &str,
) -> Result<(), ServiceError> {
    if store.get_cert(CERT_OWNER, cert_name).await?.is_none() {
        let name = cert_name.to_string();
        let cert = tokio::task::spawn_blocking(move || {
            Cert::generate(CERT_OWNER, &name, BUILT_IN_CERT_BITS)
        })
        .await
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        store.insert_cert(&cert).await?;
        tracing::info!(cert = %cert.full_id(), bits = BUILT_IN_CERT_BITS, "Generated built-in cert");
    }

    if store
        .get_application(BUILT_IN_ADMIN, BUILT_IN_APPLICATION)
        .await?
        .is_none()
    {
        let mut application =
            Application::new(BUILT_IN_ADMIN, BUILT_IN_APPLICATION, BUILT_IN_ORGANIZATION);
        application.display_name = "IAM".to_string();
        application.cert = Some(cert_name.to_string());

        store.insert_application(&application).await?;
        tracing::info!(
            application = %application.full_id(),
            client_id = %application.client_id,
            "Created built-in application"
        );
    }

    if store
        .get_user(BUILT_IN_ORGANIZATION, BUILT_IN_ADMIN)
        .await?
        .is_none()
    {
        let mut user = User::new(BUILT_IN_ORGANIZATION, BUILT_IN_ADMIN);
        user.display_name = "Admin".to_string();
        user.tag = "staff".to_string();
        user.is_admin = true;
        user.is_global_admin = true;
        user.signup_application = BUILT_IN_APPLICATION.to_string();

        store.insert_user(&user).await?;
        tracing::info!(user = %user.full_id(), "Created built-in admin user");
    }

    Ok(())
}

/// Writes the seed rule set, replacing whatever was stored.
pub async fn seed_rules(store: &dyn PolicyRuleStore) -> Result<usize, ServiceError> {
    let rules = PolicyRule::seed()?;
    store.replace_rules(&rules).await?;
    Ok(rules.len())
}
