//! Authorization-code issuance, code exchange with PKCE, and refresh-token
//! rotation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::certs::CertProvider;
use super::error::{CryptoError, OAuthError, ServiceError};
use super::jwt::JwtCodec;
use super::metrics;
use super::store::CredentialStore;
use crate::dtos::oauth::{AccessTokenRequest, CodeRequest, RefreshTokenRequest};
use crate::models::{Application, Code, Token, TokenWrapper, User};
use crate::utils::{generate_client_id, generate_id, split_owner_name};

/// Which pair a successful refresh returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshResponse {
    /// The freshly minted pair.
    #[default]
    Rotated,
    /// The pair stored on the presented token row (historical behaviour).
    Legacy,
}

impl std::str::FromStr for RefreshResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rotated" => Ok(RefreshResponse::Rotated),
            "legacy" => Ok(RefreshResponse::Legacy),
            _ => Err(format!(
                "Invalid refresh response mode: {}. Expected 'rotated' or 'legacy'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerOptions {
    /// Codes exchange once and refresh tokens rotate once.
    pub single_use_grants: bool,
    pub refresh_response: RefreshResponse,
}

impl Default for IssuerOptions {
    fn default() -> Self {
        Self {
            single_use_grants: true,
            refresh_response: RefreshResponse::Rotated,
        }
    }
}

/// RFC 7636 S256: `base64url_nopad(SHA256(verifier))`.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Challenge to store for a code request. An absent or `"null"` method is
/// accepted; a non-empty challenge is stored either way and enforced as S256
/// at exchange. A `"null"` challenge means no PKCE.
fn stored_challenge(method: &str, challenge: &str) -> Result<String, OAuthError> {
    match method {
        "S256" | "null" | "" => Ok(match challenge {
            "null" => String::new(),
            other => other.to_string(),
        }),
        _ => Err(OAuthError::UnsupportedChallengeMethod),
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn CredentialStore>,
    certs: CertProvider,
    jwt: JwtCodec,
    options: IssuerOptions,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        certs: CertProvider,
        jwt: JwtCodec,
        options: IssuerOptions,
    ) -> Self {
        Self {
            store,
            certs,
            jwt,
            options,
        }
    }

    /// Validates the client and redirect target of a login attempt.
    pub async fn check_oauth_login(
        &self,
        client_id: &str,
        response_type: &str,
        redirect_uri: &str,
    ) -> Result<Application, ServiceError> {
        if response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType.into());
        }

        let application = self
            .store
            .get_application_by_client_id(client_id)
            .await?
            .ok_or(OAuthError::InvalidClientId)?;

        if !application.allows_redirect_uri(redirect_uri) {
            return Err(OAuthError::RedirectUriNotAllowed {
                redirect_uri: redirect_uri.to_string(),
                application: Box::new(application.masked()),
            }
            .into());
        }

        Ok(application)
    }

    async fn active_user(&self, owner: &str, name: &str) -> Result<User, ServiceError> {
        let user = self
            .store
            .get_user(owner, name)
            .await?
            .filter(|user| !user.is_deleted)
            .ok_or(OAuthError::UserNotFound)?;

        if user.is_forbidden {
            return Err(OAuthError::UserForbidden.into());
        }
        Ok(user)
    }

    pub async fn issue_authorization_code(&self, req: &CodeRequest) -> Result<Code, ServiceError> {
        let application = self
            .check_oauth_login(&req.client_id, &req.response_type, &req.redirect_uri)
            .await?;

        let code_challenge = stored_challenge(&req.code_challenge_method, &req.code_challenge)?;

        let (owner, name) = split_owner_name(&req.user_id).ok_or(OAuthError::UserNotFound)?;
        let user = self.active_user(owner, name).await?;

        let cert = self.certs.for_application(&application).await?;
        let pair = self.jwt.sign(&application, &cert, &user, &req.nonce)?;

        let token = Token {
            owner: application.owner.clone(),
            name: generate_id(),
            created_time: Utc::now(),
            application: application.name.clone(),
            organization: user.owner.clone(),
            user: user.name.clone(),
            code: generate_client_id(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: application.expire_in_hours * 60,
            scope: req.scope.clone(),
            token_type: "Bearer".to_string(),
            code_challenge,
            code_consumed: false,
            refresh_revoked: false,
        };
        self.store.insert_token(&token).await?;

        tracing::info!(
            application = %application.full_id(),
            user = %user.full_id(),
            token = %token.name,
            pkce = !token.code_challenge.is_empty(),
            "Authorization code issued"
        );

        Ok(Code {
            code: token.code,
            message: String::new(),
        })
    }

    pub async fn exchange_code_for_token(
        &self,
        req: &AccessTokenRequest,
    ) -> Result<TokenWrapper, ServiceError> {
        let result = self.exchange(req).await;
        metrics::record_grant("authorization_code", &result);
        result
    }

    async fn exchange(&self, req: &AccessTokenRequest) -> Result<TokenWrapper, ServiceError> {
        if req.grant_type != "authorization_code" {
            return Err(OAuthError::ExpectedAuthorizationCodeGrant.into());
        }
        if req.code.is_empty() {
            return Err(OAuthError::EmptyCode.into());
        }

        let application = self
            .store
            .get_application_by_client_id(&req.client_id)
            .await?
            .ok_or(OAuthError::InvalidClientId)?;

        let token = self
            .store
            .get_token_by_code(&req.code)
            .await?
            .ok_or(OAuthError::InvalidCode)?;

        if token.application != application.name {
            return Err(OAuthError::WrongApplication.into());
        }
        if !secrets_match(&req.client_secret, &application.client_secret) {
            return Err(OAuthError::InvalidClientSecret.into());
        }
        if !token.code_challenge.is_empty()
            && pkce_challenge(&req.code_verifier) != token.code_challenge
        {
            return Err(OAuthError::IncorrectCodeVerifier.into());
        }

        if self.options.single_use_grants
            && (token.code_consumed || !self.store.consume_code(&req.code).await?)
        {
            tracing::warn!(token = %token.name, "Authorization code replayed");
            return Err(OAuthError::CodeAlreadyUsed.into());
        }

        Ok(TokenWrapper::from_token(&token))
    }

    pub async fn rotate_refresh_token(
        &self,
        req: &RefreshTokenRequest,
    ) -> Result<TokenWrapper, ServiceError> {
        let result = self.rotate(req).await;
        metrics::record_grant("refresh_token", &result);
        result
    }

    async fn rotate(&self, req: &RefreshTokenRequest) -> Result<TokenWrapper, ServiceError> {
        if req.grant_type != "refresh_token" {
            return Err(OAuthError::ExpectedRefreshTokenGrant.into());
        }

        let application = self
            .store
            .get_application_by_client_id(&req.client_id)
            .await?
            .ok_or(OAuthError::InvalidClientId)?;

        if !secrets_match(&req.client_secret, &application.client_secret) {
            return Err(OAuthError::InvalidClientSecret.into());
        }

        let token = self
            .store
            .get_token_by_refresh_token(&req.refresh_token)
            .await?
            .ok_or(OAuthError::InvalidRefreshToken)?;

        if token.application != application.name {
            return Err(OAuthError::WrongApplication.into());
        }
        if self.options.single_use_grants && token.refresh_revoked {
            tracing::warn!(token = %token.name, "Revoked refresh token presented");
            return Err(OAuthError::RefreshTokenReused.into());
        }

        let cert = self.certs.for_application(&application).await?;
        let claims = match self.jwt.verify(&req.refresh_token, &cert) {
            Ok(claims) => claims,
            Err(e @ (CryptoError::Jwt(_) | CryptoError::UnsupportedAlgorithm(_))) => {
                return Err(OAuthError::RefreshTokenRejected(e.to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };
        if claims.is_expired(Utc::now()) {
            return Err(OAuthError::RefreshTokenRejected("token is expired".to_string()).into());
        }

        let user = self.active_user(&token.organization, &token.user).await?;
        let pair = self.jwt.sign(&application, &cert, &user, "")?;

        let replacement = Token {
            owner: application.owner.clone(),
            name: generate_id(),
            created_time: Utc::now(),
            application: application.name.clone(),
            organization: user.owner.clone(),
            user: user.name.clone(),
            code: generate_client_id(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: application.expire_in_hours * 60,
            scope: req.scope.clone(),
            token_type: "Bearer".to_string(),
            code_challenge: String::new(),
            code_consumed: true,
            refresh_revoked: false,
        };

        if self.options.single_use_grants {
            if !self
                .store
                .rotate_token(&req.refresh_token, &replacement)
                .await?
            {
                tracing::warn!(token = %token.name, "Concurrent refresh lost the rotation race");
                return Err(OAuthError::RefreshTokenReused.into());
            }
        } else {
            self.store.insert_token(&replacement).await?;
        }

        tracing::info!(
            application = %application.full_id(),
            user = %user.full_id(),
            previous = %token.name,
            token = %replacement.name,
            "Refresh token rotated"
        );

        Ok(match self.options.refresh_response {
            RefreshResponse::Rotated => TokenWrapper::from_token(&replacement),
            RefreshResponse::Legacy => TokenWrapper::from_token(&token),
        })
    }
}
