//! Resolves the caller's identity before the authorization gate runs.
//!
//! Sources, first match wins: `?accessToken=<jwt>`, client credentials
//! (HTTP Basic or `?clientId=&clientSecret=`), `Authorization: Bearer <jwt>`.
//! JWTs are verified against the default cert. Client credentials resolve
//! to the subject `app/<application name>`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use chrono::Utc;
use iam_core::error::AppError;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::services::{AuthCore, ServiceError};
use crate::AppState;

/// Subject owner used for application callers.
pub const APP_SUBJECT_OWNER: &str = "app";

/// Authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub owner: String,
    pub name: String,
}

impl SessionUser {
    pub fn id(&self) -> String {
        crate::utils::join_owner_name(&self.owner, &self.name)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Please sign in first")))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SigninQuery {
    access_token: String,
    client_id: String,
    client_secret: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

fn client_credentials(headers: &HeaderMap, query: &SigninQuery) -> Option<(String, String)> {
    let (id, secret) = match headers.typed_get::<Authorization<Basic>>() {
        Some(Authorization(basic)) => (basic.username().to_string(), basic.password().to_string()),
        None => (query.client_id.clone(), query.client_secret.clone()),
    };
    (!id.is_empty() && !secret.is_empty()).then_some((id, secret))
}

async fn user_from_jwt(core: &AuthCore, token: &str) -> Result<SessionUser, AppError> {
    let cert = core.certs.default_cert().await?;
    let claims = core.jwt.verify(token, &cert).map_err(|e| {
        tracing::debug!(error = %e, "Rejected sign-in token");
        AppError::Unauthorized(anyhow::anyhow!("invalid JWT token"))
    })?;

    if claims.is_expired(Utc::now()) {
        return Err(AppError::Unauthorized(anyhow::anyhow!("expired JWT token")));
    }

    Ok(SessionUser {
        owner: claims.subject.owner().to_string(),
        name: claims.subject.name().to_string(),
    })
}

/// `app/<name>` when the credentials match a registered application.
pub async fn application_subject(
    core: &AuthCore,
    client_id: &str,
    client_secret: &str,
) -> Result<Option<SessionUser>, ServiceError> {
    let application = match core.store.get_application_by_client_id(client_id).await? {
        Some(app) => app,
        None => return Ok(None),
    };

    let matches: bool = client_secret
        .as_bytes()
        .ct_eq(application.client_secret.as_bytes())
        .into();
    Ok(matches.then(|| SessionUser {
        owner: APP_SUBJECT_OWNER.to_string(),
        name: application.name,
    }))
}

async fn resolve_session(
    core: &AuthCore,
    headers: &HeaderMap,
    query: &SigninQuery,
) -> Result<Option<SessionUser>, AppError> {
    if !query.access_token.is_empty() {
        return user_from_jwt(core, &query.access_token).await.map(Some);
    }

    if let Some((id, secret)) = client_credentials(headers, query) {
        if let Some(subject) = application_subject(core, &id, &secret).await? {
            return Ok(Some(subject));
        }
    }

    match bearer_token(headers) {
        Some(token) => user_from_jwt(core, token).await.map(Some),
        None => Ok(None),
    }
}

pub async fn auto_signin_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let query: SigninQuery = req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    if let Some(session) = resolve_session(&state.core, req.headers(), &query).await? {
        tracing::debug!(subject = %session.id(), "Signed in");
        req.extensions_mut().insert(session);
    }

    Ok(next.run(req).await)
}
