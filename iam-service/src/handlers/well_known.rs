use axum::{extract::State, http::header, response::IntoResponse, Json};
use iam_core::error::AppError;
use serde::Serialize;

use crate::services::{Jwk, JwkSet};
use crate::AppState;

const CLAIMS_SUPPORTED: &[&str] = &[
    "iss", "sub", "aud", "iat", "exp", "nbf", "jti", "nonce", "id", "type", "displayName",
    "avatar", "email", "phone", "affiliation", "tag", "region", "language", "score", "isAdmin",
    "isGlobalAdmin", "isForbidden", "signupApplication",
];

/// Login page of the web frontend. It collects the user's consent and then
/// calls `POST /api/login/oauth/code`; this service does not serve it.
pub const AUTHORIZE_UI_PATH: &str = "/login/oauth/authorize";

#[derive(Debug, Serialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub response_modes_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
    pub claims_supported: Vec<&'static str>,
}

impl OidcDiscovery {
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            issuer: origin.to_string(),
            authorization_endpoint: format!("{}{}", origin, AUTHORIZE_UI_PATH),
            token_endpoint: format!("{}/api/login/oauth/access_token", origin),
            userinfo_endpoint: format!("{}/api/get-account", origin),
            jwks_uri: format!("{}/api/certs", origin),
            response_types_supported: vec!["code"],
            response_modes_supported: vec!["query"],
            grant_types_supported: vec!["authorization_code", "refresh_token"],
            subject_types_supported: vec!["public"],
            id_token_signing_alg_values_supported: vec!["RS256"],
            code_challenge_methods_supported: vec!["S256"],
            scopes_supported: vec![
                "openid",
                "email",
                "profile",
                "address",
                "phone",
                "offline_access",
            ],
            claims_supported: CLAIMS_SUPPORTED.to_vec(),
        }
    }
}

/// GET /.well-known/openid-configuration
pub async fn openid_configuration(State(state): State<AppState>) -> Json<OidcDiscovery> {
    Json(OidcDiscovery::for_origin(state.core.jwt.issuer()))
}

/// GET /api/certs
pub async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cert = state.core.certs.default_cert().await?;
    let jwks = JwkSet {
        keys: vec![Jwk::from_cert(&cert)?],
    };
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    ))
}
