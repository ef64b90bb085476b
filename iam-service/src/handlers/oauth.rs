//! OAuth 2.0 authorization-code endpoints.
//!
//! Token endpoints always answer 200 for protocol failures, with the
//! message carried in `access_token` as `"error: <message>"`. Store and
//! crypto failures are server errors.

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use iam_core::error::AppError;

use super::params::OAuthParams;
use crate::dtos::oauth::{AccessTokenRequest, AppLoginQuery, CodeRequest, RefreshTokenRequest};
use crate::dtos::ApiResponse;
use crate::models::{Application, Code, TokenWrapper};
use crate::services::{OAuthError, ServiceError};
use crate::AppState;

fn wrap_token(result: Result<TokenWrapper, ServiceError>) -> Result<Json<TokenWrapper>, AppError> {
    match result {
        Ok(wrapper) => Ok(Json(wrapper)),
        Err(ServiceError::OAuth(e)) => {
            tracing::info!(error = %e, "Token request rejected");
            Ok(Json(e.to_wrapper()))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/login/oauth/code
pub async fn get_oauth_code(
    State(state): State<AppState>,
    OAuthParams(req): OAuthParams<CodeRequest>,
) -> Result<Json<Code>, AppError> {
    match state.core.issuer.issue_authorization_code(&req).await {
        Ok(code) => Ok(Json(code)),
        Err(ServiceError::OAuth(e)) => {
            tracing::info!(error = %e, client_id = %req.client_id, "Code request rejected");
            Ok(Json(Code::failure(e.to_string())))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/login/oauth/access_token
///
/// Client credentials may also arrive via HTTP Basic auth when both form
/// fields are empty.
pub async fn get_oauth_token(
    State(state): State<AppState>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    OAuthParams(mut req): OAuthParams<AccessTokenRequest>,
) -> Result<Json<TokenWrapper>, AppError> {
    if req.client_id.is_empty() && req.client_secret.is_empty() {
        if let Some(TypedHeader(Authorization(basic))) = basic {
            req.client_id = basic.username().to_string();
            req.client_secret = basic.password().to_string();
        }
    }

    wrap_token(state.core.issuer.exchange_code_for_token(&req).await)
}

/// POST /api/login/oauth/refresh_token
pub async fn refresh_token(
    State(state): State<AppState>,
    OAuthParams(req): OAuthParams<RefreshTokenRequest>,
) -> Result<Json<TokenWrapper>, AppError> {
    wrap_token(state.core.issuer.rotate_refresh_token(&req).await)
}

/// GET /api/get-app-login
pub async fn get_app_login(
    State(state): State<AppState>,
    Query(query): Query<AppLoginQuery>,
) -> Result<Json<ApiResponse<Option<Application>>>, AppError> {
    let result = state
        .core
        .issuer
        .check_oauth_login(&query.client_id, &query.response_type, &query.redirect_uri)
        .await;

    match result {
        Ok(application) => Ok(Json(ApiResponse::ok(Some(application.masked())))),
        Err(ServiceError::OAuth(e)) => {
            let msg = e.to_string();
            let data = match e {
                OAuthError::RedirectUriNotAllowed { application, .. } => Some(*application),
                _ => None,
            };
            Ok(Json(ApiResponse::error(msg, data)))
        }
        Err(e) => Err(e.into()),
    }
}
