pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_keys;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get, post},
    Json, Router,
};
use iam_core::error::AppError;
use iam_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::{no_store_middleware, security_headers_middleware},
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::IamConfig;
use crate::middleware::{authz_middleware, auto_signin_middleware, metrics_middleware};
use crate::services::AuthCore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IamConfig>,
    pub core: AuthCore,
    pub token_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/api/login/oauth/code", post(handlers::get_oauth_code))
        .route(
            "/api/login/oauth/access_token",
            post(handlers::get_oauth_token),
        )
        .route("/api/login/oauth/refresh_token", post(handlers::refresh_token))
        .layer(from_fn(no_store_middleware))
        .layer(from_fn_with_state(
            state.token_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Everything here passes auto sign-in, then the authorization gate.
    let gated = Router::new()
        .route("/api/get-app-login", get(handlers::get_app_login))
        .route("/api/get-account", get(handlers::get_account))
        .route("/api/certs", any(handlers::jwks))
        .route(
            "/.well-known/openid-configuration",
            get(handlers::openid_configuration),
        )
        .merge(oauth_routes)
        .layer(from_fn_with_state(state.clone(), authz_middleware))
        .layer(from_fn_with_state(state.clone(), auto_signin_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(gated)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config))
}

fn cors_layer(config: &IamConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.core.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up",
            "policy_rules": state.core.policy.rules().len(),
        }
    })))
}
