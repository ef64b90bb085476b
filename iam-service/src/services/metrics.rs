use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

use super::error::ServiceError;
use super::policy::Decision;

pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub authz_decisions_total: IntCounterVec,
    pub oauth_grants_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let authz_decisions_total = IntCounterVec::new(
        Opts::new("authz_decisions_total", "Authorization gate decisions"),
        &["result"],
    )?;
    let oauth_grants_total = IntCounterVec::new(
        Opts::new("oauth_grants_total", "Token endpoint grants by outcome"),
        &["grant_type", "outcome"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(authz_decisions_total.clone()))?;
    registry.register(Box::new(oauth_grants_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        authz_decisions_total,
        oauth_grants_total,
    })
}

/// Builds the registry on first call. Later calls are no-ops. Failure
/// leaves metrics disabled rather than aborting startup.
pub fn init_metrics() {
    if METRICS.get().is_some() {
        return;
    }
    match build() {
        Ok(metrics) => {
            let _ = METRICS.set(metrics);
        }
        Err(e) => tracing::error!("Failed to initialize metrics: {}", e),
    }
}

pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

pub fn record_decision(decision: Decision) {
    if let Some(m) = METRICS.get() {
        m.authz_decisions_total
            .with_label_values(&[decision.as_str()])
            .inc();
    }
}

pub fn record_grant<T>(grant_type: &str, result: &Result<T, ServiceError>) {
    let outcome = match result {
        Ok(_) => "issued",
        Err(ServiceError::OAuth(_)) => "rejected",
        Err(_) => "error",
    };
    if let Some(m) = METRICS.get() {
        m.oauth_grants_total
            .with_label_values(&[grant_type, outcome])
            .inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match METRICS.get() {
        Some(m) => &m.registry,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
